//! 分区调度器 - 业务能力层
//!
//! 限时分区按数组顺序严格依次进行，每个分区有自己的倒计时；
//! 全部限时分区结束后永久切换到开放模式，开放分区自由导航。
//!
//! 单调性约束：completed_sections 只增不减；限时分区下标只前进；
//! 开放模式一旦激活不再回退。

use std::collections::BTreeSet;

use tracing::info;

use crate::models::{QuestionRef, Section};

/// 一次分区推进的结果，供上层记录日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionAdvance {
    /// 进入下一个限时分区
    NextTimeSection { section_id: String },
    /// 所有限时分区结束，切换到开放模式
    OpenModeActivated,
}

/// 分区调度器
#[derive(Debug, Default)]
pub struct SectionScheduler {
    time_sections: Vec<Section>,
    open_sections: Vec<Section>,
    current_time_index: usize,
    current_question_index: usize,
    section_seconds_left: Option<u64>,
    completed: BTreeSet<String>,
    open_mode: bool,
    current_open_section_id: Option<String>,
    current_open_question_index: usize,
}

impl SectionScheduler {
    /// 创建调度器；没有限时分区时立即激活开放模式
    pub fn new(time_sections: Vec<Section>, open_sections: Vec<Section>) -> Self {
        let mut scheduler = Self {
            time_sections,
            open_sections,
            ..Self::default()
        };
        if scheduler.time_sections.is_empty() {
            scheduler.activate_open_mode();
        } else {
            scheduler.section_seconds_left = Some(scheduler.time_sections[0].duration_seconds);
        }
        scheduler
    }

    pub fn open_mode(&self) -> bool {
        self.open_mode
    }

    pub fn completed_sections(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn current_time_section_index(&self) -> usize {
        self.current_time_index
    }

    pub fn section_seconds_left(&self) -> Option<u64> {
        self.section_seconds_left
    }

    /// 限时分区倒计时总和，用于全局时长兜底
    pub fn total_time_section_seconds(&self) -> u64 {
        self.time_sections.iter().map(|s| s.duration_seconds).sum()
    }

    /// 当前分区（限时模式下是活动限时分区，开放模式下是选中的开放分区）
    pub fn current_section(&self) -> Option<&Section> {
        if self.open_mode {
            let id = self.current_open_section_id.as_deref()?;
            self.open_sections.iter().find(|s| s.id == id)
        } else {
            self.time_sections.get(self.current_time_index)
        }
    }

    pub fn current_question_index(&self) -> usize {
        if self.open_mode {
            self.current_open_question_index
        } else {
            self.current_question_index
        }
    }

    pub fn current_question(&self) -> Option<&QuestionRef> {
        self.current_section()?.question_at(self.current_question_index())
    }

    /// 在所有分区里定位题目引用
    pub fn question_ref(&self, section_id: &str, question_id: &str) -> Option<&QuestionRef> {
        self.time_sections
            .iter()
            .chain(self.open_sections.iter())
            .find(|s| s.id == section_id)?
            .find_question(question_id)
    }

    /// 分区倒计时走一秒
    ///
    /// 时长为 0 的分区在第一次 tick 就推进，不会挂住
    pub fn tick(&mut self) -> Option<SectionAdvance> {
        if self.open_mode {
            return None;
        }
        let remaining = self.section_seconds_left?;
        if remaining <= 1 {
            self.section_seconds_left = Some(0);
            Some(self.complete_current_and_advance())
        } else {
            self.section_seconds_left = Some(remaining - 1);
            None
        }
    }

    /// 手动推进分区（倒计时到 0 与手动推进走同一条路径）
    pub fn advance_section(&mut self) -> Option<SectionAdvance> {
        if self.open_mode {
            return None;
        }
        Some(self.complete_current_and_advance())
    }

    /// 导航到 (分区, 题目下标)
    ///
    /// 限时模式只允许在当前活动分区内移动；开放模式允许任意开放分区
    pub fn navigate(&mut self, section_id: &str, question_index: usize) -> bool {
        if self.open_mode {
            let Some(section) = self.open_sections.iter().find(|s| s.id == section_id) else {
                return false;
            };
            if question_index >= section.questions.len() {
                return false;
            }
            self.current_open_section_id = Some(section.id.clone());
            self.current_open_question_index = question_index;
            true
        } else {
            let Some(active) = self.time_sections.get(self.current_time_index) else {
                return false;
            };
            if active.id != section_id || question_index >= active.questions.len() {
                return false;
            }
            self.current_question_index = question_index;
            true
        }
    }

    /// 当前分区内前进一题；越界时返回 false（分区末尾）
    pub fn next_question(&mut self) -> bool {
        let Some(section) = self.current_section() else {
            return false;
        };
        let next = self.current_question_index() + 1;
        if next >= section.questions.len() {
            return false;
        }
        if self.open_mode {
            self.current_open_question_index = next;
        } else {
            self.current_question_index = next;
        }
        true
    }

    /// 终态：取消分区倒计时
    pub fn cancel_countdown(&mut self) {
        self.section_seconds_left = None;
    }

    fn complete_current_and_advance(&mut self) -> SectionAdvance {
        if let Some(current) = self.time_sections.get(self.current_time_index) {
            // 重复插入是幂等的
            self.completed.insert(current.id.clone());
        }

        let next_index = self.current_time_index + 1;
        if next_index < self.time_sections.len() {
            self.current_time_index = next_index;
            self.current_question_index = 0;
            self.section_seconds_left = Some(self.time_sections[next_index].duration_seconds);
            info!("⏭️ 进入限时分区: {}", self.time_sections[next_index].name);
            SectionAdvance::NextTimeSection {
                section_id: self.time_sections[next_index].id.clone(),
            }
        } else {
            self.activate_open_mode();
            info!("🔓 限时分区全部结束，开放模式已激活");
            SectionAdvance::OpenModeActivated
        }
    }

    fn activate_open_mode(&mut self) {
        self.open_mode = true;
        self.section_seconds_left = None;
        self.current_open_section_id = self.open_sections.first().map(|s| s.id.clone());
        self.current_open_question_index = 0;
    }
}
