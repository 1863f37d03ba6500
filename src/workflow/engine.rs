//! 会话引擎 - 流程层
//!
//! 核心职责：持有唯一权威的会话状态，按顺序处理事件，驱动
//! 阶段状态机（说明 → 考试 → 结束）、分区调度、监考监视、
//! 自动保存与提交生命周期。
//!
//! 并发模型：单任务独占全部可变状态，所有刺激（心跳、用户命令、
//! 平台信号、网络完成）都是事件；网络 await 是唯一的挂起点。
//! 各倒计时是引擎自有字段，由同一个 1 Hz 心跳驱动，因此取消永远
//! 是同步的，同类倒计时也不可能并存两份。

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::clients::ExamApi;
use crate::config::Config;
use crate::logger::human_time;
use crate::models::wire::ProctorAck;
use crate::models::{default_instructions, Instruction, QuestionType, Section, SectionKind};
use crate::services::answer_store::AnswerInput;
use crate::services::proctor::TabSignal;
use crate::services::{AnswerStore, ProctorMonitor, SectionScheduler};
use crate::workflow::events::SessionEvent;

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 阅读考试说明（初始阶段）
    Instructions,
    /// 作答中
    Test,
    /// 终态：答案、计时器、监考状态一律不再变化
    Ended,
}

/// 会话根状态（每个测试实例一份）
#[derive(Debug)]
pub struct AttemptSession {
    pub test_id: String,
    pub phase: Phase,
    /// 提交闸门：单调一次性置真，同步检查同步占用
    pub submitted: bool,
    pub fullscreen_granted: bool,
    pub instruction_seconds_left: u64,
    pub global_seconds_left: Option<u64>,
    /// 载荷获取失败的死端标记；置位后不启动计时器、不允许交卷
    pub fatal_error: Option<String>,
    pub submitted_result: Option<serde_json::Value>,
    pub test_name: String,
    pub test_assignment_id: Option<String>,
}

/// 会话引擎
pub struct SessionEngine<C: ExamApi> {
    config: Config,
    client: C,
    session: AttemptSession,
    scheduler: SectionScheduler,
    store: AnswerStore,
    proctor: ProctorMonitor,
    instructions: Vec<Instruction>,
    /// 自动保存倒计时（秒）；None 表示未启动或已同步取消
    autosave_ticks_left: Option<u64>,
}

impl<C: ExamApi> SessionEngine<C> {
    pub fn new(config: Config, client: C) -> Self {
        let session = AttemptSession {
            test_id: config.test_id.clone(),
            phase: Phase::Instructions,
            submitted: false,
            fullscreen_granted: false,
            instruction_seconds_left: config.instruction_total_seconds,
            global_seconds_left: None,
            fatal_error: None,
            submitted_result: None,
            test_name: String::new(),
            test_assignment_id: None,
        };
        Self {
            proctor: ProctorMonitor::new(&config),
            session,
            scheduler: SectionScheduler::default(),
            store: AnswerStore::new(),
            instructions: default_instructions(),
            autosave_ticks_left: None,
            config,
            client,
        }
    }

    // ========== 只读访问 ==========

    pub fn session(&self) -> &AttemptSession {
        &self.session
    }

    pub fn scheduler(&self) -> &SectionScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    pub fn proctor(&self) -> &ProctorMonitor {
        &self.proctor
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn autosave_armed(&self) -> bool {
        self.autosave_ticks_left.is_some()
    }

    // ========== 事件入口 ==========

    /// 从服务端加载考试说明；失败时降级为内置默认说明，会话照常进行
    pub async fn load_instructions(&mut self) {
        match self.client.fetch_instructions(&self.session.test_id).await {
            Ok(list) => {
                info!("✓ 已获取 {} 条考试说明", list.len());
                self.instructions = list;
            }
            Err(e) => {
                warn!("考试说明获取失败，使用内置默认说明: {e}");
                self.instructions = default_instructions();
            }
        }
    }

    /// 处理一个会话事件
    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        if self.session.phase == Phase::Ended {
            // 终态：忽略一切事件
            return Ok(());
        }
        match event {
            SessionEvent::Tick => self.on_tick().await?,
            SessionEvent::EnterFullscreen => self.on_enter_fullscreen(),
            SessionEvent::LeaveFullscreen => self.on_leave_fullscreen(),
            SessionEvent::TabSignal { signal, at_ms } => self.on_tab_signal(signal, at_ms).await?,
            SessionEvent::StartRequested => self.on_start_requested().await?,
            SessionEvent::SaveAnswer {
                section_id,
                question_id,
                answer,
            } => self.on_save_answer(&section_id, &question_id, answer),
            SessionEvent::ClearAnswer {
                section_id,
                question_id,
            } => self.on_clear_answer(&section_id, &question_id),
            SessionEvent::NextWithoutSave => self.on_next_without_save(),
            SessionEvent::Navigate {
                section_id,
                question_index,
            } => self.on_navigate(&section_id, question_index),
            SessionEvent::AdvanceSection => self.on_advance_section(),
            SessionEvent::SubmitRequested => self.on_submit_requested().await?,
        }
        Ok(())
    }

    // ========== 心跳 ==========

    async fn on_tick(&mut self) -> Result<()> {
        match self.session.phase {
            Phase::Instructions => {
                // 说明倒计时只在全屏时走，失屏暂停不重置
                if self.session.fullscreen_granted && self.session.instruction_seconds_left > 0 {
                    self.session.instruction_seconds_left -= 1;
                    if self.session.instruction_seconds_left == 0 {
                        info!("📖 说明阅读倒计时结束，可以开始考试");
                    }
                }
            }
            Phase::Test => {
                if self.session.fatal_error.is_some() {
                    return Ok(());
                }
                self.tick_global_countdown().await?;
                if self.session.phase != Phase::Test {
                    return Ok(());
                }
                self.scheduler.tick();
                if self.proctor.tick_violation() {
                    self.on_violation_timeout().await?;
                }
                if self.session.phase == Phase::Test {
                    self.tick_autosave().await?;
                }
            }
            Phase::Ended => {}
        }
        Ok(())
    }

    async fn tick_global_countdown(&mut self) -> Result<()> {
        let Some(remaining) = self.session.global_seconds_left else {
            return Ok(());
        };
        if remaining <= 1 {
            // 计时器一次性：触发后即取消，失败重试交给用户手动路径
            self.session.global_seconds_left = None;
            info!("⏰ 全局倒计时结束");
            if self.session.submitted {
                self.enter_ended();
            } else {
                self.submit_direct("全局超时").await?;
            }
        } else {
            self.session.global_seconds_left = Some(remaining - 1);
        }
        Ok(())
    }

    async fn tick_autosave(&mut self) -> Result<()> {
        let Some(remaining) = self.autosave_ticks_left else {
            return Ok(());
        };
        if remaining <= 1 {
            self.autosave_ticks_left = Some(self.config.autosave_interval_seconds);
            self.do_autosave().await;
        } else {
            self.autosave_ticks_left = Some(remaining - 1);
        }
        Ok(())
    }

    /// 自动保存一次：读取此刻的最新快照，失败只记日志，下个周期自然重发
    async fn do_autosave(&mut self) {
        if self.session.submitted {
            return;
        }
        let Some(attempt_id) = self.session.test_assignment_id.clone() else {
            return;
        };
        let answers = self.store.to_wire();
        debug!("💾 自动保存: {} 个分区有答案", answers.len());
        if let Err(e) = self
            .client
            .autosave(&attempt_id, &self.session.test_id, &answers)
            .await
        {
            warn!("自动保存失败（下个周期重发）: {e}");
        }
    }

    // ========== 全屏 / 可见性 ==========

    fn on_enter_fullscreen(&mut self) {
        self.session.fullscreen_granted = true;
        if self.proctor.violation_active() {
            info!("✓ 已回到全屏，违规倒计时取消");
        }
        // 重新进入全屏：倒计时整体取消，下次从全时长重新开始
        self.proctor.cancel_violation();
    }

    fn on_leave_fullscreen(&mut self) {
        self.session.fullscreen_granted = false;
        match self.session.phase {
            Phase::Instructions => {
                // 说明阶段只阻塞进度（倒计时暂停），不算违规
                info!("⏸️ 退出全屏，说明倒计时暂停");
            }
            Phase::Test => {
                if self.session.fatal_error.is_none() && self.proctor.start_violation() {
                    warn!(
                        "⚠️ 考试中退出全屏！{} 秒内未返回将强制交卷",
                        self.config.violation_seconds
                    );
                }
            }
            Phase::Ended => {}
        }
    }

    async fn on_tab_signal(&mut self, signal: TabSignal, at_ms: u64) -> Result<()> {
        let counted = self.proctor.on_tab_signal(signal, at_ms);

        if self.session.phase == Phase::Instructions {
            if counted {
                // 说明阶段离开页面视同失去全屏授权，阻塞进度
                self.session.fullscreen_granted = false;
                info!("⏸️ 页面隐藏，说明倒计时暂停");
            }
            return Ok(());
        }

        if !counted || self.session.fatal_error.is_some() {
            return Ok(());
        }

        warn!(
            "👀 检测到切屏（第 {} 次，上限 {}）",
            self.proctor.tab_switch_count(),
            self.config.max_tab_switches
        );

        // 尽力而为上报，附当前答案快照；服务端对是否已自动交卷有最终裁决权
        let answers = self.store.to_wire();
        match self
            .client
            .report_tab_switch(&self.session.test_id.clone(), &answers)
            .await
        {
            Ok(ack) => {
                if self.apply_server_auto_submit(&ack) {
                    return Ok(());
                }
                if let Some(count) = ack.tab_switches_count {
                    self.proctor.adopt_server_count(count);
                }
                if self.proctor.over_threshold() && !self.session.fullscreen_granted {
                    if self.proctor.start_violation() {
                        warn!(
                            "⚠️ 切屏次数超限且不在全屏，违规倒计时启动（{} 秒）",
                            self.config.violation_seconds
                        );
                    }
                }
            }
            Err(e) => warn!("切屏上报失败（忽略，依赖本地倒计时兜底）: {e}"),
        }
        Ok(())
    }

    // ========== 阶段切换 ==========

    async fn on_start_requested(&mut self) -> Result<()> {
        if self.session.phase != Phase::Instructions {
            return Ok(());
        }
        if self.session.instruction_seconds_left > 0 {
            warn!(
                "说明阅读倒计时未结束（剩余 {}），不能开始",
                human_time(Some(self.session.instruction_seconds_left))
            );
            return Ok(());
        }
        if !self.session.fullscreen_granted {
            warn!("未处于全屏，请先进入全屏再开始考试");
            return Ok(());
        }
        self.start_test().await
    }

    async fn start_test(&mut self) -> Result<()> {
        self.session.phase = Phase::Test;
        info!("🚀 进入考试阶段，正在获取作答载荷...");

        let data = match self.client.fetch_attempt(&self.session.test_id).await {
            Ok(data) => data,
            Err(e) => {
                // 致命错误：死端，不启动任何计时器，交卷不可用
                self.session.fatal_error = Some(e.to_string());
                error!("❌ 作答载荷获取失败，会话不可用: {e}");
                return Ok(());
            }
        };

        let test = data.test.unwrap_or_default();
        self.session.test_name = test
            .test_name
            .clone()
            .unwrap_or_else(|| "Test Attempt".to_string());
        self.session.test_assignment_id = data.test_assignment_id.clone();

        let time_sections: Vec<Section> = test
            .sections_time_restricted
            .into_iter()
            .map(|s| s.into_section(SectionKind::TimeRestricted))
            .collect();
        let open_sections: Vec<Section> = test
            .sections_open
            .into_iter()
            .map(|s| s.into_section(SectionKind::Open))
            .collect();

        // 回填已保存答案（断线重连/刷新场景）
        if let Some(saved) = &data.answers {
            self.store.hydrate(saved, &time_sections);
            self.store.hydrate(saved, &open_sections);
        }

        self.scheduler = SectionScheduler::new(time_sections, open_sections);

        // 全局时长兜底链：duration_seconds → 限时分区时长之和 → end_datetime 差值 → 3600
        let duration = test
            .duration_seconds
            .or_else(|| {
                let sum = self.scheduler.total_time_section_seconds();
                (sum > 0).then_some(sum)
            })
            .or_else(|| test.end_datetime.as_deref().and_then(seconds_until))
            .unwrap_or(3600);
        self.session.global_seconds_left = Some(duration);
        self.autosave_ticks_left = Some(self.config.autosave_interval_seconds);

        info!(
            "📋 {} | 总时长 {}",
            self.session.test_name,
            human_time(Some(duration))
        );
        if self.scheduler.open_mode() {
            info!("🔓 没有限时分区，开放模式立即生效");
        } else if let Some(section) = self.scheduler.current_section() {
            info!(
                "⏱️ 限时分区开始: {} ({})",
                section.name,
                human_time(Some(section.duration_seconds))
            );
        }
        Ok(())
    }

    // ========== 作答 ==========

    fn test_mutable(&self) -> bool {
        self.session.phase == Phase::Test
            && self.session.fatal_error.is_none()
            && !self.session.submitted
    }

    fn on_save_answer(&mut self, section_id: &str, question_id: &str, answer: AnswerInput) {
        if !self.test_mutable() {
            return;
        }
        let Some(question) = self.scheduler.question_ref(section_id, question_id).cloned() else {
            warn!("保存被拒绝：找不到题目 {section_id}/{question_id}");
            return;
        };
        self.store.save(section_id, &question, answer);
        debug!("✓ 已保存答案 {section_id}/{question_id}");

        let is_current = self
            .scheduler
            .current_section()
            .is_some_and(|s| s.id == section_id)
            && self
                .scheduler
                .current_question()
                .is_some_and(|q| q.id == question_id);
        if is_current && question.auto_advances_on_save() && self.allows_auto_advance(&question) {
            if self.scheduler.next_question() {
                self.mark_current_viewed();
            } else {
                info!("已是分区最后一题");
            }
        }
    }

    /// 开放模式下的单选题自动跳题行为历史上存在分歧，收敛为配置项
    fn allows_auto_advance(&self, question: &crate::models::QuestionRef) -> bool {
        if self.scheduler.open_mode() && question.question_type == QuestionType::Mcq {
            self.config.open_mcq_auto_advance
        } else {
            true
        }
    }

    fn on_clear_answer(&mut self, section_id: &str, question_id: &str) {
        if !self.test_mutable() {
            return;
        }
        let Some(question) = self.scheduler.question_ref(section_id, question_id).cloned() else {
            warn!("清空被拒绝：找不到题目 {section_id}/{question_id}");
            return;
        };
        self.store.clear(section_id, &question);
        debug!("✓ 已清空答案 {section_id}/{question_id}");
    }

    fn on_next_without_save(&mut self) {
        if !self.test_mutable() {
            return;
        }
        if self.scheduler.next_question() {
            self.mark_current_viewed();
        } else {
            info!("已到分区末尾，可手动推进分区或等待倒计时");
        }
    }

    fn on_navigate(&mut self, section_id: &str, question_index: usize) {
        if !self.test_mutable() {
            return;
        }
        if self.scheduler.navigate(section_id, question_index) {
            self.mark_current_viewed();
        } else {
            warn!("导航被拒绝: {section_id}#{question_index}（限时模式只能在当前分区内移动）");
        }
    }

    fn on_advance_section(&mut self) {
        if !self.test_mutable() {
            return;
        }
        if self.scheduler.advance_section().is_some() {
            self.mark_current_viewed();
        }
    }

    fn mark_current_viewed(&mut self) {
        let current = self
            .scheduler
            .current_section()
            .map(|s| s.id.clone())
            .zip(self.scheduler.current_question().map(|q| q.id.clone()));
        if let Some((section_id, question_id)) = current {
            self.store.mark_viewed(&section_id, &question_id);
        }
    }

    // ========== 提交生命周期 ==========

    async fn on_submit_requested(&mut self) -> Result<()> {
        if self.session.phase != Phase::Test || self.session.fatal_error.is_some() {
            return Ok(());
        }
        if self.session.test_assignment_id.is_none() {
            warn!("未找到进行中的作答记录，无法交卷");
            return Ok(());
        }
        self.submit_direct("手动交卷").await
    }

    /// 直接交卷：所有触发源共用的唯一提交路径
    ///
    /// 闸门在任何 await 之前同步检查并占用，自动保存同步停掉，
    /// 保证不会有第二次提交或迟到的保存请求越过交卷。
    async fn submit_direct(&mut self, trigger: &str) -> Result<()> {
        if self.session.submitted {
            debug!("[提交] 闸门已占用，跳过 ({trigger})");
            return Ok(());
        }
        self.session.submitted = true;
        self.autosave_ticks_left = None;

        info!("📤 正在交卷 ({trigger}) ...");
        let answers = self.store.to_wire();
        match self.client.submit(&self.session.test_id, &answers).await {
            Ok(result) => {
                self.session.submitted_result = Some(result);
                self.enter_ended();
                info!("✅ 交卷成功 ({trigger})");
            }
            Err(e) => {
                // 可恢复：释放闸门允许重试，自动保存按原间隔恢复
                self.session.submitted = false;
                if self.session.phase == Phase::Test {
                    self.autosave_ticks_left = Some(self.config.autosave_interval_seconds);
                }
                error!("❌ 交卷失败 ({trigger})，可重试: {e}");
            }
        }
        Ok(())
    }

    /// 违规倒计时归零：先尽力上报，服务端若已自动交卷则采纳其结果，
    /// 否则客户端直接交卷兜底
    async fn on_violation_timeout(&mut self) -> Result<()> {
        warn!("⚠️ 违规倒计时归零，进入强制交卷流程");
        let answers = self.store.to_wire();
        match self
            .client
            .report_fullscreen_violation(&self.session.test_id.clone(), &answers)
            .await
        {
            Ok(ack) => {
                if self.apply_server_auto_submit(&ack) {
                    return Ok(());
                }
            }
            Err(e) => warn!("违规上报失败（忽略）: {e}"),
        }
        if !self.session.submitted {
            self.submit_direct("违规超时").await?;
        }
        Ok(())
    }

    /// 服务端指示"已自动交卷"：始终压过本地状态，无条件进入终态
    fn apply_server_auto_submit(&mut self, ack: &ProctorAck) -> bool {
        if !ack.auto_submitted {
            return false;
        }
        self.session.submitted = true;
        self.session.submitted_result = Some(ack.result.clone());
        self.enter_ended();
        warn!("🛑 服务端已因监考违规自动交卷，采纳服务端结果");
        true
    }

    /// 进入终态：同步取消所有计时器
    fn enter_ended(&mut self) {
        self.session.phase = Phase::Ended;
        self.session.global_seconds_left = None;
        self.autosave_ticks_left = None;
        self.scheduler.cancel_countdown();
        self.proctor.cancel_violation();
        info!("🏁 会话结束");
    }
}

/// end_datetime（RFC3339）到现在的剩余秒数，已过期取 0
fn seconds_until(end: &str) -> Option<u64> {
    let end = chrono::DateTime::parse_from_rfc3339(end).ok()?;
    let delta = end.signed_duration_since(chrono::Utc::now());
    Some(delta.num_seconds().max(0) as u64)
}
