use serde::{Deserialize, Serialize};

use super::question::QuestionRef;

/// 分区类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    /// 限时分区：按数组顺序依次完成，不可回访
    TimeRestricted,
    /// 开放分区：所有限时分区结束后开放，自由导航
    Open,
}

/// 试卷分区
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub kind: SectionKind,
    /// 限时分区的时长（秒）；未设置或无法解析时为 0
    pub duration_seconds: u64,
    pub questions: Vec<QuestionRef>,
}

impl Section {
    pub fn question_at(&self, index: usize) -> Option<&QuestionRef> {
        self.questions.get(index)
    }

    pub fn find_question(&self, question_id: &str) -> Option<&QuestionRef> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}
