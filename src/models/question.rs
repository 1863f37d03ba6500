use serde::{Deserialize, Serialize};

/// 题目类型
///
/// 代替散落各处的类型字符串比较；保存/合并/跳题行为按变体区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// 选择题（单选或多选）
    Mcq,
    /// 排序题
    Rearrange,
    /// 编程题
    Coding,
}

impl Default for QuestionType {
    fn default() -> Self {
        QuestionType::Mcq
    }
}

impl QuestionType {
    /// 该类型的答案是否按集合语义合并（并集 + 去重）
    ///
    /// 编程题的答案是历次提交 ID 的集合；其他类型每次保存整体替换
    pub fn merges_as_set(&self) -> bool {
        matches!(self, QuestionType::Coding)
    }
}

/// 题目引用（不含题面内容，渲染由外部协作方负责）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRef {
    pub id: String,
    pub question_type: QuestionType,
    /// 仅对 MCQ 有意义：是否多选
    #[serde(default)]
    pub is_multiple: bool,
}

impl QuestionRef {
    /// 保存答案后是否自动跳到下一题
    ///
    /// 单选题保存即自动下一题；多选题停留；排序题保存后前进；编程题停留
    pub fn auto_advances_on_save(&self) -> bool {
        match self.question_type {
            QuestionType::Mcq => !self.is_multiple,
            QuestionType::Rearrange => true,
            QuestionType::Coding => false,
        }
    }
}

/// 题目的作答状态
///
/// viewed 在首次导航到该题或首次写入答案时置位；
/// solved 只在成功保存时置位，"不保存跳过"与"清空"不会置位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionState {
    pub viewed: bool,
    pub solved: bool,
}
