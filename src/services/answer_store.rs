//! 答案仓库 - 业务能力层
//!
//! 唯一权威的按题答案映射。所有写入都在这一份数据上做读-改-写，
//! 自动保存、交卷、状态查询读到的永远是同一份最新快照。
//!
//! 合并规则：
//! - 编程题：答案是提交 ID 的集合，新值与旧值取并集去重
//! - 其他类型：每次写入整体替换
//!
//! 空序列是合法且会被持久化的答案（"清空"不删除记录）。

use std::collections::BTreeMap;

use crate::models::question::{QuestionRef, QuestionState};
use crate::models::wire::{normalize_answer_value, AnswerValue, WireAnswerMap, WireAnswers};
use crate::models::Section;

/// 原始作答输入，写入时归一化为字符串序列（标量 → 单元素序列）
#[derive(Debug, Clone)]
pub enum AnswerInput {
    Single(String),
    Multi(Vec<String>),
}

impl AnswerInput {
    fn normalize(self) -> Vec<String> {
        match self {
            AnswerInput::Single(v) => vec![v],
            AnswerInput::Multi(vs) => vs,
        }
    }
}

impl From<String> for AnswerInput {
    fn from(v: String) -> Self {
        AnswerInput::Single(v)
    }
}

impl From<&str> for AnswerInput {
    fn from(v: &str) -> Self {
        AnswerInput::Single(v.to_string())
    }
}

impl From<Vec<String>> for AnswerInput {
    fn from(vs: Vec<String>) -> Self {
        AnswerInput::Multi(vs)
    }
}

/// 单题答案记录；values 永远存在（可能为空），绝不为 null
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub values: Vec<String>,
    pub question_type: crate::models::QuestionType,
}

/// 答案仓库
#[derive(Debug, Default)]
pub struct AnswerStore {
    answers: BTreeMap<String, BTreeMap<String, AnswerRecord>>,
    states: BTreeMap<String, BTreeMap<String, QuestionState>>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存答案（正常保存路径）：viewed = true，solved = true
    pub fn save(&mut self, section_id: &str, question: &QuestionRef, input: AnswerInput) {
        self.write(section_id, question, input.normalize());
        self.set_state(section_id, &question.id, true, Some(true));
    }

    /// 清空答案："清空"路径：记录保留（空序列），viewed = true，solved = false
    pub fn clear(&mut self, section_id: &str, question: &QuestionRef) {
        let record = self
            .answers
            .entry(section_id.to_string())
            .or_default()
            .entry(question.id.clone())
            .or_insert_with(|| AnswerRecord {
                values: Vec::new(),
                question_type: question.question_type,
            });
        record.values.clear();
        record.question_type = question.question_type;
        self.set_state(section_id, &question.id, true, Some(false));
    }

    /// 读取当前答案；缺失时为空序列，永不回源网络
    pub fn read(&self, section_id: &str, question_id: &str) -> &[String] {
        self.answers
            .get(section_id)
            .and_then(|m| m.get(question_id))
            .map(|r| r.values.as_slice())
            .unwrap_or(&[])
    }

    /// 标记题目已浏览（导航路径，不改变 solved）
    pub fn mark_viewed(&mut self, section_id: &str, question_id: &str) {
        self.set_state(section_id, question_id, true, None);
    }

    pub fn state(&self, section_id: &str, question_id: &str) -> QuestionState {
        self.states
            .get(section_id)
            .and_then(|m| m.get(question_id))
            .copied()
            .unwrap_or_default()
    }

    /// 会话开始前用服务端已保存的答案回填仓库
    ///
    /// 已有答案的题目同时标记为 viewed + solved
    pub fn hydrate(&mut self, saved: &WireAnswers, sections: &[Section]) {
        for section in sections {
            let Some(answer_map) = saved.get(&section.id) else {
                continue;
            };
            for (idx, question) in section.questions.iter().enumerate() {
                let raw = answer_map
                    .get(&question.id)
                    .or_else(|| answer_map.get(&idx.to_string()));
                let Some(raw) = raw else { continue };
                let values = normalize_answer_value(raw);
                if values.is_empty() {
                    continue;
                }
                self.write(&section.id, question, values);
                self.set_state(&section.id, &question.id, true, Some(true));
            }
        }
    }

    /// 导出为线上形状：sectionId → questionId → {value, questionType}
    pub fn to_wire(&self) -> WireAnswerMap {
        self.answers
            .iter()
            .map(|(section_id, questions)| {
                let entries = questions
                    .iter()
                    .map(|(question_id, record)| {
                        (
                            question_id.clone(),
                            AnswerValue {
                                value: record.values.clone(),
                                question_type: Some(record.question_type),
                            },
                        )
                    })
                    .collect();
                (section_id.clone(), entries)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// 核心写入：按题型合并或替换
    fn write(&mut self, section_id: &str, question: &QuestionRef, incoming: Vec<String>) {
        let record = self
            .answers
            .entry(section_id.to_string())
            .or_default()
            .entry(question.id.clone())
            .or_insert_with(|| AnswerRecord {
                values: Vec::new(),
                question_type: question.question_type,
            });
        record.question_type = question.question_type;

        if question.question_type.merges_as_set() {
            for value in incoming {
                if !record.values.contains(&value) {
                    record.values.push(value);
                }
            }
        } else {
            record.values = incoming;
        }
    }

    fn set_state(&mut self, section_id: &str, question_id: &str, viewed: bool, solved: Option<bool>) {
        let state = self
            .states
            .entry(section_id.to_string())
            .or_default()
            .entry(question_id.to_string())
            .or_default();
        state.viewed = state.viewed || viewed;
        if let Some(solved) = solved {
            state.solved = solved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;

    fn mcq(id: &str) -> QuestionRef {
        QuestionRef {
            id: id.into(),
            question_type: QuestionType::Mcq,
            is_multiple: false,
        }
    }

    fn coding(id: &str) -> QuestionRef {
        QuestionRef {
            id: id.into(),
            question_type: QuestionType::Coding,
            is_multiple: false,
        }
    }

    #[test]
    fn mcq_write_replaces_wholesale() {
        let mut store = AnswerStore::new();
        let q = mcq("q1");
        store.save("s1", &q, vec!["A".to_string(), "B".to_string()].into());
        store.save("s1", &q, "C".into());
        assert_eq!(store.read("s1", "q1"), ["C"]);
    }

    #[test]
    fn coding_merge_is_commutative_and_idempotent() {
        let q = coding("q1");

        let mut ab = AnswerStore::new();
        ab.save("s1", &q, "A".into());
        ab.save("s1", &q, "B".into());

        let mut ba = AnswerStore::new();
        ba.save("s1", &q, "B".into());
        ba.save("s1", &q, "A".into());

        let mut sorted_ab: Vec<_> = ab.read("s1", "q1").to_vec();
        let mut sorted_ba: Vec<_> = ba.read("s1", "q1").to_vec();
        sorted_ab.sort();
        sorted_ba.sort();
        assert_eq!(sorted_ab, sorted_ba);

        // 幂等：{A} 合并两次仍是 {A}
        let mut twice = AnswerStore::new();
        twice.save("s1", &q, "A".into());
        twice.save("s1", &q, "A".into());
        assert_eq!(twice.read("s1", "q1"), ["A"]);
    }

    #[test]
    fn clear_keeps_record_and_resets_solved() {
        let mut store = AnswerStore::new();
        let q = mcq("q1");
        store.save("s1", &q, "A".into());
        assert!(store.state("s1", "q1").solved);

        store.clear("s1", &q);
        let state = store.state("s1", "q1");
        assert!(state.viewed);
        assert!(!state.solved);
        // 空序列是合法持久化答案，记录仍在线上快照里
        let wire = store.to_wire();
        assert!(wire["s1"]["q1"].value.is_empty());
    }

    #[test]
    fn read_missing_is_empty() {
        let store = AnswerStore::new();
        assert!(store.read("s1", "nope").is_empty());
    }

    #[test]
    fn viewed_without_solve() {
        let mut store = AnswerStore::new();
        store.mark_viewed("s1", "q1");
        let state = store.state("s1", "q1");
        assert!(state.viewed);
        assert!(!state.solved);
    }

    #[test]
    fn hydrate_marks_prior_answers_solved() {
        use serde_json::json;
        let section = Section {
            id: "s1".into(),
            name: "A".into(),
            kind: crate::models::SectionKind::Open,
            duration_seconds: 0,
            questions: vec![mcq("q1"), mcq("q2")],
        };
        let saved: WireAnswers = serde_json::from_value(json!({
            "s1": {"q1": ["B"], "q2": {"value": [], "questionType": "mcq"}}
        }))
        .unwrap();

        let mut store = AnswerStore::new();
        store.hydrate(&saved, std::slice::from_ref(&section));
        assert_eq!(store.read("s1", "q1"), ["B"]);
        assert!(store.state("s1", "q1").solved);
        // 空答案不回填状态
        assert!(!store.state("s1", "q2").viewed);
    }
}
