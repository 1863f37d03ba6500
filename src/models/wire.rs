//! 线上契约（wire）类型
//!
//! 后端考试服务的请求/响应形状。历史数据字段宽松（数字可能以字符串出现、
//! 题目对象可能多包一层 question、答案可能是标量/数组/{value:[...]}），
//! 反序列化时统一做归一化。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::question::{QuestionRef, QuestionType};
use super::section::{Section, SectionKind};

/// 标准响应信封 `{success, message?, data?}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "none_data")]
    pub data: Option<T>,
}

fn none_data<T>() -> Option<T> {
    None
}

/// 考试说明响应的 data 部分
#[derive(Debug, Clone, Deserialize)]
pub struct InstructionsData {
    #[serde(default)]
    pub instructions: Vec<WireInstruction>,
}

/// 服务端说明条目
#[derive(Debug, Clone, Deserialize)]
pub struct WireInstruction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub content: Value,
}

/// 作答载荷响应的 data 部分
#[derive(Debug, Clone, Deserialize)]
pub struct AttemptData {
    #[serde(default)]
    pub test: Option<WireTest>,
    #[serde(default)]
    pub test_assignment_id: Option<String>,
    /// 已保存的答案，若存在则在会话开始前回填答案仓库
    #[serde(default)]
    pub answers: Option<WireAnswers>,
}

/// 试卷描述
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireTest {
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub sections_time_restricted: Vec<WireSection>,
    #[serde(default)]
    pub sections_open: Vec<WireSection>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub end_datetime: Option<String>,
}

/// 分区的线上形状；duration 单位为分钟，可能是数字或数字字符串
#[derive(Debug, Clone, Deserialize)]
pub struct WireSection {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub questions: Vec<WireQuestion>,
}

/// 题目的线上形状，部分数据把真实题目包在 question 字段里
#[derive(Debug, Clone, Deserialize)]
pub struct WireQuestion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub is_multiple: Option<bool>,
    #[serde(default)]
    pub question: Option<Box<WireQuestion>>,
}

impl WireQuestion {
    /// 归一化为 QuestionRef；id 缺失时回退到题目下标
    pub fn resolve(&self, index: usize) -> QuestionRef {
        let inner = self.question.as_deref().unwrap_or(self);
        let id = inner
            .id
            .clone()
            .or_else(|| inner.question_id.clone())
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| index.to_string());
        let question_type = self
            .question_type
            .or(inner.question_type)
            .unwrap_or_default();
        let is_multiple = self.is_multiple.or(inner.is_multiple).unwrap_or(false);
        QuestionRef {
            id,
            question_type,
            is_multiple,
        }
    }
}

impl WireSection {
    /// 转为引擎内部的 Section；限时分区把分钟换算为秒
    pub fn into_section(self, kind: SectionKind) -> Section {
        let duration_seconds = match kind {
            SectionKind::TimeRestricted => parse_duration_minutes(self.duration.as_ref()) * 60,
            SectionKind::Open => 0,
        };
        let questions = self
            .questions
            .iter()
            .enumerate()
            .map(|(idx, q)| q.resolve(idx))
            .collect();
        Section {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            kind,
            duration_seconds,
            questions,
        }
    }
}

/// duration 字段解析：数字或数字字符串，失败时取 0
pub fn parse_duration_minutes(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// 服务端已保存答案：sectionId → questionId → 原始值
pub type WireAnswers = BTreeMap<String, BTreeMap<String, Value>>;

/// 发往服务端的答案：sectionId → questionId → {value, questionType}
pub type WireAnswerMap = BTreeMap<String, BTreeMap<String, AnswerValue>>;

/// 单题答案的线上形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerValue {
    pub value: Vec<String>,
    #[serde(rename = "questionType", default)]
    pub question_type: Option<QuestionType>,
}

/// 把历史答案值归一化为字符串序列
///
/// 兼容三种形状：标量、数组、{value: [...]}
pub fn normalize_answer_value(raw: &Value) -> Vec<String> {
    match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        Value::Object(map) => match map.get("value") {
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            _ => Vec::new(),
        },
        other => vec![value_to_string(other)],
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 切屏/违规上报的应答
///
/// 服务端对是否已自动交卷有最终裁决权，auto_submitted 一旦为真，
/// 本地必须无条件采纳服务端结果并结束会话
#[derive(Debug, Clone, Default)]
pub struct ProctorAck {
    pub tab_switches_count: Option<u64>,
    pub auto_submitted: bool,
    pub result: Value,
}

impl ProctorAck {
    /// 从任意形状的响应体提取应答；data 缺失时退回整个响应体
    pub fn from_response(body: Value) -> Self {
        let data = body.get("data").cloned().unwrap_or(body);
        let truthy = |key: &str| {
            data.get(key)
                .map(|v| v.as_bool().unwrap_or(!v.is_null()))
                .unwrap_or(false)
        };
        ProctorAck {
            tab_switches_count: data.get("tab_switches_count").and_then(Value::as_u64),
            auto_submitted: truthy("auto_submitted") || truthy("submitted"),
            result: data,
        }
    }
}
