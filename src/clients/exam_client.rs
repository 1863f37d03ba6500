//! 考试服务 API 客户端 - 基础设施层
//!
//! 封装所有与后端考试服务相关的调用；引擎只依赖 `ExamApi` 能力接口，
//! 测试时可以换成内存桩实现。

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::{SessionError, SessionResult};
use crate::models::instruction::title_for_type;
use crate::models::wire::{ApiEnvelope, AttemptData, InstructionsData};
use crate::models::{Instruction, ProctorAck, WireAnswerMap};

/// 考试服务能力接口
///
/// 六个线上契约：说明、作答载荷、切屏上报、违规上报、自动保存、交卷
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// 获取考试说明
    async fn fetch_instructions(&self, test_id: &str) -> SessionResult<Vec<Instruction>>;

    /// 获取作答载荷（分区、已保存答案、截止时间）
    async fn fetch_attempt(&self, test_id: &str) -> SessionResult<AttemptData>;

    /// 上报一次切屏，附带当前答案快照
    async fn report_tab_switch(
        &self,
        test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<ProctorAck>;

    /// 上报全屏违规，附带当前答案快照
    async fn report_fullscreen_violation(
        &self,
        test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<ProctorAck>;

    /// 自动保存（即发即忘）
    async fn autosave(
        &self,
        attempt_id: &str,
        test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<()>;

    /// 交卷，返回服务端结果
    async fn submit(&self, test_id: &str, answers: &WireAnswerMap) -> SessionResult<Value>;
}

/// 基于 reqwest 的 HTTP 客户端实现
pub struct HttpExamClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpExamClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> SessionResult<Value> {
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SessionError::api_request_failed(path, e))?;
        resp.json()
            .await
            .map_err(|e| SessionError::api_request_failed(path, e))
    }

    async fn post_json(&self, path: &str, body: &Value) -> SessionResult<Value> {
        debug!("POST {} Payload: {}", path, body);
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| SessionError::api_request_failed(path, e))?;
        resp.json()
            .await
            .map_err(|e| SessionError::api_request_failed(path, e))
    }
}

#[async_trait]
impl ExamApi for HttpExamClient {
    async fn fetch_instructions(&self, test_id: &str) -> SessionResult<Vec<Instruction>> {
        let path = format!("/api/students/test/instructions/{test_id}");
        let body = self.get_json(&path).await?;
        let envelope: ApiEnvelope<InstructionsData> = serde_json::from_value(body)?;
        if !envelope.success {
            return Err(SessionError::bad_response(
                &path,
                envelope.message.unwrap_or_else(|| "success=false".into()),
            ));
        }
        let items = envelope.data.map(|d| d.instructions).unwrap_or_default();
        let mapped = items
            .into_iter()
            .enumerate()
            .map(|(idx, it)| {
                let content = match it.content {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Instruction {
                    id: it
                        .id
                        .unwrap_or_else(|| format!("srv-{}-{idx}", it.kind.as_deref().unwrap_or("ins"))),
                    title: it
                        .title
                        .unwrap_or_else(|| title_for_type(it.kind.as_deref(), idx)),
                    content,
                    format: it.format.unwrap_or_else(|| "text".into()),
                }
            })
            .collect();
        Ok(mapped)
    }

    async fn fetch_attempt(&self, test_id: &str) -> SessionResult<AttemptData> {
        let path = format!("/api/students/test/attempt/{test_id}");
        let body = self.get_json(&path).await?;
        let envelope: ApiEnvelope<AttemptData> = serde_json::from_value(body)?;
        if !envelope.success {
            return Err(SessionError::bad_response(
                &path,
                envelope.message.unwrap_or_else(|| "success=false".into()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| SessionError::bad_response(&path, "响应缺少 data"))
    }

    async fn report_tab_switch(
        &self,
        test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<ProctorAck> {
        let body = json!({ "test_id": test_id, "answers": answers });
        let resp = self.post_json("/api/students/test/tab-switch", &body).await?;
        Ok(ProctorAck::from_response(resp))
    }

    async fn report_fullscreen_violation(
        &self,
        test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<ProctorAck> {
        let body = json!({ "test_id": test_id, "answers": answers });
        let resp = self
            .post_json("/api/students/test/fullscreen-violation", &body)
            .await?;
        Ok(ProctorAck::from_response(resp))
    }

    async fn autosave(
        &self,
        attempt_id: &str,
        test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<()> {
        let body = json!({
            "attemptId": attempt_id,
            "answers": answers,
            "test_id": test_id,
        });
        self.post_json("/api/students/test/auto-save", &body).await?;
        Ok(())
    }

    async fn submit(&self, test_id: &str, answers: &WireAnswerMap) -> SessionResult<Value> {
        let path = "/api/students/test/submit";
        let body = json!({ "test_id": test_id, "answers": answers });
        let resp = self.post_json(path, &body).await?;
        let success = resp.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !success {
            let message = resp
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("交卷被拒绝")
                .to_string();
            return Err(SessionError::bad_response(path, message));
        }
        Ok(resp.get("data").cloned().unwrap_or(resp))
    }
}
