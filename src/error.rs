//! 应用程序错误类型
//!
//! 错误分为四类语义：
//! - 致命错误：试卷载荷获取失败，会话进入死端
//! - 降级错误：考试说明获取失败，回退到内置默认说明
//! - 吞掉的尽力而为错误：切屏/违规上报、自动保存失败，只记日志
//! - 可恢复错误：交卷失败，释放提交闸门后允许重试

use thiserror::Error;

/// 会话引擎错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// API 请求失败（网络层）
    #[error("API请求失败 ({endpoint}): {source}")]
    Api {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// API 返回错误响应（success=false 或缺少 data）
    #[error("API返回错误响应 ({endpoint}): {message}")]
    BadResponse { endpoint: String, message: String },

    /// 试卷载荷获取失败：致命错误，会话死端
    #[error("试卷载荷获取失败: {0}")]
    PayloadFetch(String),

    /// 当前阶段不允许该操作
    #[error("当前阶段不允许该操作: {0}")]
    InvalidPhase(&'static str),

    /// 配置错误
    #[error("配置错误 ({name}): {reason}")]
    Config { name: String, reason: String },

    /// JSON 解析失败
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    /// 创建 API 请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SessionError::Api {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// 创建错误响应错误
    pub fn bad_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        SessionError::BadResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// 会话引擎结果类型
pub type SessionResult<T> = Result<T, SessionError>;
