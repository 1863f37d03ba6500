//! 编排层（Orchestrator Layer）
//!
//! ## 职责
//!
//! ### `app` - 应用编排
//! - 初始化配置、HTTP 客户端、会话引擎
//! - 主循环：1 Hz 心跳与命令流合流，逐个事件送入引擎
//! - 会话结束后打印最终结果

pub mod app;

pub use app::App;
