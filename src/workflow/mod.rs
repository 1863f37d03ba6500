//! 流程层（Workflow Layer）
//!
//! ## 职责
//!
//! 定义"一次作答会话"的完整流程：
//!
//! ### `events` - 事件表
//! - 定时器、用户动作、平台信号统一为 SessionEvent
//!
//! ### `engine` - 会话引擎
//! - 阶段状态机（说明 → 考试 → 结束）
//! - 持有唯一权威会话状态（调度器、答案仓库、监考监视器）
//! - 提交生命周期（手动 / 全局超时 / 违规超时 / 服务端裁决）
//! - 自动保存循环
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (事件源：心跳 + 命令流)
//!     ↓
//! workflow::SessionEngine (处理单个 SessionEvent)
//!     ↓
//! services (能力层：store / scheduler / proctor)
//!     ↓
//! clients (基础设施：ExamApi)
//! ```

pub mod engine;
pub mod events;

pub use engine::{AttemptSession, Phase, SessionEngine};
pub use events::SessionEvent;
