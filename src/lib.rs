//! # Attempt Session
//!
//! 一个驱动在线监考作答会话的 Rust 客户端引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 持有 HTTP 连接，只暴露考试服务的能力
//! - `ExamApi` - 考试服务接口（说明 / 载荷 / 上报 / 保存 / 交卷）
//! - `HttpExamClient` - reqwest 实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，各自独立、互不感知
//! - `AnswerStore` - 答案仓库（保存 / 清空 / 回填 / 出线）
//! - `SectionScheduler` - 分区调度（限时依次 → 开放自由）
//! - `ProctorMonitor` - 监考监视（切屏计数 + 违规倒计时）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次作答会话"的完整流程
//! - `SessionEvent` - 事件表（心跳 / 用户动作 / 平台信号）
//! - `SessionEngine` - 会话引擎（阶段状态机 + 提交生命周期）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用编排，心跳与命令流合流送入引擎
//!
//! ## 并发模型
//!
//! 单任务独占全部可变状态；所有倒计时由同一个 1 Hz 心跳驱动，
//! 取消永远是同步的。网络 await 是唯一的挂起点。

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ExamApi, HttpExamClient};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use models::{Instruction, QuestionRef, QuestionType, Section, SectionKind};
pub use orchestrator::App;
pub use services::{AnswerInput, AnswerStore, ProctorMonitor, SectionScheduler, TabSignal};
pub use workflow::{AttemptSession, Phase, SessionEngine, SessionEvent};
