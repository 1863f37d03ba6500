//! 会话事件 - 流程层
//!
//! 把散落的回调收敛为一张有名字的事件表：定时器、用户动作、平台信号
//! 都变成 SessionEvent，由 SessionEngine 按到达顺序逐个处理。

use crate::services::answer_store::AnswerInput;
use crate::services::proctor::TabSignal;

/// 会话引擎的输入事件
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// 1 Hz 心跳：驱动所有倒计时（说明、全局、分区、违规、自动保存）
    Tick,
    /// 进入全屏
    EnterFullscreen,
    /// 退出全屏
    LeaveFullscreen,
    /// 可见性/焦点信号，at_ms 为事件发生的毫秒时间戳（用于去重窗口）
    TabSignal { signal: TabSignal, at_ms: u64 },
    /// 说明阅读完毕，显式开始考试
    StartRequested,
    /// 保存答案（正常保存路径）
    SaveAnswer {
        section_id: String,
        question_id: String,
        answer: AnswerInput,
    },
    /// 清空答案（记录保留、solved 归零）
    ClearAnswer {
        section_id: String,
        question_id: String,
    },
    /// 不保存直接跳到下一题
    NextWithoutSave,
    /// 导航到指定 (分区, 题目下标)
    Navigate {
        section_id: String,
        question_index: usize,
    },
    /// 手动推进分区（外部已确认"不可返回"）
    AdvanceSection,
    /// 手动交卷（外部已通过确认提示）
    SubmitRequested,
}
