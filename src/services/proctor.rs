//! 监考监视器 - 业务能力层
//!
//! 两个独立信号源，一个状态机：
//! 1. 全屏信号：说明阶段丢失全屏只阻塞进度；考试阶段丢失全屏启动违规倒计时
//! 2. 可见性/焦点信号：边沿触发，visible→hidden 才计数，同一物理动作触发的
//!    多个事件（visibilitychange + blur）在去重窗口内折叠为一次
//!
//! 监视器自己不决定交卷，只负责启停倒计时；倒计时归零由提交生命周期处理。

use crate::config::Config;

/// 可见性/焦点信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabSignal {
    /// 页面隐藏（visibilitychange → hidden）
    Hidden,
    /// 窗口失焦（blur）
    Blur,
    /// 页面恢复可见
    Visible,
    /// 窗口获得焦点
    Focus,
}

impl TabSignal {
    fn is_away(&self) -> bool {
        matches!(self, TabSignal::Hidden | TabSignal::Blur)
    }
}

/// 监考监视器状态机
#[derive(Debug)]
pub struct ProctorMonitor {
    dedup_window_ms: u64,
    max_tab_switches: u64,
    violation_total_seconds: u64,

    tab_switch_count: u64,
    last_edge_at_ms: u64,
    prev_hidden: bool,
    violation_seconds_left: Option<u64>,
}

impl ProctorMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            dedup_window_ms: config.tab_event_dedup_ms,
            max_tab_switches: config.max_tab_switches,
            violation_total_seconds: config.violation_seconds,
            tab_switch_count: 0,
            last_edge_at_ms: 0,
            prev_hidden: false,
            violation_seconds_left: None,
        }
    }

    /// 处理一次可见性/焦点信号
    ///
    /// 返回 true 表示这是一次计数的切屏边沿（visible→hidden 且不在去重窗口内）
    pub fn on_tab_signal(&mut self, signal: TabSignal, at_ms: u64) -> bool {
        // 同一物理动作可能同时触发 visibilitychange 和 blur，窗口内只算一次
        if at_ms.saturating_sub(self.last_edge_at_ms) < self.dedup_window_ms {
            return false;
        }
        self.last_edge_at_ms = at_ms;

        let away = signal.is_away();
        let counted = !self.prev_hidden && away;
        self.prev_hidden = away;

        if counted {
            self.tab_switch_count += 1;
        }
        counted
    }

    /// 采纳服务端统计的切屏次数（计数保持单调不减）
    pub fn adopt_server_count(&mut self, server_count: u64) {
        self.tab_switch_count = self.tab_switch_count.max(server_count);
    }

    pub fn tab_switch_count(&self) -> u64 {
        self.tab_switch_count
    }

    /// 次数是否超限（超限且不在全屏时才升级为违规）
    pub fn over_threshold(&self) -> bool {
        self.tab_switch_count >= self.max_tab_switches
    }

    /// 启动违规倒计时；已在运行时返回 false
    pub fn start_violation(&mut self) -> bool {
        if self.violation_seconds_left.is_some() {
            return false;
        }
        self.violation_seconds_left = Some(self.violation_total_seconds);
        true
    }

    /// 取消违规倒计时（重新进入全屏）；下次启动从全时长重新开始，不是续跑
    pub fn cancel_violation(&mut self) {
        self.violation_seconds_left = None;
    }

    pub fn violation_active(&self) -> bool {
        self.violation_seconds_left.is_some()
    }

    pub fn violation_seconds_left(&self) -> Option<u64> {
        self.violation_seconds_left
    }

    /// 违规倒计时走一秒；归零时返回 true 并自动停表
    pub fn tick_violation(&mut self) -> bool {
        let Some(remaining) = self.violation_seconds_left else {
            return false;
        };
        if remaining <= 1 {
            self.violation_seconds_left = None;
            true
        } else {
            self.violation_seconds_left = Some(remaining - 1);
            false
        }
    }
}
