//! 日志初始化
//!
//! 基于 tracing + EnvFilter，默认级别 info，可用 RUST_LOG 覆盖

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// 重复调用是安全的（后续调用会被忽略）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 格式化秒数为 HH:MM:SS / MM:SS 形式，用于倒计时展示
pub fn human_time(seconds: Option<u64>) -> String {
    match seconds {
        None => "--:--".to_string(),
        Some(s) => {
            let hrs = s / 3600;
            let mins = (s % 3600) / 60;
            let sec = s % 60;
            if hrs > 0 {
                format!("{:02}:{:02}:{:02}", hrs, mins, sec)
            } else {
                format!("{:02}:{:02}", mins, sec)
            }
        }
    }
}
