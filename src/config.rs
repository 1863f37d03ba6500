use serde::Deserialize;

/// 程序配置文件
///
/// 不同历史版本对违规倒计时时长（30s / 3000s）和切屏次数上限（5 / 500）
/// 取值不一致，这里统一收敛为可配置项并给出规范默认值。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端考试服务地址
    pub api_base_url: String,
    /// 后端认证令牌
    pub api_token: String,
    /// 本次作答的测试 ID
    pub test_id: String,
    /// 考试说明阅读倒计时（秒）
    pub instruction_total_seconds: u64,
    /// 退出全屏后的违规宽限倒计时（秒）
    pub violation_seconds: u64,
    /// 切屏次数上限，超过且不在全屏时触发违规倒计时
    pub max_tab_switches: u64,
    /// 切屏事件去重窗口（毫秒），同一物理动作触发的多个信号只计一次
    pub tab_event_dedup_ms: u64,
    /// 自动保存间隔（秒）
    pub autosave_interval_seconds: u64,
    /// 开放模式下单选题保存后是否自动跳到下一题
    pub open_mcq_auto_advance: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: String::new(),
            test_id: String::new(),
            instruction_total_seconds: 120,
            violation_seconds: 30,
            max_tab_switches: 5,
            tab_event_dedup_ms: 1000,
            autosave_interval_seconds: 5,
            open_mcq_auto_advance: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(default.api_base_url),
            api_token: std::env::var("API_TOKEN").unwrap_or(default.api_token),
            test_id: std::env::var("TEST_ID").unwrap_or(default.test_id),
            instruction_total_seconds: std::env::var("INSTRUCTION_TOTAL_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.instruction_total_seconds),
            violation_seconds: std::env::var("VIOLATION_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.violation_seconds),
            max_tab_switches: std::env::var("MAX_TAB_SWITCHES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_tab_switches),
            tab_event_dedup_ms: std::env::var("TAB_EVENT_DEDUP_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.tab_event_dedup_ms),
            autosave_interval_seconds: std::env::var("AUTOSAVE_INTERVAL_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.autosave_interval_seconds),
            open_mcq_auto_advance: std::env::var("OPEN_MCQ_AUTO_ADVANCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.open_mcq_auto_advance),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，未出现的字段使用默认值
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_canonical() {
        let config = Config::default();
        assert_eq!(config.violation_seconds, 30);
        assert_eq!(config.max_tab_switches, 5);
        assert_eq!(config.tab_event_dedup_ms, 1000);
        assert_eq!(config.autosave_interval_seconds, 5);
        assert!(config.open_mcq_auto_advance);
    }

    #[test]
    fn from_toml_overrides_partial_fields() {
        let config: Config = toml::from_str("violation_seconds = 60\ntest_id = \"t-1\"").unwrap();
        assert_eq!(config.violation_seconds, 60);
        assert_eq!(config.test_id, "t-1");
        assert_eq!(config.max_tab_switches, 5);
    }
}
