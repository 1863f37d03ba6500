//! 应用编排 - 编排层
//!
//! 把配置、HTTP 客户端、1 Hz 心跳和命令流接到会话引擎上。
//! 命令流模拟外部协作方（渲染层 / 平台信号源）发来的动作；
//! 引擎内部不区分命令来自终端还是真实前端。

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::clients::HttpExamClient;
use crate::config::Config;
use crate::logger::human_time;
use crate::models::Instruction;
use crate::services::answer_store::AnswerInput;
use crate::services::proctor::TabSignal;
use crate::workflow::{AttemptSession, Phase, SessionEngine, SessionEvent};

/// 应用主结构
pub struct App {
    engine: SessionEngine<HttpExamClient>,
}

impl App {
    /// 初始化应用：加载说明，准备引擎
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);
        if config.test_id.is_empty() {
            anyhow::bail!("缺少 TEST_ID 配置，无法开始作答会话");
        }
        let client = HttpExamClient::new(&config);
        let mut engine = SessionEngine::new(config, client);
        engine.load_instructions().await;
        print_instructions(engine.instructions());
        Ok(Self { engine })
    }

    /// 运行主循环：心跳与命令流合流，直到会话结束
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        info!("💡 输入 help 查看可用命令；先 fs on 进入全屏，倒计时结束后 start 开始");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.engine.handle_event(SessionEvent::Tick).await?;
                }
                line = lines.next_line() => {
                    match line? {
                        None => break,
                        Some(line) => self.handle_line(line.trim()).await?,
                    }
                }
            }
            if self.engine.session().phase == Phase::Ended {
                print_final_result(self.engine.session());
                break;
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let events = match command {
            "help" => {
                print_help();
                return Ok(());
            }
            "status" => {
                self.print_status();
                return Ok(());
            }
            "fs" => match parts.next() {
                Some("on") => vec![SessionEvent::EnterFullscreen],
                Some("off") => vec![SessionEvent::LeaveFullscreen],
                _ => {
                    warn!("用法: fs on|off");
                    return Ok(());
                }
            },
            "hide" => vec![SessionEvent::TabSignal {
                signal: TabSignal::Hidden,
                at_ms: now_ms(),
            }],
            "blur" => vec![SessionEvent::TabSignal {
                signal: TabSignal::Blur,
                at_ms: now_ms(),
            }],
            "show" => vec![SessionEvent::TabSignal {
                signal: TabSignal::Visible,
                at_ms: now_ms(),
            }],
            "start" => vec![SessionEvent::StartRequested],
            "answer" => {
                let (Some(section_id), Some(question_id)) = (parts.next(), parts.next()) else {
                    warn!("用法: answer <分区ID> <题目ID> <值...>");
                    return Ok(());
                };
                let values: Vec<String> = parts.map(str::to_string).collect();
                vec![SessionEvent::SaveAnswer {
                    section_id: section_id.to_string(),
                    question_id: question_id.to_string(),
                    answer: AnswerInput::Multi(values),
                }]
            }
            "clear" => {
                let (Some(section_id), Some(question_id)) = (parts.next(), parts.next()) else {
                    warn!("用法: clear <分区ID> <题目ID>");
                    return Ok(());
                };
                vec![SessionEvent::ClearAnswer {
                    section_id: section_id.to_string(),
                    question_id: question_id.to_string(),
                }]
            }
            "skip" => vec![SessionEvent::NextWithoutSave],
            "goto" => {
                let (Some(section_id), Some(index)) = (parts.next(), parts.next()) else {
                    warn!("用法: goto <分区ID> <题目下标>");
                    return Ok(());
                };
                let Ok(question_index) = index.parse() else {
                    warn!("题目下标必须是数字");
                    return Ok(());
                };
                vec![SessionEvent::Navigate {
                    section_id: section_id.to_string(),
                    question_index,
                }]
            }
            "advance" => vec![SessionEvent::AdvanceSection],
            "submit" => vec![SessionEvent::SubmitRequested],
            other => {
                warn!("未知命令: {other}（输入 help 查看）");
                return Ok(());
            }
        };
        for event in events {
            self.engine.handle_event(event).await?;
        }
        Ok(())
    }

    fn print_status(&self) {
        let session = self.engine.session();
        let scheduler = self.engine.scheduler();
        info!("{}", "─".repeat(50));
        info!("阶段: {:?} | 已交卷: {}", session.phase, session.submitted);
        info!(
            "全屏: {} | 切屏次数: {} | 违规倒计时: {}",
            session.fullscreen_granted,
            self.engine.proctor().tab_switch_count(),
            human_time(self.engine.proctor().violation_seconds_left())
        );
        match session.phase {
            Phase::Instructions => info!(
                "说明倒计时: {}",
                human_time(Some(session.instruction_seconds_left))
            ),
            Phase::Test => {
                info!("全局剩余: {}", human_time(session.global_seconds_left));
                if scheduler.open_mode() {
                    info!("开放模式 | 已完成分区: {:?}", scheduler.completed_sections());
                } else {
                    info!(
                        "当前分区: {} | 分区剩余: {}",
                        scheduler
                            .current_section()
                            .map(|s| s.name.as_str())
                            .unwrap_or("-"),
                        human_time(scheduler.section_seconds_left())
                    );
                }
                if let Some(question) = scheduler.current_question() {
                    let section_id = scheduler.current_section().map(|s| s.id.clone()).unwrap_or_default();
                    info!(
                        "当前题目: {} ({:?}) 答案: {:?}",
                        question.id,
                        question.question_type,
                        self.engine.store().read(&section_id, &question.id)
                    );
                }
            }
            Phase::Ended => {}
        }
        info!("{}", "─".repeat(50));
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 监考作答会话");
    info!("📝 测试 ID: {}", config.test_id);
    info!(
        "📊 违规宽限 {}s | 切屏上限 {} | 自动保存每 {}s",
        config.violation_seconds, config.max_tab_switches, config.autosave_interval_seconds
    );
    info!("{}", "=".repeat(60));
}

fn print_instructions(instructions: &[Instruction]) {
    info!("📖 考试说明（共 {} 条）:", instructions.len());
    for instruction in instructions {
        info!("  [{}] {}", instruction.title, instruction.content);
    }
}

fn print_final_result(session: &AttemptSession) {
    info!("{}", "=".repeat(60));
    info!("📊 会话结束");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if session.submitted {
        info!("✅ 已交卷");
        if let Some(result) = &session.submitted_result {
            info!("服务端结果: {result}");
        }
    } else if let Some(error) = &session.fatal_error {
        info!("❌ 会话因错误终止: {error}");
    }
    info!("{}", "=".repeat(60));
}

fn print_help() {
    info!("可用命令:");
    info!("  fs on|off        进入/退出全屏");
    info!("  hide|blur|show   模拟页面隐藏/失焦/恢复");
    info!("  start            说明倒计时结束后开始考试");
    info!("  answer <分区> <题目> <值...>   保存答案");
    info!("  clear <分区> <题目>            清空答案");
    info!("  skip             不保存跳到下一题");
    info!("  goto <分区> <下标>             导航（开放模式自由）");
    info!("  advance          手动推进分区（不可返回）");
    info!("  submit           交卷");
    info!("  status           查看会话状态");
}
