//! 会话引擎集成测试
//!
//! 用内存桩替换 HTTP 客户端，验证阶段状态机、分区调度、
//! 监考升级、自动保存与提交生命周期的端到端行为。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_test::assert_ok;

use attempt_session::error::{SessionError, SessionResult};
use attempt_session::models::{AttemptData, Instruction, ProctorAck, WireAnswerMap};
use attempt_session::services::TabSignal;
use attempt_session::workflow::{Phase, SessionEngine, SessionEvent};
use attempt_session::{AnswerInput, Config, ExamApi};

// ========== 内存桩 ==========

#[derive(Default)]
struct MockState {
    attempt_payload: Mutex<Value>,
    fail_attempt: AtomicBool,
    fail_instructions: AtomicBool,
    fail_submit: AtomicBool,
    fail_reports: AtomicBool,
    report_ack: Mutex<Value>,
    submit_calls: AtomicUsize,
    autosave_calls: AtomicUsize,
    tab_reports: AtomicUsize,
    violation_reports: AtomicUsize,
    last_autosave: Mutex<Option<WireAnswerMap>>,
}

#[derive(Clone, Default)]
struct MockExamApi {
    state: Arc<MockState>,
}

impl MockExamApi {
    fn with_payload(payload: Value) -> Self {
        let mock = Self::default();
        *mock.state.attempt_payload.lock().unwrap() = payload;
        mock
    }

    fn submit_calls(&self) -> usize {
        self.state.submit_calls.load(Ordering::SeqCst)
    }

    fn autosave_calls(&self) -> usize {
        self.state.autosave_calls.load(Ordering::SeqCst)
    }

    fn tab_reports(&self) -> usize {
        self.state.tab_reports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExamApi for MockExamApi {
    async fn fetch_instructions(&self, _test_id: &str) -> SessionResult<Vec<Instruction>> {
        if self.state.fail_instructions.load(Ordering::SeqCst) {
            return Err(SessionError::bad_response("/instructions", "503"));
        }
        Ok(vec![Instruction {
            id: "srv-1".into(),
            title: "Test Instructions".into(),
            content: "来自服务端的说明".into(),
            format: "text".into(),
        }])
    }

    async fn fetch_attempt(&self, _test_id: &str) -> SessionResult<AttemptData> {
        if self.state.fail_attempt.load(Ordering::SeqCst) {
            return Err(SessionError::PayloadFetch("网络不可达".into()));
        }
        let payload = self.state.attempt_payload.lock().unwrap().clone();
        Ok(serde_json::from_value(payload)?)
    }

    async fn report_tab_switch(
        &self,
        _test_id: &str,
        _answers: &WireAnswerMap,
    ) -> SessionResult<ProctorAck> {
        self.state.tab_reports.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_reports.load(Ordering::SeqCst) {
            return Err(SessionError::bad_response("/tab-switch", "503"));
        }
        let ack = self.state.report_ack.lock().unwrap().clone();
        Ok(ProctorAck::from_response(ack))
    }

    async fn report_fullscreen_violation(
        &self,
        _test_id: &str,
        _answers: &WireAnswerMap,
    ) -> SessionResult<ProctorAck> {
        self.state.violation_reports.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_reports.load(Ordering::SeqCst) {
            return Err(SessionError::bad_response("/fullscreen-violation", "503"));
        }
        let ack = self.state.report_ack.lock().unwrap().clone();
        Ok(ProctorAck::from_response(ack))
    }

    async fn autosave(
        &self,
        _attempt_id: &str,
        _test_id: &str,
        answers: &WireAnswerMap,
    ) -> SessionResult<()> {
        self.state.autosave_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_autosave.lock().unwrap() = Some(answers.clone());
        Ok(())
    }

    async fn submit(&self, _test_id: &str, _answers: &WireAnswerMap) -> SessionResult<Value> {
        self.state.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_submit.load(Ordering::SeqCst) {
            return Err(SessionError::bad_response("/submit", "500"));
        }
        Ok(json!({"status": "submitted"}))
    }
}

// ========== 测试夹具 ==========

fn test_config() -> Config {
    Config {
        test_id: "t-1".into(),
        instruction_total_seconds: 0,
        violation_seconds: 2,
        max_tab_switches: 5,
        tab_event_dedup_ms: 1000,
        autosave_interval_seconds: 2,
        ..Config::default()
    }
}

fn mcq(id: &str) -> Value {
    json!({"id": id, "question_type": "mcq", "is_multiple": false})
}

fn open_only_payload() -> Value {
    json!({
        "test": {
            "test_name": "开放模式测试",
            "duration_seconds": 100,
            "sections_time_restricted": [],
            "sections_open": [{
                "id": "o1",
                "name": "开放分区",
                "questions": [
                    mcq("q1"),
                    {"id": "q2", "question_type": "mcq", "is_multiple": true},
                    {"id": "q3", "question_type": "coding"},
                ],
            }],
        },
        "test_assignment_id": "att-1",
    })
}

/// 进入全屏并开始考试（说明倒计时配置为 0）
async fn started_engine(mock: &MockExamApi, config: Config) -> SessionEngine<MockExamApi> {
    let mut engine = SessionEngine::new(config, mock.clone());
    assert_ok!(engine.handle_event(SessionEvent::EnterFullscreen).await);
    assert_ok!(engine.handle_event(SessionEvent::StartRequested).await);
    engine
}

async fn tick(engine: &mut SessionEngine<MockExamApi>) {
    engine.handle_event(SessionEvent::Tick).await.unwrap();
}

fn hidden_at(at_ms: u64) -> SessionEvent {
    SessionEvent::TabSignal {
        signal: TabSignal::Hidden,
        at_ms,
    }
}

fn visible_at(at_ms: u64) -> SessionEvent {
    SessionEvent::TabSignal {
        signal: TabSignal::Visible,
        at_ms,
    }
}

// ========== 阶段状态机 ==========

#[tokio::test]
async fn instruction_countdown_pauses_without_fullscreen() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let config = Config {
        instruction_total_seconds: 2,
        ..test_config()
    };
    let mut engine = SessionEngine::new(config, mock.clone());

    // 未进入全屏：倒计时不走
    tick(&mut engine).await;
    assert_eq!(engine.session().instruction_seconds_left, 2);

    engine.handle_event(SessionEvent::EnterFullscreen).await.unwrap();
    tick(&mut engine).await;
    assert_eq!(engine.session().instruction_seconds_left, 1);

    // 倒计时未归零：开始请求被拒绝
    engine.handle_event(SessionEvent::StartRequested).await.unwrap();
    assert_eq!(engine.session().phase, Phase::Instructions);

    tick(&mut engine).await;
    assert_eq!(engine.session().instruction_seconds_left, 0);

    // 页面隐藏收回全屏授权，开始仍被拒绝
    engine.handle_event(hidden_at(10_000)).await.unwrap();
    engine.handle_event(SessionEvent::StartRequested).await.unwrap();
    assert_eq!(engine.session().phase, Phase::Instructions);

    engine.handle_event(SessionEvent::EnterFullscreen).await.unwrap();
    engine.handle_event(SessionEvent::StartRequested).await.unwrap();
    assert_eq!(engine.session().phase, Phase::Test);
}

#[tokio::test]
async fn open_mode_active_without_timed_sections() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let engine = started_engine(&mock, test_config()).await;

    assert_eq!(engine.session().phase, Phase::Test);
    assert!(engine.scheduler().open_mode());
    assert_eq!(engine.session().global_seconds_left, Some(100));
    assert!(engine.autosave_armed());
    assert_eq!(engine.session().test_name, "开放模式测试");
}

#[tokio::test]
async fn payload_fetch_failure_is_a_dead_end() {
    let mock = MockExamApi::default();
    mock.state.fail_attempt.store(true, Ordering::SeqCst);
    let mut engine = started_engine(&mock, test_config()).await;

    assert!(engine.session().fatal_error.is_some());
    assert_eq!(engine.session().global_seconds_left, None);
    assert!(!engine.autosave_armed());

    // 死端：心跳无效、交卷不可用
    tick(&mut engine).await;
    engine.handle_event(SessionEvent::SubmitRequested).await.unwrap();
    assert_eq!(mock.submit_calls(), 0);
    assert_eq!(mock.autosave_calls(), 0);
    assert_eq!(engine.session().phase, Phase::Test);
}

#[tokio::test]
async fn instructions_failure_falls_back_to_builtin_defaults() {
    let mock = MockExamApi::default();
    mock.state.fail_instructions.store(true, Ordering::SeqCst);
    let mut engine = SessionEngine::new(test_config(), mock.clone());

    engine.load_instructions().await;
    assert_eq!(engine.instructions().len(), 3);

    mock.state.fail_instructions.store(false, Ordering::SeqCst);
    engine.load_instructions().await;
    assert_eq!(engine.instructions().len(), 1);
    assert_eq!(engine.instructions()[0].title, "Test Instructions");
}

// ========== 作答与导航 ==========

#[tokio::test]
async fn single_choice_auto_advances_but_multiple_stays() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let mut engine = started_engine(&mock, test_config()).await;

    // 单选保存：自动跳到下一题
    engine
        .handle_event(SessionEvent::SaveAnswer {
            section_id: "o1".into(),
            question_id: "q1".into(),
            answer: AnswerInput::Single("A".into()),
        })
        .await
        .unwrap();
    assert_eq!(engine.scheduler().current_question_index(), 1);
    assert_eq!(engine.store().read("o1", "q1"), ["A"]);

    // 多选保存：停留在原题
    engine
        .handle_event(SessionEvent::SaveAnswer {
            section_id: "o1".into(),
            question_id: "q2".into(),
            answer: AnswerInput::Multi(vec!["A".into(), "C".into()]),
        })
        .await
        .unwrap();
    assert_eq!(engine.scheduler().current_question_index(), 1);
}

#[tokio::test]
async fn coding_answers_merge_as_set() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let mut engine = started_engine(&mock, test_config()).await;

    for submission in ["sub-1", "sub-2", "sub-1"] {
        engine
            .handle_event(SessionEvent::SaveAnswer {
                section_id: "o1".into(),
                question_id: "q3".into(),
                answer: AnswerInput::Single(submission.into()),
            })
            .await
            .unwrap();
    }
    assert_eq!(engine.store().read("o1", "q3"), ["sub-1", "sub-2"]);
}

#[tokio::test]
async fn timed_mode_restricts_navigation_to_active_section() {
    let payload = json!({
        "test": {
            "test_name": "限时测试",
            "sections_time_restricted": [
                {"id": "t1", "name": "一", "duration": 2, "questions": [mcq("a1"), mcq("a2")]},
                {"id": "t2", "name": "二", "duration": "3", "questions": [mcq("b1")]},
            ],
            "sections_open": [],
        },
        "test_assignment_id": "att-1",
    });
    let mock = MockExamApi::with_payload(payload);
    let mut engine = started_engine(&mock, test_config()).await;

    // duration 字符串 "3" 也按分钟解析：2*60 + 3*60
    assert_eq!(engine.session().global_seconds_left, Some(300));

    engine
        .handle_event(SessionEvent::Navigate {
            section_id: "t2".into(),
            question_index: 0,
        })
        .await
        .unwrap();
    assert_eq!(engine.scheduler().current_section().unwrap().id, "t1");

    engine
        .handle_event(SessionEvent::Navigate {
            section_id: "t1".into(),
            question_index: 1,
        })
        .await
        .unwrap();
    assert_eq!(engine.scheduler().current_question_index(), 1);
    assert!(engine.store().state("t1", "a2").viewed);

    // 手动推进：不可返回，完成集合只增
    engine.handle_event(SessionEvent::AdvanceSection).await.unwrap();
    assert_eq!(engine.scheduler().current_section().unwrap().id, "t2");
    assert!(engine.scheduler().completed_sections().contains("t1"));
    assert!(!engine.scheduler().open_mode());

    engine.handle_event(SessionEvent::AdvanceSection).await.unwrap();
    assert!(engine.scheduler().open_mode());
    assert_eq!(engine.scheduler().completed_sections().len(), 2);
}

#[tokio::test]
async fn saved_answers_hydrate_before_session() {
    let mut payload = open_only_payload();
    payload["answers"] = json!({
        "o1": {"q1": ["B"], "q3": {"value": ["sub-9"], "questionType": "coding"}}
    });
    let mock = MockExamApi::with_payload(payload);
    let engine = started_engine(&mock, test_config()).await;

    assert_eq!(engine.store().read("o1", "q1"), ["B"]);
    assert_eq!(engine.store().read("o1", "q3"), ["sub-9"]);
    assert!(engine.store().state("o1", "q1").solved);
}

// ========== 监考 ==========

#[tokio::test]
async fn tab_signals_within_dedup_window_collapse() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let mut engine = started_engine(&mock, test_config()).await;

    engine.handle_event(hidden_at(10_000)).await.unwrap();
    // 同一物理动作触发的 blur：900ms 内，不计数不上报
    engine
        .handle_event(SessionEvent::TabSignal {
            signal: TabSignal::Blur,
            at_ms: 10_900,
        })
        .await
        .unwrap();
    assert_eq!(engine.proctor().tab_switch_count(), 1);
    assert_eq!(mock.tab_reports(), 1);

    engine.handle_event(visible_at(13_000)).await.unwrap();
    engine.handle_event(hidden_at(15_000)).await.unwrap();
    assert_eq!(engine.proctor().tab_switch_count(), 2);
    assert_eq!(mock.tab_reports(), 2);
}

#[tokio::test]
async fn over_threshold_in_fullscreen_does_not_start_violation() {
    let mock = MockExamApi::with_payload(open_only_payload());
    *mock.state.report_ack.lock().unwrap() = json!({"data": {"tab_switches_count": 7}});
    let mut engine = started_engine(&mock, test_config()).await;

    // 服务端计数 7 超过上限 5，但仍在全屏：只计数，不启动倒计时
    engine.handle_event(hidden_at(10_000)).await.unwrap();
    assert_eq!(engine.proctor().tab_switch_count(), 7);
    assert!(engine.proctor().over_threshold());
    assert!(!engine.proctor().violation_active());

    // 失去全屏后才升级为违规
    engine.handle_event(SessionEvent::LeaveFullscreen).await.unwrap();
    assert!(engine.proctor().violation_active());

    // 回到全屏：同步取消，下次从全时长重来
    engine.handle_event(SessionEvent::EnterFullscreen).await.unwrap();
    assert!(!engine.proctor().violation_active());
}

#[tokio::test]
async fn violation_timeout_with_failed_report_submits_once() {
    let mock = MockExamApi::with_payload(open_only_payload());
    mock.state.fail_reports.store(true, Ordering::SeqCst);
    let mut engine = started_engine(&mock, test_config()).await;

    engine.handle_event(SessionEvent::LeaveFullscreen).await.unwrap();
    assert!(engine.proctor().violation_active());

    tick(&mut engine).await;
    assert_eq!(engine.proctor().violation_seconds_left(), Some(1));
    tick(&mut engine).await;

    // 上报失败被吞掉，客户端直接交卷兜底
    assert_eq!(mock.state.violation_reports.load(Ordering::SeqCst), 1);
    assert_eq!(mock.submit_calls(), 1);
    assert_eq!(engine.session().phase, Phase::Ended);
    assert!(engine.session().submitted);
}

#[tokio::test]
async fn server_auto_submit_verdict_is_adopted() {
    let mock = MockExamApi::with_payload(open_only_payload());
    *mock.state.report_ack.lock().unwrap() =
        json!({"data": {"auto_submitted": true, "score": 42}});
    let mut engine = started_engine(&mock, test_config()).await;

    engine.handle_event(hidden_at(10_000)).await.unwrap();

    // 服务端裁决压过本地状态：不再发本地交卷请求
    assert_eq!(engine.session().phase, Phase::Ended);
    assert!(engine.session().submitted);
    assert_eq!(mock.submit_calls(), 0);
    let result = engine.session().submitted_result.as_ref().unwrap();
    assert_eq!(result["score"], 42);

    // 终态：后续事件全部忽略
    engine.handle_event(SessionEvent::SubmitRequested).await.unwrap();
    tick(&mut engine).await;
    assert_eq!(mock.submit_calls(), 0);
}

// ========== 自动保存 ==========

#[tokio::test]
async fn autosave_sends_latest_snapshot() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let mut engine = started_engine(&mock, test_config()).await;

    engine
        .handle_event(SessionEvent::SaveAnswer {
            section_id: "o1".into(),
            question_id: "q1".into(),
            answer: AnswerInput::Single("A".into()),
        })
        .await
        .unwrap();
    tick(&mut engine).await;
    // 周期到来前又写入了一次，发出去的必须是此刻的最新快照
    engine
        .handle_event(SessionEvent::SaveAnswer {
            section_id: "o1".into(),
            question_id: "q2".into(),
            answer: AnswerInput::Multi(vec!["C".into()]),
        })
        .await
        .unwrap();
    tick(&mut engine).await;

    assert_eq!(mock.autosave_calls(), 1);
    let sent = mock.state.last_autosave.lock().unwrap().clone().unwrap();
    assert_eq!(sent["o1"]["q1"].value, ["A"]);
    assert_eq!(sent["o1"]["q2"].value, ["C"]);
}

#[tokio::test]
async fn autosave_stops_synchronously_on_submit() {
    let mock = MockExamApi::with_payload(open_only_payload());
    let mut engine = started_engine(&mock, test_config()).await;

    engine.handle_event(SessionEvent::SubmitRequested).await.unwrap();
    assert_eq!(engine.session().phase, Phase::Ended);
    assert!(!engine.autosave_armed());

    for _ in 0..5 {
        tick(&mut engine).await;
    }
    assert_eq!(mock.autosave_calls(), 0);
}

// ========== 提交生命周期 ==========

#[tokio::test]
async fn failed_submit_releases_gate_and_rearms_autosave() {
    let mock = MockExamApi::with_payload(open_only_payload());
    mock.state.fail_submit.store(true, Ordering::SeqCst);
    let mut engine = started_engine(&mock, test_config()).await;

    engine.handle_event(SessionEvent::SubmitRequested).await.unwrap();
    assert_eq!(mock.submit_calls(), 1);
    assert_eq!(engine.session().phase, Phase::Test);
    assert!(!engine.session().submitted);
    assert!(engine.autosave_armed());

    // 重试成功后进入终态
    mock.state.fail_submit.store(false, Ordering::SeqCst);
    engine.handle_event(SessionEvent::SubmitRequested).await.unwrap();
    assert_eq!(mock.submit_calls(), 2);
    assert_eq!(engine.session().phase, Phase::Ended);
}

#[tokio::test]
async fn global_timeout_and_violation_same_tick_submit_once() {
    let mut payload = open_only_payload();
    payload["test"]["duration_seconds"] = json!(2);
    let mock = MockExamApi::with_payload(payload);
    let mut engine = started_engine(&mock, test_config()).await;

    // 违规倒计时与全局倒计时同时在 2 秒后归零
    engine.handle_event(SessionEvent::LeaveFullscreen).await.unwrap();
    tick(&mut engine).await;
    tick(&mut engine).await;

    // 全局超时先触发，交卷闸门保证只有一次网络提交
    assert_eq!(mock.submit_calls(), 1);
    assert_eq!(engine.session().phase, Phase::Ended);
}

#[tokio::test]
async fn submit_requires_assignment_id() {
    let mut payload = open_only_payload();
    payload.as_object_mut().unwrap().remove("test_assignment_id");
    let mock = MockExamApi::with_payload(payload);
    let mut engine = started_engine(&mock, test_config()).await;

    engine.handle_event(SessionEvent::SubmitRequested).await.unwrap();
    assert_eq!(mock.submit_calls(), 0);
    assert_eq!(engine.session().phase, Phase::Test);
    // 没有作答记录 ID 时自动保存也不发请求
    tick(&mut engine).await;
    tick(&mut engine).await;
    assert_eq!(mock.autosave_calls(), 0);
}
