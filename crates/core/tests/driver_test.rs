// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use treq_api::{CliEvent, EnvelopeKind, EventKind, ServerEnvelope};
use treq_core::batch::{BATCH_CLOSE_CODE, BATCH_CLOSE_REASON};
use treq_core::consumer::CONTROL_SOCKET_CLOSED;
use treq_core::driver::{DRAIN_FORCE_CODE, DRAIN_FORCE_REASON};
use treq_core::interactive::{STDIN_ENDED_CLOSE_CODE, STDIN_ENDED_CLOSE_REASON};
use treq_core::shutdown::{INTERRUPT_CLOSE_CODE, INTERRUPT_CLOSE_REASON};
use treq_core::{
    async_trait, run_session, BatchInput, ChannelLineSource, ConnectedSession, DriverContext,
    EventSink, InputEvent, RunReport, SessionConnection, SessionError, SessionInfo, SessionMode,
    ShutdownCoordinator, VecLineSource,
};

type EnvelopeTx = mpsc::UnboundedSender<Result<ServerEnvelope, SessionError>>;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Text(String),
    Json(Value),
    Ping,
    Close(u16, String),
    Disconnect(u16, String),
}

/// In-memory control plane: echoes sends as outbound envelopes and, when
/// `acks_close` is set, answers a close request with a `closed` envelope.
struct MockConnection {
    calls: Mutex<Vec<Call>>,
    tx: Mutex<Option<EnvelopeTx>>,
    seq: AtomicU64,
    acks_close: bool,
}

impl MockConnection {
    fn push(&self, kind: EnvelopeKind, payload: Value) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(ServerEnvelope::new(kind, seq, payload)));
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn close_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| matches!(c, Call::Close(..))).collect()
    }
}

#[async_trait]
impl SessionConnection for MockConnection {
    async fn send_text(&self, text: &str) -> treq_core::error::Result<()> {
        self.calls.lock().unwrap().push(Call::Text(text.to_string()));
        self.push(EnvelopeKind::Outbound, json!({"payloadType": "text", "payload": text}));
        Ok(())
    }

    async fn send_json(&self, payload: &Value) -> treq_core::error::Result<()> {
        self.calls.lock().unwrap().push(Call::Json(payload.clone()));
        self.push(EnvelopeKind::Outbound, json!({"payloadType": "json", "payload": payload}));
        Ok(())
    }

    async fn ping(&self) -> treq_core::error::Result<()> {
        self.calls.lock().unwrap().push(Call::Ping);
        Ok(())
    }

    async fn close(&self, code: u16, reason: &str) -> treq_core::error::Result<()> {
        self.calls.lock().unwrap().push(Call::Close(code, reason.to_string()));
        if self.acks_close {
            self.push(
                EnvelopeKind::Closed,
                json!({"code": code, "reason": reason, "wasClean": true}),
            );
        }
        Ok(())
    }

    async fn disconnect(&self, code: u16, reason: &str) -> treq_core::error::Result<()> {
        self.calls.lock().unwrap().push(Call::Disconnect(code, reason.to_string()));
        self.tx.lock().unwrap().take();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<CliEvent>>,
    notices: Mutex<Vec<String>>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &CliEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

impl RecordingSink {
    fn types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(CliEvent::type_name).collect()
    }

    fn errors(&self) -> Vec<CliEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Error { .. }))
            .cloned()
            .collect()
    }
}

struct Harness {
    connection: Arc<MockConnection>,
    sink: Arc<RecordingSink>,
    session: ConnectedSession,
    ctx: DriverContext,
}

fn harness(acks_close: bool) -> Harness {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = Arc::new(MockConnection {
        calls: Mutex::new(Vec::new()),
        tx: Mutex::new(Some(tx)),
        seq: AtomicU64::new(0),
        acks_close,
    });
    let sink = Arc::new(RecordingSink::default());
    let session = ConnectedSession {
        info: SessionInfo {
            url: "ws://localhost:8080/x".into(),
            session_id: "ws_1".into(),
            subprotocol: None,
        },
        connection: connection.clone(),
        envelopes: UnboundedReceiverStream::new(rx).boxed(),
    };
    let ctx = DriverContext::new(sink.clone(), Arc::new(|| 1_000));
    Harness { connection, sink, session, ctx }
}

fn no_interrupts() -> mpsc::UnboundedReceiver<()> {
    // Keep the sender alive for the whole test so the watcher stays idle.
    let (tx, rx) = mpsc::unbounded_channel();
    std::mem::forget(tx);
    rx
}

fn assert_summary_last(sink: &RecordingSink, report: &RunReport) {
    let types = sink.types();
    assert_eq!(types.first(), Some(&"meta.connected"));
    assert_eq!(types.last(), Some(&"meta.summary"));
    assert_eq!(types.iter().filter(|t| **t == "meta.summary").count(), 1);

    let events = sink.events.lock().unwrap();
    let EventKind::Summary { sent, received, failed, .. } = events.last().unwrap().kind else {
        panic!("last event is not a summary");
    };
    assert_eq!((sent, received, failed), (report.sent, report.received, report.failed));
}

#[tokio::test]
async fn batch_single_payload_sends_once_then_closes() {
    let h = harness(true);
    let report = run_session(
        h.session,
        SessionMode::Batch { input: BatchInput::Payload("{\"ping\":true}".into()), wait_seconds: 0 },
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    assert_eq!(
        h.connection.calls(),
        vec![
            Call::Text("{\"ping\":true}".into()),
            Call::Close(BATCH_CLOSE_CODE, BATCH_CLOSE_REASON.into()),
        ]
    );
    assert!(h.ctx.state.is_close_requested());
    assert!(h.ctx.state.is_closed());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.sent, 1);
    assert_summary_last(&h.sink, &report);
}

#[tokio::test]
async fn batch_lines_skip_blank_entries() {
    let h = harness(true);
    let lines = VecLineSource::new(["first", "", "   ", "second"]);
    let report = run_session(
        h.session,
        SessionMode::Batch { input: BatchInput::Lines(Box::new(lines)), wait_seconds: 0 },
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    let texts: Vec<Call> =
        h.connection.calls().into_iter().filter(|c| matches!(c, Call::Text(_))).collect();
    assert_eq!(texts, vec![Call::Text("first".into()), Call::Text("second".into())]);
    assert_eq!(report.sent, 2);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn interrupt_closes_once_and_exits_cleanly() {
    let h = harness(true);
    // The input never produces a line, as if the user is idle at the prompt.
    let (_line_tx, line_rx) = mpsc::channel::<InputEvent>(1);
    let (int_tx, int_rx) = mpsc::unbounded_channel();
    int_tx.send(()).unwrap();
    int_tx.send(()).unwrap();

    let report = run_session(
        h.session,
        SessionMode::Interactive(Box::new(ChannelLineSource::new(line_rx))),
        h.ctx.clone(),
        int_rx,
    )
    .await;

    assert_eq!(
        h.connection.close_calls(),
        vec![Call::Close(INTERRUPT_CLOSE_CODE, INTERRUPT_CLOSE_REASON.into())]
    );
    assert_eq!(report.exit_code(), 0);
    assert!(h.sink.types().contains(&"meta.closed"));
    assert_summary_last(&h.sink, &report);
    assert_eq!(h.sink.notices.lock().unwrap().as_slice(), ["Interrupted, closing session"]);
}

#[tokio::test]
async fn double_interrupt_issues_a_single_close() {
    let h = harness(true);
    let shutdown =
        ShutdownCoordinator::new(h.connection.clone(), h.ctx.state.clone(), h.sink.clone());

    // Nothing marks the session closed here, so cancel the force timers.
    let _ = tokio::time::timeout(std::time::Duration::from_millis(50), async {
        tokio::join!(shutdown.interrupt(), shutdown.interrupt());
    })
    .await;

    assert_eq!(h.connection.close_calls().len(), 1);
}

#[tokio::test]
async fn interactive_dispatches_commands_in_order() {
    let h = harness(true);
    let lines = VecLineSource::new([
        "hello",
        "   ",
        "/json {\"a\":1}",
        "/bogus",
        "/ping",
        "/close 4000 \"bye now\"",
        "never sent",
    ]);
    let report = run_session(
        h.session,
        SessionMode::Interactive(Box::new(lines)),
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    assert_eq!(
        h.connection.calls(),
        vec![
            Call::Text("hello".into()),
            Call::Json(json!({"a": 1})),
            Call::Ping,
            Call::Close(4000, "bye now".into()),
        ]
    );
    let notices = h.sink.notices.lock().unwrap().clone();
    assert_eq!(notices, vec!["Unknown command: /bogus. Type /help for available commands."]);
    assert_eq!(report.sent, 2);
    assert_eq!(report.exit_code(), 0);
    assert_summary_last(&h.sink, &report);
}

#[tokio::test]
async fn interactive_end_of_input_closes_on_behalf_of_user() {
    let h = harness(true);
    let report = run_session(
        h.session,
        SessionMode::Interactive(Box::new(VecLineSource::new(["hi"]))),
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    assert_eq!(
        h.connection.close_calls(),
        vec![Call::Close(STDIN_ENDED_CLOSE_CODE, STDIN_ENDED_CLOSE_REASON.into())]
    );
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn server_close_ends_interactive_loop() {
    let h = harness(true);
    h.connection.push(EnvelopeKind::Inbound, json!({"payloadType": "text", "payload": "welcome"}));
    h.connection.push(EnvelopeKind::Closed, json!({"code": 1000, "reason": "server done"}));
    let (_line_tx, line_rx) = mpsc::channel::<InputEvent>(1);

    let report = run_session(
        h.session,
        SessionMode::Interactive(Box::new(ChannelLineSource::new(line_rx))),
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    assert!(h.connection.calls().is_empty());
    assert_eq!(h.sink.types(), ["meta.connected", "ws.inbound", "meta.closed", "meta.summary"]);
    assert_eq!(report.received, 1);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn drain_timeout_forces_disconnect() {
    let h = harness(false);
    let report = run_session(
        h.session,
        SessionMode::Batch { input: BatchInput::Payload("x".into()), wait_seconds: 0 },
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    assert_eq!(
        h.connection.calls(),
        vec![
            Call::Text("x".into()),
            Call::Close(BATCH_CLOSE_CODE, BATCH_CLOSE_REASON.into()),
            Call::Disconnect(DRAIN_FORCE_CODE, DRAIN_FORCE_REASON.into()),
        ]
    );
    // Ending the stream ourselves is not a failure.
    assert!(h.sink.errors().is_empty());
    assert_eq!(report.exit_code(), 0);
    assert_summary_last(&h.sink, &report);
}

#[tokio::test]
async fn unexpected_socket_end_fails_the_run() {
    let h = harness(true);
    h.connection.push(EnvelopeKind::Inbound, json!({"payload": "one"}));
    h.connection.tx.lock().unwrap().take();

    let report = run_session(
        h.session,
        SessionMode::Batch { input: BatchInput::Payload("x".into()), wait_seconds: -1 },
        h.ctx.clone(),
        no_interrupts(),
    )
    .await;

    let errors = h.sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0].kind,
        EventKind::Error { code: Some(code), .. } if code == CONTROL_SOCKET_CLOSED
    ));
    assert!(report.failed);
    assert_eq!(report.exit_code(), 1);
    assert_summary_last(&h.sink, &report);
}

#[tokio::test]
async fn wait_forever_keeps_session_open_until_interrupt() {
    let h = harness(true);
    let (int_tx, int_rx) = mpsc::unbounded_channel();
    let connection = h.connection.clone();

    let run = tokio::spawn(run_session(
        h.session,
        SessionMode::Batch { input: BatchInput::Payload("hold".into()), wait_seconds: -1 },
        h.ctx.clone(),
        int_rx,
    ));

    // Let the batch controller finish; the session must still be open.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(connection.close_calls().is_empty());
    assert!(!h.ctx.state.is_closing());

    int_tx.send(()).unwrap();
    let report = run.await.unwrap();

    assert_eq!(
        connection.close_calls(),
        vec![Call::Close(INTERRUPT_CLOSE_CODE, INTERRUPT_CLOSE_REASON.into())]
    );
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_interrupt_forces_disconnect() {
    let h = harness(false);
    let (_line_tx, line_rx) = mpsc::channel::<InputEvent>(1);
    let (int_tx, int_rx) = mpsc::unbounded_channel();
    int_tx.send(()).unwrap();

    let report = run_session(
        h.session,
        SessionMode::Interactive(Box::new(ChannelLineSource::new(line_rx))),
        h.ctx.clone(),
        int_rx,
    )
    .await;

    assert_eq!(
        h.connection.calls(),
        vec![
            Call::Close(INTERRUPT_CLOSE_CODE, INTERRUPT_CLOSE_REASON.into()),
            Call::Disconnect(INTERRUPT_CLOSE_CODE, INTERRUPT_CLOSE_REASON.into()),
        ]
    );
    assert!(h.sink.errors().is_empty());
    assert_eq!(report.exit_code(), 0);
    assert_summary_last(&h.sink, &report);
}

#[tokio::test(start_paused = true)]
async fn acknowledged_interrupt_skips_disconnect() {
    let h = harness(true);
    let (_line_tx, line_rx) = mpsc::channel::<InputEvent>(1);
    let (int_tx, int_rx) = mpsc::unbounded_channel();
    int_tx.send(()).unwrap();

    let report = run_session(
        h.session,
        SessionMode::Interactive(Box::new(ChannelLineSource::new(line_rx))),
        h.ctx.clone(),
        int_rx,
    )
    .await;

    assert!(!h.connection.calls().iter().any(|c| matches!(c, Call::Disconnect(..))));
    assert!(h.ctx.state.is_closed());
    assert_eq!(report.exit_code(), 0);
    assert_summary_last(&h.sink, &report);
}

#[tokio::test(start_paused = true)]
async fn interrupt_deadline_respects_an_observed_close() {
    let h = harness(true);
    let shutdown =
        ShutdownCoordinator::new(h.connection.clone(), h.ctx.state.clone(), h.sink.clone());

    // The close lands while the force timer is still running.
    let state = h.ctx.state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        state.mark_closed();
    });
    shutdown.interrupt().await;

    assert_eq!(
        h.connection.calls(),
        vec![Call::Close(INTERRUPT_CLOSE_CODE, INTERRUPT_CLOSE_REASON.into())]
    );
}
