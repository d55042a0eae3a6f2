// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Top-level orchestration of one session.
//!
//! ```text
//!  meta.connected
//!       │
//!       ├── consumer loop task ─────────────────────────────┐
//!       ├── interrupt watcher task                          │
//!       └── controller (interactive | batch) ── race ───────┤
//!                                                           ▼
//!                         drain-then-force (if closing) / await consumer
//!                                                           ▼
//!                                                     meta.summary
//! ```
//!
//! The summary is emitted only after the consumer loop has reached a terminal
//! state, so it is always the last event.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use treq_api::{CliEvent, EventKind};

use crate::batch::{BatchController, BatchInput};
use crate::connection::ConnectedSession;
use crate::consumer::consume_envelopes;
use crate::input::LineSource;
use crate::interactive::InteractiveController;
use crate::reporter::{report_run, RunReport};
use crate::shutdown::{ConsumerTask, ShutdownCoordinator, DRAIN_TIMEOUT};
use crate::sink::EventSink;
use crate::state::{Clock, RunState};

pub const DRAIN_FORCE_CODE: u16 = 1000;
pub const DRAIN_FORCE_REASON: &str = "drain timeout";

pub enum SessionMode {
    Interactive(Box<dyn LineSource>),
    Batch { input: BatchInput, wait_seconds: i64 },
}

/// Everything a run shares across its tasks.
#[derive(Clone)]
pub struct DriverContext {
    pub state: Arc<RunState>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Clock,
}

impl DriverContext {
    pub fn new(sink: Arc<dyn EventSink>, clock: Clock) -> Self {
        Self { state: Arc::new(RunState::new()), sink, clock }
    }
}

/// Drives one connected session to completion and reports it.
///
/// Every unit sent on `interrupts` is treated as an interrupt signal.
pub async fn run_session(
    session: ConnectedSession,
    mode: SessionMode,
    ctx: DriverContext,
    interrupts: mpsc::UnboundedReceiver<()>,
) -> RunReport {
    let ConnectedSession { info, connection, envelopes } = session;

    info!(url = %info.url, session_id = %info.session_id, "Session connected");
    ctx.sink.emit(&CliEvent::new(
        (ctx.clock)(),
        EventKind::Connected {
            url: info.url,
            session_id: info.session_id,
            subprotocol: info.subprotocol,
        },
    ));

    let mut consumer = ConsumerTask::new(tokio::spawn({
        let state = Arc::clone(&ctx.state);
        let sink = Arc::clone(&ctx.sink);
        let clock = Arc::clone(&ctx.clock);
        async move { consume_envelopes(envelopes, &state, sink.as_ref(), &clock).await }
    }));

    let shutdown = ShutdownCoordinator::new(
        Arc::clone(&connection),
        Arc::clone(&ctx.state),
        Arc::clone(&ctx.sink),
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(watch_interrupts(interrupts, shutdown.clone(), cancel.clone()));

    match mode {
        SessionMode::Interactive(mut lines) => {
            let controller = InteractiveController::new(
                Arc::clone(&connection),
                Arc::clone(&ctx.state),
                Arc::clone(&ctx.sink),
                shutdown.clone(),
            );
            tokio::select! {
                () = controller.run(lines.as_mut()) => {},
                () = consumer.wait() => debug!("Session ended, leaving input loop"),
            }
        },
        SessionMode::Batch { input, wait_seconds } => {
            let controller = BatchController::new(
                Arc::clone(&connection),
                Arc::clone(&ctx.state),
                shutdown.clone(),
            );
            tokio::select! {
                outcome = controller.run(input, wait_seconds) => {
                    debug!(close_requested = outcome.close_requested, "Batch input finished");
                },
                () = consumer.wait() => debug!("Session ended during batch"),
            }
        },
    }

    if !consumer.is_finished() {
        if ctx.state.is_close_requested() {
            shutdown
                .drain_then_force(&mut consumer, DRAIN_TIMEOUT, DRAIN_FORCE_CODE, DRAIN_FORCE_REASON)
                .await;
        } else {
            debug!("Waiting for the session to end");
            consumer.wait().await;
        }
    }

    cancel.cancel();
    if let Err(e) = watcher.await {
        debug!(error = %e, "Interrupt watcher ended abnormally");
    }

    report_run(&ctx.state, ctx.sink.as_ref(), &ctx.clock)
}

async fn watch_interrupts(
    mut interrupts: mpsc::UnboundedReceiver<()>,
    shutdown: ShutdownCoordinator,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            received = interrupts.recv() => {
                if received.is_none() {
                    cancel.cancelled().await;
                    return;
                }
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = shutdown.interrupt() => {},
                }
            }
        }
    }
}
