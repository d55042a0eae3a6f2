// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graceful close, drain-then-force, and the interrupt path.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::SessionConnection;
use crate::sink::EventSink;
use crate::state::RunState;

/// How long top-level shutdown waits for the consumer loop to see the close.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Forced-disconnect deadline used by the interrupt path.
pub const INTERRUPT_FORCE_TIMEOUT: Duration = Duration::from_secs(1);

pub const INTERRUPT_CLOSE_CODE: u16 = 1001;
pub const INTERRUPT_CLOSE_REASON: &str = "interrupted";

/// The consumer loop task, awaitable more than once.
#[derive(Debug)]
pub struct ConsumerTask {
    handle: JoinHandle<()>,
    finished: bool,
}

impl ConsumerTask {
    pub const fn new(handle: JoinHandle<()>) -> Self {
        Self { handle, finished: false }
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Waits for the loop to reach a terminal state. Returns immediately if it
    /// already has.
    pub async fn wait(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = (&mut self.handle).await {
            warn!(error = %e, "Consumer loop task did not complete cleanly");
        }
        self.finished = true;
    }
}

#[derive(Clone)]
pub struct ShutdownCoordinator {
    connection: Arc<dyn SessionConnection>,
    state: Arc<RunState>,
    sink: Arc<dyn EventSink>,
}

impl ShutdownCoordinator {
    pub fn new(
        connection: Arc<dyn SessionConnection>,
        state: Arc<RunState>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self { connection, state, sink }
    }

    /// Issues a close request and, if `force_after` is set, a forced disconnect
    /// once that deadline passes without the close being observed.
    ///
    /// Both calls are best-effort: a failing close must never stop shutdown.
    pub async fn close_gracefully(&self, code: u16, reason: &str, force_after: Option<Duration>) {
        debug!(code, reason, "Requesting graceful close");
        if let Err(e) = self.connection.close(code, reason).await {
            debug!(error = %e, "Close request failed");
        }

        let Some(deadline) = force_after else {
            return;
        };
        tokio::time::sleep(deadline).await;
        if self.state.is_closed() {
            return;
        }
        self.force_disconnect(code, reason).await;
    }

    pub async fn force_disconnect(&self, code: u16, reason: &str) {
        info!(code, reason, "Forcing disconnect");
        if let Err(e) = self.connection.disconnect(code, reason).await {
            debug!(error = %e, "Forced disconnect failed");
        }
    }

    /// Gives the consumer loop `drain` to observe the close, forces a
    /// disconnect otherwise, and in both cases waits for the loop to finish so
    /// no event can land after the summary.
    pub async fn drain_then_force(
        &self,
        consumer: &mut ConsumerTask,
        drain: Duration,
        code: u16,
        reason: &str,
    ) {
        if tokio::time::timeout(drain, consumer.wait()).await.is_err() {
            warn!(timeout_ms = drain.as_millis(), "Session did not close in time");
            self.force_disconnect(code, reason).await;
        }
        consumer.wait().await;
    }

    /// Interrupt signal handling. Idempotent: only the first call while the
    /// session is open does anything.
    pub async fn interrupt(&self) {
        if !self.state.try_request_close() {
            debug!("Interrupt ignored, session already closing");
            return;
        }
        self.sink.notice("Interrupted, closing session");
        self.close_gracefully(
            INTERRUPT_CLOSE_CODE,
            INTERRUPT_CLOSE_REASON,
            Some(INTERRUPT_FORCE_TIMEOUT),
        )
        .await;
    }
}
