// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Non-interactive controller: one `--execute` payload or piped lines.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::connection::SessionConnection;
use crate::input::{InputEvent, LineSource};
use crate::shutdown::ShutdownCoordinator;
use crate::state::RunState;

pub const BATCH_CLOSE_CODE: u16 = 1000;
pub const BATCH_CLOSE_REASON: &str = "batch complete";

/// `--wait` value that keeps the session open after input is exhausted.
pub const WAIT_FOREVER: i64 = -1;

pub enum BatchInput {
    Payload(String),
    Lines(Box<dyn LineSource>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub close_requested: bool,
}

pub struct BatchController {
    connection: Arc<dyn SessionConnection>,
    state: Arc<RunState>,
    shutdown: ShutdownCoordinator,
}

impl BatchController {
    pub fn new(
        connection: Arc<dyn SessionConnection>,
        state: Arc<RunState>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self { connection, state, shutdown }
    }

    pub async fn run(&self, input: BatchInput, wait_seconds: i64) -> BatchOutcome {
        match input {
            BatchInput::Payload(payload) => self.send(&payload).await,
            BatchInput::Lines(mut lines) => {
                while let Some(event) = lines.next_event().await {
                    if self.state.is_closing() {
                        break;
                    }
                    let InputEvent::Line(line) = event else {
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.send(&line).await;
                }
            },
        }

        if wait_seconds == WAIT_FOREVER {
            debug!("Input exhausted, keeping session open");
            return BatchOutcome { close_requested: false };
        }

        let wait = Duration::from_secs(u64::try_from(wait_seconds).unwrap_or(0));
        tokio::time::sleep(wait).await;

        if self.state.try_request_close() {
            self.shutdown.close_gracefully(BATCH_CLOSE_CODE, BATCH_CLOSE_REASON, None).await;
        }
        BatchOutcome { close_requested: true }
    }

    async fn send(&self, text: &str) {
        if self.state.is_closing() {
            return;
        }
        if let Err(e) = self.connection.send_text(text).await {
            warn!(error = %e, "Failed to send batch payload");
        }
    }
}
