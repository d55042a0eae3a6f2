// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! REPL controller.
//!
//! ```text
//!   prompting ──line──▶ handling ──still open──▶ prompting
//!                          └──────closing──────▶ (loop ends)
//! ```
//!
//! The controller never reads the next line before the current one is fully
//! handled. Racing it against the consumer loop is the driver's job.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::SessionConnection;
use crate::input::{InputEvent, LineSource};
use crate::shutdown::ShutdownCoordinator;
use crate::sink::EventSink;
use crate::slash::{parse_slash_command, SlashCommand, HELP_TEXT};
use crate::state::RunState;

pub const STDIN_ENDED_CLOSE_CODE: u16 = 1000;
pub const STDIN_ENDED_CLOSE_REASON: &str = "stdin ended";

pub struct InteractiveController {
    connection: Arc<dyn SessionConnection>,
    state: Arc<RunState>,
    sink: Arc<dyn EventSink>,
    shutdown: ShutdownCoordinator,
}

impl InteractiveController {
    pub fn new(
        connection: Arc<dyn SessionConnection>,
        state: Arc<RunState>,
        sink: Arc<dyn EventSink>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self { connection, state, sink, shutdown }
    }

    pub async fn run(&self, lines: &mut dyn LineSource) {
        loop {
            if self.state.is_closing() {
                break;
            }

            let Some(event) = lines.next_event().await else {
                self.on_input_ended().await;
                break;
            };

            match event {
                InputEvent::Line(line) => self.handle_line(&line).await,
                InputEvent::Interrupted => self.shutdown.interrupt().await,
            }
        }
    }

    async fn on_input_ended(&self) {
        if !self.state.try_request_close() {
            return;
        }
        debug!("Input ended, closing session");
        self.shutdown
            .close_gracefully(STDIN_ENDED_CLOSE_CODE, STDIN_ENDED_CLOSE_REASON, None)
            .await;
    }

    /// Handles one line of input. Lines arriving after close are ignored.
    pub async fn handle_line(&self, line: &str) {
        if self.state.is_closing() {
            debug!("Ignoring input, session is closing");
            return;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if !trimmed.starts_with('/') {
            self.report(self.connection.send_text(line).await);
            return;
        }

        let command = match parse_slash_command(line) {
            Ok(command) => command,
            Err(e) => {
                self.sink.notice(&e.to_string());
                return;
            },
        };

        match command {
            SlashCommand::Help => self.sink.notice(HELP_TEXT),
            SlashCommand::Ping => self.report(self.connection.ping().await),
            SlashCommand::Close { code, reason } => {
                if self.state.try_request_close() {
                    self.shutdown.close_gracefully(code, &reason, None).await;
                }
            },
            SlashCommand::Json { payload } => {
                self.report(self.connection.send_json(&payload).await);
            },
            SlashCommand::Raw { payload } => self.report(self.connection.send_text(&payload).await),
        }
    }

    fn report(&self, result: crate::error::Result<()>) {
        if let Err(e) = result {
            warn!(error = %e, "Send failed");
            self.sink.notice(&format!("Send failed: {e}"));
        }
    }
}
