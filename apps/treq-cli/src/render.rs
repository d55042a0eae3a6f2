// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Event renderers: human-readable lines or NDJSON.

use std::io::{IsTerminal, Write};

use serde_json::Value;
use tracing::debug;
use treq_api::{CliEvent, EventKind, ServerEnvelope};
use treq_core::EventSink;

const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Ndjson,
}

/// Decides whether human output gets ANSI colors.
pub fn color_enabled(requested: bool) -> bool {
    requested && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn paint(color: bool, code: &str, text: &str) -> String {
    if color {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn payload_text(payload: Option<&Value>) -> String {
    match payload {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One event as a human-readable line.
pub fn format_human(event: &CliEvent, color: bool) -> String {
    match &event.kind {
        EventKind::Connected { url, session_id, subprotocol } => {
            let proto = subprotocol
                .as_ref()
                .map(|proto| format!(", subprotocol {proto}"))
                .unwrap_or_default();
            paint(color, YELLOW, &format!("! connected to {url} (session {session_id}{proto})"))
        },
        EventKind::Outbound { payload, .. } => {
            paint(color, CYAN, &format!("> {}", payload_text(payload.as_ref())))
        },
        EventKind::Inbound { payload, .. } => {
            paint(color, GREEN, &format!("< {}", payload_text(payload.as_ref())))
        },
        EventKind::Error { code, message, payload } => {
            let mut line = match code {
                Some(code) => format!("! error [{code}] {message}"),
                None => format!("! error {message}"),
            };
            if payload.is_some() {
                line.push(' ');
                line.push_str(&payload_text(payload.as_ref()));
            }
            paint(color, RED, &line)
        },
        EventKind::Closed { code, reason, .. } => {
            let line = if reason.is_empty() {
                format!("! closed {code}")
            } else {
                format!("! closed {code} {reason}")
            };
            paint(color, YELLOW, &line)
        },
        EventKind::Summary { duration_ms, sent, received, failed } => {
            let status = if *failed { "failed" } else { "ok" };
            let line = format!(
                "! {status}: sent {sent}, received {received} in {duration_ms}ms"
            );
            paint(color, if *failed { RED } else { DIM }, &line)
        },
    }
}

/// One event as a single NDJSON line, without the trailing newline.
///
/// # Errors
///
/// Returns an error if the event cannot be serialized.
pub fn format_ndjson(event: &CliEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

fn format_trace(envelope: &ServerEnvelope, color: bool) -> String {
    let kind = serde_json::to_value(envelope.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    paint(color, DIM, &format!("~ #{} {kind} {}", envelope.seq, envelope.payload))
}

/// Terminal sink for the driver's events.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    mode: OutputMode,
    verbose: bool,
    color: bool,
}

impl Renderer {
    /// `color` only applies to human mode and should already account for the terminal.
    pub const fn new(mode: OutputMode, verbose: bool, color: bool) -> Self {
        Self { mode, verbose, color }
    }

    fn write_stdout(line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed pipe must not take the run down with it.
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            debug!(error = %e, "Failed to write to stdout");
        }
    }

    fn write_stderr(line: &str) {
        let mut err = std::io::stderr().lock();
        if let Err(e) = writeln!(err, "{line}") {
            debug!(error = %e, "Failed to write to stderr");
        }
    }
}

impl EventSink for Renderer {
    fn emit(&self, event: &CliEvent) {
        match self.mode {
            OutputMode::Human => Self::write_stdout(&format_human(event, self.color)),
            OutputMode::Ndjson => match format_ndjson(event) {
                Ok(line) => Self::write_stdout(&line),
                Err(e) => debug!(error = %e, "Failed to serialize event"),
            },
        }
    }

    fn notice(&self, message: &str) {
        match self.mode {
            OutputMode::Human => {
                for line in message.lines() {
                    Self::write_stdout(&paint(self.color, DIM, &format!("! {line}")));
                }
            },
            OutputMode::Ndjson => Self::write_stderr(message),
        }
    }

    fn trace(&self, envelope: &ServerEnvelope) {
        if !self.verbose {
            return;
        }
        let line = format_trace(envelope, self.color && self.mode == OutputMode::Human);
        match self.mode {
            OutputMode::Human => Self::write_stdout(&line),
            // NDJSON stdout carries events only.
            OutputMode::Ndjson => Self::write_stderr(&line),
        }
    }
}
