// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! CLI-facing events.
//!
//! Every event serializes to one flat JSON object with a stable `type`
//! discriminant, which is exactly what NDJSON output writes per line:
//!
//! ```json
//! {"ts":1760000000000,"type":"meta.summary","durationMs":2104,"sent":1,"received":1,"failed":false}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable event emitted by the driver and consumed by a renderer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CliEvent {
    /// Milliseconds since the Unix epoch
    pub ts: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// The session socket is open
    #[serde(rename = "meta.connected")]
    Connected {
        url: String,
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subprotocol: Option<String>,
    },
    /// `payload_type` is whatever the server reported, not only the types we send.
    #[serde(rename = "ws.outbound")]
    Outbound {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    #[serde(rename = "ws.inbound")]
    Inbound {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    #[serde(rename = "ws.error")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    #[serde(rename = "meta.closed")]
    Closed {
        code: u16,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        was_clean: Option<bool>,
    },
    /// Always the last event of a run
    #[serde(rename = "meta.summary")]
    Summary { duration_ms: u64, sent: u64, received: u64, failed: bool },
}

impl CliEvent {
    pub const fn new(ts: u64, kind: EventKind) -> Self {
        Self { ts, kind }
    }

    /// Builds a `ws.error` event with a machine-readable code.
    pub fn error(ts: u64, code: &str, message: impl Into<String>) -> Self {
        Self::new(
            ts,
            EventKind::Error { code: Some(code.to_string()), message: message.into(), payload: None },
        )
    }

    /// The `type` discriminant this event serializes with.
    pub const fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::Connected { .. } => "meta.connected",
            EventKind::Outbound { .. } => "ws.outbound",
            EventKind::Inbound { .. } => "ws.inbound",
            EventKind::Error { .. } => "ws.error",
            EventKind::Closed { .. } => "meta.closed",
            EventKind::Summary { .. } => "meta.summary",
        }
    }
}
