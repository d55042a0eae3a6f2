// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! api: Defines the wire contract between the `treq` driver and the control plane.
//!
//! Three directions of traffic are described here:
//! - **Envelopes**: sequenced activity reported by the control plane for one session
//! - **Control messages**: frames the driver sends back over the session socket
//! - **CLI events**: the closed set of events the driver emits to its renderer
//!
//! All payloads are JSON. Session payloads are carried as raw [`serde_json::Value`]
//! so that the driver never rejects a frame just because its payload drifted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod event;

pub use event::{CliEvent, EventKind};

// --- Server Envelopes ---

/// Discriminant of a [`ServerEnvelope`].
///
/// Envelope types the driver does not know about deserialize to `Unknown`
/// and are dropped by the mapper.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// A frame the upstream socket sent on our behalf (echo of a send)
    Outbound,
    /// A frame received from the upstream socket
    Inbound,
    /// The control plane reported a session error
    Error,
    /// The upstream socket closed; terminal for the session
    Closed,
    #[serde(other)]
    Unknown,
}

/// One sequenced unit of session activity reported by the control plane.
///
/// # Example
/// ```json
/// {
///   "type": "inbound",
///   "seq": 7,
///   "ts": 1760000000000,
///   "payload": { "payloadType": "json", "payload": { "ok": true } }
/// }
/// ```
///
/// `seq` is monotonically non-decreasing and exists for replay/dedup by external
/// tooling. Consumers process envelopes in delivery order and never reorder by it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerEnvelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub seq: u64,
    /// Milliseconds since the Unix epoch, as stamped by the control plane
    #[serde(default)]
    pub ts: u64,
    #[serde(default)]
    pub payload: Value,
}

impl ServerEnvelope {
    pub fn new(kind: EnvelopeKind, seq: u64, payload: Value) -> Self {
        Self { kind, seq, ts: 0, payload }
    }
}

// --- Client-to-Server Control Messages ---

/// How a sent payload should be framed upstream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Text,
    Json,
    Binary,
}

/// Frames the driver writes to the session socket.
///
/// # Example
/// ```json
/// { "type": "send", "payloadType": "text", "payload": "hello" }
/// { "type": "close", "code": 1000, "reason": "stdin ended" }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    /// Forward a payload to the upstream socket
    Send { payload_type: PayloadType, payload: Value },
    /// Send a protocol-level ping upstream
    Ping,
    /// Ask the control plane to close the upstream socket gracefully
    Close { code: u16, reason: String },
}

// --- Session Bootstrap (HTTP) ---

/// Body of `POST /execute/ws`.
///
/// Exactly one of `url` or `path`/`content` is set; request selection fields only
/// apply to file mode.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Contents of the request file, read by the driver so the control plane
    /// does not need access to the caller's filesystem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Response of `POST /execute/ws`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWsResponse {
    pub ws_session_id: String,
    /// Path on the control plane to open the session socket on,
    /// e.g. `/ws/session/ws_123`.
    pub downstream_path: String,
    /// Upstream URL the control plane connected to
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol: Option<String>,
}

/// Error body returned by the control plane on a failed HTTP call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
