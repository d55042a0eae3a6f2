// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Translation of server envelopes into CLI events. Pure, no side effects.

use serde_json::Value;
use treq_api::{CliEvent, EnvelopeKind, EventKind, ServerEnvelope};

pub const DEFAULT_ERROR_MESSAGE: &str = "WebSocket session error";
pub const DEFAULT_CLOSE_CODE: u16 = 1000;

/// Maps one envelope to at most one event stamped with `ts`.
///
/// Missing or mistyped payload fields fall back to defaults: a malformed
/// `closed` payload still yields `meta.closed` with code 1000 and an empty reason.
pub fn map_envelope(envelope: &ServerEnvelope, ts: u64) -> Option<CliEvent> {
    let payload = &envelope.payload;
    let kind = match envelope.kind {
        EnvelopeKind::Outbound => EventKind::Outbound {
            payload_type: str_field(payload, "payloadType"),
            payload: payload.get("payload").cloned(),
        },
        EnvelopeKind::Inbound => EventKind::Inbound {
            payload_type: str_field(payload, "payloadType"),
            payload: payload.get("payload").cloned(),
        },
        EnvelopeKind::Error => EventKind::Error {
            code: str_field(payload, "code"),
            message: str_field(payload, "message")
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            payload: payload.get("payload").cloned(),
        },
        EnvelopeKind::Closed => EventKind::Closed {
            code: payload
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(DEFAULT_CLOSE_CODE),
            reason: str_field(payload, "reason").unwrap_or_default(),
            was_clean: payload.get("wasClean").and_then(Value::as_bool),
        },
        EnvelopeKind::Unknown => return None,
    };
    Some(CliEvent::new(ts, kind))
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}
