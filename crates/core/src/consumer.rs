// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The consumer loop: drains the envelope stream into CLI events.
//!
//! Whatever happens, the loop ends with exactly one terminal signal visible to
//! the reporter: the server's own `meta.closed`, a synthetic
//! `CONTROL_SOCKET_ERROR`, a synthetic `CONTROL_SOCKET_CLOSED`, or, when the
//! driver itself was closing, nothing extra at all.

use futures::StreamExt;
use tracing::debug;
use treq_api::{CliEvent, EventKind};

use crate::connection::EnvelopeStream;
use crate::mapper::map_envelope;
use crate::sink::EventSink;
use crate::state::{Clock, RunState};

pub const CONTROL_SOCKET_ERROR: &str = "CONTROL_SOCKET_ERROR";
pub const CONTROL_SOCKET_CLOSED: &str = "CONTROL_SOCKET_CLOSED";

/// Runs until a close envelope is observed or the stream ends.
pub async fn consume_envelopes(
    mut envelopes: EnvelopeStream,
    state: &RunState,
    sink: &dyn EventSink,
    clock: &Clock,
) {
    while let Some(item) = envelopes.next().await {
        let envelope = match item {
            Ok(envelope) => envelope,
            Err(e) => {
                if state.is_closing() {
                    debug!(error = %e, "Envelope stream failed while closing");
                } else {
                    state.mark_failed();
                    sink.emit(&CliEvent::error(
                        clock(),
                        CONTROL_SOCKET_ERROR,
                        format!("Control socket error: {e}"),
                    ));
                }
                return;
            },
        };

        sink.trace(&envelope);

        let Some(event) = map_envelope(&envelope, clock()) else {
            debug!(seq = envelope.seq, "Dropping envelope of unknown type");
            continue;
        };

        let terminal = match event.kind {
            EventKind::Outbound { .. } => {
                state.record_sent();
                false
            },
            EventKind::Inbound { .. } => {
                state.record_received();
                false
            },
            EventKind::Error { .. } => {
                state.mark_failed();
                false
            },
            EventKind::Closed { .. } => {
                state.mark_closed();
                true
            },
            EventKind::Connected { .. } | EventKind::Summary { .. } => false,
        };

        sink.emit(&event);

        // Do not wait for the stream to finish on its own after a close.
        if terminal {
            return;
        }
    }

    if !state.is_closed() && !state.is_closing() {
        state.mark_failed();
        sink.emit(&CliEvent::error(
            clock(),
            CONTROL_SOCKET_CLOSED,
            "Control socket closed unexpectedly",
        ));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::{Arc, Mutex};

    use futures::stream;
    use serde_json::json;
    use treq_api::{EnvelopeKind, ServerEnvelope};

    use super::*;
    use crate::error::SessionError;

    #[derive(Default)]
    struct Collect(Mutex<Vec<CliEvent>>);

    impl EventSink for Collect {
        fn emit(&self, event: &CliEvent) {
            self.0.lock().unwrap().push(event.clone());
        }

        fn notice(&self, _message: &str) {}
    }

    impl Collect {
        fn types(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().iter().map(CliEvent::type_name).collect()
        }
    }

    fn clock() -> Clock {
        Arc::new(|| 7)
    }

    fn env(kind: EnvelopeKind, seq: u64, payload: serde_json::Value) -> ServerEnvelope {
        ServerEnvelope::new(kind, seq, payload)
    }

    #[tokio::test]
    async fn counts_and_stops_after_close() {
        let items = vec![
            Ok(env(EnvelopeKind::Outbound, 1, json!({"payloadType": "text", "payload": "a"}))),
            Ok(env(EnvelopeKind::Inbound, 2, json!({"payloadType": "text", "payload": "b"}))),
            Ok(env(EnvelopeKind::Inbound, 3, json!({"payloadType": "text", "payload": "c"}))),
            Ok(env(EnvelopeKind::Closed, 4, json!({"code": 1000, "reason": "ok"}))),
            Ok(env(EnvelopeKind::Inbound, 5, json!({"payload": "late"}))),
        ];
        let state = RunState::new();
        let sink = Collect::default();
        consume_envelopes(stream::iter(items).boxed(), &state, &sink, &clock()).await;

        assert_eq!(sink.types(), ["ws.outbound", "ws.inbound", "ws.inbound", "meta.closed"]);
        assert_eq!(state.sent(), 1);
        assert_eq!(state.received(), 2);
        assert!(state.is_closed());
        assert!(!state.is_failed());
    }

    #[tokio::test]
    async fn server_error_envelope_is_sticky() {
        let items = vec![
            Ok(env(EnvelopeKind::Error, 1, json!({"message": "upstream refused"}))),
            Ok(env(EnvelopeKind::Closed, 2, json!({}))),
        ];
        let state = RunState::new();
        let sink = Collect::default();
        consume_envelopes(stream::iter(items).boxed(), &state, &sink, &clock()).await;

        assert_eq!(sink.types(), ["ws.error", "meta.closed"]);
        assert!(state.is_failed());
    }

    #[tokio::test]
    async fn unexpected_end_synthesizes_one_error() {
        let items = vec![Ok(env(EnvelopeKind::Inbound, 1, json!({"payload": "x"})))];
        let state = RunState::new();
        let sink = Collect::default();
        consume_envelopes(stream::iter(items).boxed(), &state, &sink, &clock()).await;

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1].kind,
            EventKind::Error { code: Some(code), .. } if code == CONTROL_SOCKET_CLOSED
        ));
        assert!(state.is_failed());
    }

    #[tokio::test]
    async fn stream_error_synthesizes_one_error() {
        let items = vec![Err(SessionError::Transport("reset".into()))];
        let state = RunState::new();
        let sink = Collect::default();
        consume_envelopes(stream::iter(items).boxed(), &state, &sink, &clock()).await;

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0].kind,
            EventKind::Error { code: Some(code), .. } if code == CONTROL_SOCKET_ERROR
        ));
        assert!(state.is_failed());
    }

    #[tokio::test]
    async fn end_while_closing_is_not_a_failure() {
        let state = RunState::new();
        state.request_close();
        let sink = Collect::default();
        consume_envelopes(stream::iter(Vec::new()).boxed(), &state, &sink, &clock()).await;

        assert!(sink.types().is_empty());
        assert!(!state.is_failed());
    }

    #[tokio::test]
    async fn unknown_envelopes_do_not_count() {
        let items = vec![
            Ok(env(EnvelopeKind::Unknown, 1, json!({}))),
            Ok(env(EnvelopeKind::Closed, 2, json!({"code": 1000}))),
        ];
        let state = RunState::new();
        let sink = Collect::default();
        consume_envelopes(stream::iter(items).boxed(), &state, &sink, &clock()).await;

        assert_eq!(sink.types(), ["meta.closed"]);
        assert_eq!(state.received(), 0);
    }
}
