// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The seam between the driver and whatever actually carries the session.
//!
//! A provider (the control-plane client in the `treq` binary, or a mock in
//! tests) hands the driver a [`ConnectedSession`]: a write handle implementing
//! [`SessionConnection`] plus an ordered [`EnvelopeStream`] of server activity.
//! Reads and writes are split so the consumer loop can own the stream while
//! controllers and shutdown paths share the write handle.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use treq_api::ServerEnvelope;

use crate::error::{Result, SessionError};

/// Ordered, cancellable sequence of server envelopes.
///
/// An `Err` item means the underlying transport failed; the stream yields
/// nothing useful after it. A clean end of stream without a `closed` envelope
/// means the control plane went away.
pub type EnvelopeStream = BoxStream<'static, std::result::Result<ServerEnvelope, SessionError>>;

/// Write side of a session.
#[async_trait]
pub trait SessionConnection: Send + Sync {
    /// Forward a text frame upstream.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Forward a JSON payload upstream.
    async fn send_json(&self, payload: &Value) -> Result<()>;

    /// Send a protocol ping upstream.
    async fn ping(&self) -> Result<()>;

    /// Request a graceful close. The session is closed once the `closed`
    /// envelope shows up on the stream, not when this returns.
    async fn close(&self, code: u16, reason: &str) -> Result<()>;

    /// Tear the session down without waiting for the peer. Ends the envelope
    /// stream.
    async fn disconnect(&self, code: u16, reason: &str) -> Result<()>;
}

/// What `meta.connected` reports about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub url: String,
    pub session_id: String,
    pub subprotocol: Option<String>,
}

pub struct ConnectedSession {
    pub info: SessionInfo,
    pub connection: Arc<dyn SessionConnection>,
    pub envelopes: EnvelopeStream,
}

impl std::fmt::Debug for ConnectedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedSession").field("info", &self.info).finish_non_exhaustive()
    }
}
