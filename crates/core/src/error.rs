// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the session driver.

use thiserror::Error;

/// Errors raised by a [`crate::SessionConnection`] or its envelope stream.
///
/// None of these terminate the process on their own: the consumer loop turns
/// stream errors into a `ws.error` event plus the sticky failed flag, and
/// controllers report send errors locally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport underneath the session failed (socket reset, TLS, HTTP).
    ///
    /// Examples:
    /// - Control-plane socket dropped mid-session
    /// - Handshake rejected
    #[error("Transport error: {0}")]
    Transport(String),

    /// The control plane sent something the driver could not make sense of.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A write was attempted after the session writer went away.
    #[error("Session is not connected")]
    NotConnected,
}

/// Convenience type alias for Results using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// A slash command that could not be parsed. Local to interactive mode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlashError {
    #[error("Unknown command: {0}. Type /help for available commands.")]
    UnknownCommand(String),

    #[error("Invalid close code: {0} (expected an integer between 0 and 4999)")]
    InvalidCloseCode(String),

    #[error("Invalid JSON payload: {0}")]
    InvalidJsonPayload(String),
}
