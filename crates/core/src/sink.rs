// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use treq_api::{CliEvent, ServerEnvelope};

/// Destination of everything the driver wants the user to see.
///
/// Events are handed over in emission order and must be written immediately;
/// a sink never batches or reorders.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CliEvent);

    /// Local, human-only information (help text, parse errors, interrupt
    /// notices). Never part of the event stream.
    fn notice(&self, message: &str);

    /// Raw envelope trace, shown only in verbose mode.
    fn trace(&self, envelope: &ServerEnvelope) {
        let _ = envelope;
    }
}
