// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use tracing::info;
use treq_api::{CliEvent, EventKind};

use crate::sink::EventSink;
use crate::state::{Clock, RunState};

/// Final status of a run. The only place the process exit status is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub duration_ms: u64,
    pub sent: u64,
    pub received: u64,
    pub failed: bool,
}

impl RunReport {
    pub const fn exit_code(&self) -> u8 {
        if self.failed {
            1
        } else {
            0
        }
    }
}

/// Emits the single `meta.summary` of a run.
pub fn report_run(state: &RunState, sink: &dyn EventSink, clock: &Clock) -> RunReport {
    let report = RunReport {
        duration_ms: u64::try_from(state.elapsed().as_millis()).unwrap_or(u64::MAX),
        sent: state.sent(),
        received: state.received(),
        failed: state.is_failed(),
    };

    sink.emit(&CliEvent::new(
        clock(),
        EventKind::Summary {
            duration_ms: report.duration_ms,
            sent: report.sent,
            received: report.received,
            failed: report.failed,
        },
    ));

    info!(
        duration_ms = report.duration_ms,
        sent = report.sent,
        received = report.received,
        failed = report.failed,
        "Run finished"
    );
    report
}

/// Reports a run that failed before a session existed (validation, connect).
pub fn report_early_failure(
    code: &str,
    message: &str,
    state: &RunState,
    sink: &dyn EventSink,
    clock: &Clock,
) -> RunReport {
    state.mark_failed();
    sink.emit(&CliEvent::error(clock(), code, message));
    report_run(state, sink, clock)
}
