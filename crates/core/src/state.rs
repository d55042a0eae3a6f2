// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Run state shared by the consumer loop, the controllers, the shutdown paths
//! and the reporter.
//!
//! Exactly one [`RunState`] exists per invocation. It is handed around as an
//! `Arc<RunState>` rather than living in a global. All fields are atomics, so
//! no locking is involved; the `closed` and `close_requested` flags are the
//! only thing standing between a controller and a send issued after close.
//!
//! ```text
//!   open ──(any path decides to end)──▶ close requested ──(close envelope)──▶ closed
//!     └───────────────(server-initiated close envelope)──────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of event timestamps, in milliseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Wall clock used outside of tests.
pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    })
}

#[derive(Debug)]
pub struct RunState {
    start: Instant,
    sent: AtomicU64,
    received: AtomicU64,
    failed: AtomicBool,
    closed: AtomicBool,
    close_requested: AtomicBool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    /// Sticky: there is no way to clear it.
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Only the consumer loop calls this, on observing a close envelope.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn request_close(&self) {
        self.close_requested.store(true, Ordering::SeqCst);
    }

    /// Claims the right to end the session.
    ///
    /// Returns `false` if the session is already closed or another path already
    /// requested the close, so exactly one caller proceeds.
    pub fn try_request_close(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        !self.close_requested.swap(true, Ordering::SeqCst)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }

    /// True once the session is closed or on its way there. Nothing may be
    /// sent past this point.
    pub fn is_closing(&self) -> bool {
        self.is_closed() || self.is_close_requested()
    }
}
