// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Terminal mode snapshot for the interactive prompt.

use std::io::IsTerminal;

use tracing::debug;

/// Puts stdin's terminal attributes back to what they were at creation when dropped.
///
/// The prompt thread can still be blocked in a raw-mode read when the session
/// ends, and the editor never gets to undo raw mode itself.
pub struct TerminalGuard {
    #[cfg(unix)]
    saved: rustix::termios::Termios,
}

impl TerminalGuard {
    /// Snapshots stdin's attributes. `None` when stdin is not a terminal.
    #[cfg(unix)]
    pub fn save() -> Option<Self> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return None;
        }
        match rustix::termios::tcgetattr(&stdin) {
            Ok(saved) => Some(Self { saved }),
            Err(e) => {
                debug!(error = %e, "Failed to read terminal attributes");
                None
            },
        }
    }

    #[cfg(not(unix))]
    pub fn save() -> Option<Self> {
        if std::io::stdin().is_terminal() {
            debug!("Terminal restore is not supported on this platform");
        }
        None
    }

    #[cfg(unix)]
    fn restore(&self) {
        let stdin = std::io::stdin();
        if let Err(e) =
            rustix::termios::tcsetattr(&stdin, rustix::termios::OptionalActions::Now, &self.saved)
        {
            debug!(error = %e, "Failed to restore terminal attributes");
        }
    }

    #[cfg(not(unix))]
    const fn restore(&self) {}
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
