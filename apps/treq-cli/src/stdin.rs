// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use treq_core::{ChannelLineSource, InputEvent};

const LINE_BUFFER: usize = 64;

/// Reads lines from `reader` on a plain OS thread.
///
/// A blocked read never holds up runtime shutdown; the thread is simply left
/// behind when the process exits.
///
/// # Errors
///
/// Returns an error if the reader thread cannot be spawned.
pub fn spawn_line_reader<R>(reader: R) -> std::io::Result<ChannelLineSource>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new().name("treq-stdin".to_string()).spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(InputEvent::Line(line)).is_err() {
                        debug!("Line consumer went away, stopping reader");
                        return;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    return;
                },
            }
        }
        debug!("Input ended");
    })?;
    Ok(ChannelLineSource::new(rx))
}

/// Piped stdin as a line source for batch mode.
///
/// # Errors
///
/// Returns an error if the reader thread cannot be spawned.
pub fn piped_stdin() -> std::io::Result<ChannelLineSource> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}

#[cfg(test)]
mod tests {
    use treq_core::LineSource;

    use super::*;

    #[tokio::test]
    async fn yields_lines_then_ends() {
        let input = std::io::Cursor::new("first\r\n\nsecond\n");
        let mut source = spawn_line_reader(input).unwrap_or_else(|e| panic!("spawn: {e}"));

        assert_eq!(source.next_event().await, Some(InputEvent::Line("first".into())));
        assert_eq!(source.next_event().await, Some(InputEvent::Line(String::new())));
        assert_eq!(source.next_event().await, Some(InputEvent::Line("second".into())));
        assert_eq!(source.next_event().await, None);
    }
}
