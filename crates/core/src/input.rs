// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use async_trait::async_trait;

/// One unit of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl-C pressed at the prompt; routed to the signal path.
    Interrupted,
}

/// A pull-based source of input lines.
///
/// Controllers only call `next_event` once the previous line has been fully
/// handled, which is what keeps line side effects from interleaving.
/// Interactive sources prompt on each call.
#[async_trait]
pub trait LineSource: Send {
    /// `None` means the input is exhausted.
    async fn next_event(&mut self) -> Option<InputEvent>;
}

/// Fixed list of lines, mostly for tests and `--execute`-style callers.
#[derive(Debug, Default)]
pub struct VecLineSource {
    lines: std::collections::VecDeque<String>,
}

impl VecLineSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl LineSource for VecLineSource {
    async fn next_event(&mut self) -> Option<InputEvent> {
        self.lines.pop_front().map(InputEvent::Line)
    }
}

/// Line source backed by a channel, fed by a reader thread or a test.
#[derive(Debug)]
pub struct ChannelLineSource {
    rx: tokio::sync::mpsc::Receiver<InputEvent>,
}

impl ChannelLineSource {
    pub const fn new(rx: tokio::sync::mpsc::Receiver<InputEvent>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl LineSource for ChannelLineSource {
    async fn next_event(&mut self) -> Option<InputEvent> {
        self.rx.recv().await
    }
}
