// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The interactive prompt.
//!
//! rustyline blocks, so the editor lives on its own OS thread and only prompts
//! when the controller asks for the next line.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::mpsc as std_mpsc;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::Helper;
use rustyline::{Cmd, CompletionType, Config, EditMode, Editor, KeyEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use treq_core::slash::COMMAND_NAMES;
use treq_core::{async_trait, InputEvent, LineSource};

use crate::terminal::TerminalGuard;

pub const PROMPT: &str = "ws> ";

struct TreqHelper {
    completer: SlashCompleter,
    hinter: HistoryHinter,
}

impl Helper for TreqHelper {}

impl Completer for TreqHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Hinter for TreqHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &rustyline::Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

// Payloads are single lines; no multi-line validation.
impl Validator for TreqHelper {}

impl Highlighter for TreqHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        let _ = default;
        Borrowed(prompt)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned("\x1b[1m".to_owned() + hint + "\x1b[m")
    }

    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let _ = pos;
        Borrowed(line)
    }

    fn highlight_char(&self, line: &str, pos: usize, kind: CmdKind) -> bool {
        let _ = (line, pos, kind);
        false
    }
}

/// Completes slash-command names at the start of the line.
struct SlashCompleter;

impl SlashCompleter {
    fn candidates(line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let head = &line[..pos];
        if !head.starts_with('/') || head.contains(char::is_whitespace) {
            return (pos, Vec::new());
        }
        let head = head.to_lowercase();
        let matches = COMMAND_NAMES
            .iter()
            .filter(|cmd| cmd.starts_with(head.as_str()))
            .map(|cmd| Pair { display: (*cmd).to_string(), replacement: (*cmd).to_string() })
            .collect();
        (0, matches)
    }
}

impl Completer for SlashCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(Self::candidates(line, pos))
    }
}

fn build_editor(
    history_file: Option<&str>,
) -> rustyline::Result<Editor<TreqHelper, DefaultHistory>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let helper = TreqHelper { completer: SlashCompleter, hinter: HistoryHinter::new() };

    let mut editor = Editor::with_config(config)?;
    editor.set_helper(Some(helper));
    editor.bind_sequence(KeyEvent::alt('n'), Cmd::HistorySearchForward);
    editor.bind_sequence(KeyEvent::alt('p'), Cmd::HistorySearchBackward);

    if let Some(path) = history_file {
        if editor.load_history(path).is_err() {
            debug!("No previous history found");
        }
    }
    Ok(editor)
}

fn prompt_loop(
    mut editor: Editor<TreqHelper, DefaultHistory>,
    history_file: Option<&str>,
    requests: &std_mpsc::Receiver<()>,
    events: &mpsc::Sender<InputEvent>,
) {
    while requests.recv().is_ok() {
        let event = match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = editor.add_history_entry(line.as_str()) {
                        debug!(error = %e, "Failed to add history entry");
                    }
                    // Saved per line: the process may exit while this thread waits.
                    if let Some(path) = history_file {
                        if let Err(e) = editor.save_history(path) {
                            warn!("Failed to save history: {e}");
                        }
                    }
                }
                InputEvent::Line(line)
            },
            Err(ReadlineError::Interrupted) => InputEvent::Interrupted,
            Err(ReadlineError::Eof) => {
                debug!("Prompt input ended");
                return;
            },
            Err(e) => {
                warn!(error = %e, "Prompt failed");
                return;
            },
        };
        if events.blocking_send(event).is_err() {
            return;
        }
    }
}

/// Interactive line source backed by a rustyline editor thread.
///
/// Dropping it ends the thread once its current prompt returns, and puts the
/// terminal back in the mode it had before the first prompt.
pub struct ShellLineSource {
    requests: std_mpsc::Sender<()>,
    events: mpsc::Receiver<InputEvent>,
    /// A prompt was requested and its answer has not been taken yet.
    pending: bool,
    _terminal: Option<TerminalGuard>,
}

impl ShellLineSource {
    /// Starts the editor thread. Nothing is prompted until the first `next_event`.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be set up for line editing.
    pub fn spawn(history_file: Option<String>) -> anyhow::Result<Self> {
        let terminal = TerminalGuard::save();
        let (request_tx, request_rx) = std_mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

        std::thread::Builder::new().name("treq-prompt".to_string()).spawn(move || {
            let editor = match build_editor(history_file.as_deref()) {
                Ok(editor) => {
                    let _ = ready_tx.send(Ok(()));
                    editor
                },
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                },
            };
            prompt_loop(editor, history_file.as_deref(), &request_rx, &event_tx);
        })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                requests: request_tx,
                events: event_rx,
                pending: false,
                _terminal: terminal,
            }),
            Ok(Err(e)) => Err(anyhow::anyhow!("Failed to initialize the prompt: {e}")),
            Err(_) => Err(anyhow::anyhow!("Prompt thread exited during startup")),
        }
    }
}

#[async_trait]
impl LineSource for ShellLineSource {
    async fn next_event(&mut self) -> Option<InputEvent> {
        // A cancelled wait leaves its prompt open; reuse it instead of asking twice.
        if !self.pending {
            if self.requests.send(()).is_err() {
                return None;
            }
            self.pending = true;
        }
        let event = self.events.recv().await;
        self.pending = false;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacements(line: &str) -> Vec<String> {
        SlashCompleter::candidates(line, line.len()).1.into_iter().map(|p| p.replacement).collect()
    }

    #[test]
    fn completes_command_names() {
        assert_eq!(replacements("/c"), ["/close"]);
        assert_eq!(replacements("/J"), ["/json"]);
        assert_eq!(replacements("/").len(), COMMAND_NAMES.len());
    }

    #[test]
    fn plain_text_and_arguments_are_not_completed() {
        assert!(replacements("hello").is_empty());
        assert!(replacements("/close 10").is_empty());
    }
}
