// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Parser for interactive slash commands.
//!
//! ```text
//! /help
//! /ping
//! /close [code] [reason...]
//! /json <payload>
//! /raw <payload>
//! ```

use serde_json::Value;

use crate::error::SlashError;
use crate::mapper::DEFAULT_CLOSE_CODE;

const MAX_CLOSE_CODE: u16 = 4999;

pub const HELP_TEXT: &str = "\
Available commands:
  /help                     Show this help message
  /ping                     Send a protocol ping
  /close [code] [reason]    Close the session (default code 1000)
  /json <payload>           Send a JSON payload
  /raw <payload>            Send text as-is, including a leading '/'

Any other line is sent verbatim as a text frame.";

/// Names offered for tab completion.
pub const COMMAND_NAMES: &[&str] = &["/help", "/ping", "/close", "/json", "/raw"];

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    Help,
    Ping,
    Close { code: u16, reason: String },
    Json { payload: Value },
    Raw { payload: String },
}

/// Parses one line that starts with `/`.
///
/// # Errors
///
/// Returns an error for unknown commands, close codes outside `0..=4999`, and
/// empty or unparseable JSON payloads.
pub fn parse_slash_command(line: &str) -> Result<SlashCommand, SlashError> {
    let line = line.trim_start();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    match head.to_ascii_lowercase().as_str() {
        "/help" => Ok(SlashCommand::Help),
        "/ping" => Ok(SlashCommand::Ping),
        "/close" => parse_close(rest),
        "/json" => {
            let rest = rest.trim();
            if rest.is_empty() {
                return Err(SlashError::InvalidJsonPayload("payload is empty".to_string()));
            }
            serde_json::from_str(rest)
                .map(|payload| SlashCommand::Json { payload })
                .map_err(|e| SlashError::InvalidJsonPayload(e.to_string()))
        },
        "/raw" => Ok(SlashCommand::Raw { payload: rest.trim_start().to_string() }),
        _ => Err(SlashError::UnknownCommand(head.to_string())),
    }
}

fn parse_close(rest: &str) -> Result<SlashCommand, SlashError> {
    let mut tokens = rest.split_whitespace();
    let code = match tokens.next() {
        None => DEFAULT_CLOSE_CODE,
        Some(raw) => raw
            .parse::<u16>()
            .ok()
            .filter(|code| *code <= MAX_CLOSE_CODE)
            .ok_or_else(|| SlashError::InvalidCloseCode(raw.to_string()))?,
    };
    let reason = tokens.collect::<Vec<_>>().join(" ");
    Ok(SlashCommand::Close { code, reason: strip_matching_quotes(&reason).to_string() })
}

fn strip_matching_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
