// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Argument validation: raw `treq ws` flags in, an [`ExecutionPlan`] out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;
use treq_api::ExecuteWsRequest;
use url::Url;

pub const DEFAULT_WAIT_SECONDS: i64 = 2;
pub const MIN_TIMEOUT_MS: u64 = 100;

/// Any reason the flags could not be turned into a plan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Flags as typed by the user, before any parsing.
#[derive(Debug, Clone, Default)]
pub struct RawWsArgs {
    pub url: Option<String>,
    pub file: Option<String>,
    pub name: Option<String>,
    pub index: Option<String>,
    pub profile: Option<String>,
    pub vars: Vec<String>,
    pub timeout: Option<String>,
    pub wait: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url,
    File,
}

/// Everything needed to open and drive a session.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub source: Source,
    /// The WebSocket URL, or the absolute path of the request file.
    pub target: String,
    pub request: ExecuteWsRequest,
    pub timeout: Option<Duration>,
    pub wait_seconds: i64,
}

/// Resolves `--wait`: absent means 2 seconds, `-1` means wait forever.
///
/// # Errors
///
/// Returns an error unless the value is an integer that is `-1` or `>= 0`.
pub fn resolve_wait(raw: Option<&str>) -> Result<i64, ValidationError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_WAIT_SECONDS);
    };
    match raw.trim().parse::<i64>() {
        Ok(wait) if wait >= -1 => Ok(wait),
        _ => Err(ValidationError::new(format!(
            "--wait must be an integer >= 0, or -1 to wait forever (got '{raw}')"
        ))),
    }
}

/// Parses `KEY=VALUE` entries. Malformed entries are skipped with a warning.
pub fn parse_vars(entries: &[String]) -> IndexMap<String, String> {
    let mut vars = IndexMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            warn!(entry = %entry, "Ignoring variable without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            warn!(entry = %entry, "Ignoring variable with an empty key");
            continue;
        }
        vars.insert(key.to_string(), value.to_string());
    }
    vars
}

/// Checks that `raw` is a `ws://` or `wss://` URL.
///
/// # Errors
///
/// Returns an error if the URL does not parse or uses another scheme.
pub fn validate_ws_url(raw: &str) -> Result<Url, ValidationError> {
    let url =
        Url::parse(raw).map_err(|e| ValidationError::new(format!("Invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        _ => Err(ValidationError::new("URL must use ws:// or wss://")),
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_index(raw: &str) -> Result<u32, ValidationError> {
    raw.trim().parse::<u32>().map_err(|_| {
        ValidationError::new(format!("--index must be a non-negative integer (got '{raw}')"))
    })
}

fn parse_timeout(raw: &str) -> Result<u64, ValidationError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms >= MIN_TIMEOUT_MS => Ok(ms),
        _ => Err(ValidationError::new(format!(
            "--timeout must be an integer >= {MIN_TIMEOUT_MS} (milliseconds, got '{raw}')"
        ))),
    }
}

fn resolve_file(raw: &str) -> Result<PathBuf, ValidationError> {
    let path = std::path::absolute(Path::new(raw))
        .map_err(|e| ValidationError::new(format!("Cannot resolve path '{raw}': {e}")))?;
    if !path.is_file() {
        return Err(ValidationError::new(format!("File not found: {}", path.display())));
    }
    Ok(path)
}

/// Validates the raw flags and builds the plan. Nothing is returned on failure.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate(raw: &RawWsArgs) -> Result<ExecutionPlan, ValidationError> {
    let url = non_empty(raw.url.as_ref());
    let file = non_empty(raw.file.as_ref());
    let name = non_empty(raw.name.as_ref());
    let index = non_empty(raw.index.as_ref());

    let (source, target) = match (url, file) {
        (Some(url), None) => (Source::Url, url),
        (None, Some(file)) => (Source::File, file),
        (Some(_), Some(_)) => {
            return Err(ValidationError::new("Provide either a WebSocket URL or --file, not both"))
        },
        (None, None) => return Err(ValidationError::new("Provide a WebSocket URL or --file")),
    };

    if name.is_some() && index.is_some() {
        return Err(ValidationError::new("--name and --index are mutually exclusive"));
    }
    if source == Source::Url && (name.is_some() || index.is_some()) {
        return Err(ValidationError::new("--name and --index can only be used with --file"));
    }

    let request_index = index.map(parse_index).transpose()?;
    let timeout_ms = raw.timeout.as_deref().map(parse_timeout).transpose()?;
    let wait_seconds = resolve_wait(raw.wait.as_deref())?;

    let mut request = ExecuteWsRequest {
        request_name: name.map(str::to_string),
        request_index,
        profile: non_empty(raw.profile.as_ref()).map(str::to_string),
        variables: parse_vars(&raw.vars),
        timeout_ms,
        ..Default::default()
    };

    let target = match source {
        Source::Url => {
            let url = validate_ws_url(target)?;
            request.url = Some(url.to_string());
            url.to_string()
        },
        Source::File => {
            let path = resolve_file(target)?.display().to_string();
            request.path = Some(path.clone());
            path
        },
    };

    Ok(ExecutionPlan {
        source,
        target,
        request,
        timeout: timeout_ms.map(Duration::from_millis),
        wait_seconds,
    })
}
