// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

// Allow println/eprintln in CLI client - these are for direct user output, not logging
#![allow(clippy::disallowed_macros)]

pub mod config;
pub mod control_plane;
pub mod logging;
pub mod plan;
pub mod render;
pub mod shell;
pub mod stdin;
pub mod terminal;

use std::ffi::OsStr;
use std::io::IsTerminal;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use treq_core::{
    report_early_failure, run_session, BatchInput, ConnectedSession, DriverContext, LineSource,
    RunReport, SessionMode,
};

pub use config::{Config, ConfigLoadResult};
pub use control_plane::ControlPlaneClient;
pub use plan::{ExecutionPlan, RawWsArgs, ValidationError};
pub use render::{OutputMode, Renderer};

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const CONNECT_ERROR: &str = "CONNECT_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const USAGE_ERROR: &str = "USAGE_ERROR";
pub const INTERRUPTED: &str = "INTERRUPTED";

/// Everything `treq ws` was invoked with, after config defaults are known.
#[derive(Debug, Clone, Default)]
pub struct WsOptions {
    pub args: RawWsArgs,
    pub server: Option<String>,
    pub token: Option<String>,
    pub execute: Option<String>,
    pub json: bool,
    pub verbose: bool,
    pub no_color: bool,
}

fn batch_lines() -> Box<dyn LineSource> {
    match stdin::piped_stdin() {
        Ok(source) => Box::new(source),
        Err(e) => {
            warn!(error = %e, "Failed to read stdin, treating input as empty");
            Box::new(treq_core::VecLineSource::default())
        },
    }
}

fn choose_mode(execute: Option<String>, wait_seconds: i64, history: Option<String>) -> SessionMode {
    if let Some(payload) = execute {
        return SessionMode::Batch { input: BatchInput::Payload(payload), wait_seconds };
    }
    if std::io::stdin().is_terminal() {
        match shell::ShellLineSource::spawn(history) {
            Ok(source) => return SessionMode::Interactive(Box::new(source)),
            Err(e) => warn!(error = %e, "Interactive prompt unavailable, reading stdin as batch"),
        }
    }
    SessionMode::Batch { input: BatchInput::Lines(batch_lines()), wait_seconds }
}

/// Forwards Ctrl-C to the driver for as long as the process runs.
fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received Ctrl-C");
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

impl WsOptions {
    /// Output flags picked out of arguments that failed to parse, so the
    /// failure is still reported in the requested format.
    pub fn output_flags_from<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut options = Self::default();
        for arg in args {
            match arg.as_ref().to_str() {
                Some("--json") => options.json = true,
                Some("--verbose") => options.verbose = true,
                Some("--no-color") => options.no_color = true,
                Some("--") => break,
                _ => {},
            }
        }
        options
    }

    /// The terminal sink for these flags. `config_color` is the configured
    /// `color` key, or its default when no configuration could be loaded.
    pub fn renderer(&self, config_color: bool) -> Renderer {
        let mode = if self.json { OutputMode::Ndjson } else { OutputMode::Human };
        let color = render::color_enabled(config_color && !self.no_color);
        Renderer::new(mode, self.verbose, color)
    }
}

/// Reports a run that ended before any session existed and returns its exit status.
pub fn fail_early(code: &str, message: &str, ctx: &DriverContext) -> u8 {
    report_early_failure(code, message, &ctx.state, ctx.sink.as_ref(), &ctx.clock).exit_code()
}

/// Opens the session unless an interrupt arrives first.
///
/// # Errors
///
/// A connect failure or an interrupt is reported on `ctx` and its report returned.
pub async fn connect_or_interrupt(
    client: &ControlPlaneClient,
    plan: &ExecutionPlan,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
    ctx: &DriverContext,
) -> Result<ConnectedSession, RunReport> {
    let (code, message) = tokio::select! {
        connected = client.connect(plan) => match connected {
            Ok(session) => return Ok(session),
            Err(e) => {
                eprintln!("error: {e:#}");
                (CONNECT_ERROR, format!("{e:#}"))
            },
        },
        Some(()) = interrupts.recv() => {
            info!("Interrupted while connecting");
            (INTERRUPTED, "Interrupted while connecting".to_string())
        },
    };
    Err(report_early_failure(code, &message, &ctx.state, ctx.sink.as_ref(), &ctx.clock))
}

/// Runs `treq ws` end to end and returns the process exit status.
///
/// Every path, including configuration, validation and connect failures,
/// ends with exactly one `meta.summary` on `ctx`.
pub async fn run_ws(
    options: WsOptions,
    loaded: Result<ConfigLoadResult, Box<figment::Error>>,
    ctx: DriverContext,
) -> u8 {
    let config = match loaded {
        Ok(loaded) => loaded.config,
        Err(e) => {
            let message = format!("Failed to load configuration: {e}");
            eprintln!("error: {message}");
            return fail_early(CONFIG_ERROR, &message, &ctx);
        },
    };

    let plan = match plan::validate(&options.args) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {e}");
            return fail_early(VALIDATION_ERROR, &e.to_string(), &ctx);
        },
    };

    let server = options.server.unwrap_or_else(|| config.server.clone());
    let token = options.token.or_else(|| config.token.clone());
    let client = match ControlPlaneClient::new(&server, token, plan.timeout) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e:#}");
            return fail_early(CONNECT_ERROR, &format!("{e:#}"), &ctx);
        },
    };

    // Installed before connecting so Ctrl-C during the handshake is still reported.
    let mut interrupts = forward_interrupts();
    let session = match connect_or_interrupt(&client, &plan, &mut interrupts, &ctx).await {
        Ok(session) => session,
        Err(report) => return report.exit_code(),
    };

    let mode = choose_mode(options.execute, plan.wait_seconds, config.history_file);
    run_session(session, mode, ctx, interrupts).await.exit_code()
}
