// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

// Allow eprintln before logging is up
#![allow(clippy::disallowed_macros)]

use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use treq_client::config::{self, LogLevel, DEFAULT_CONFIG_PATH};
use treq_client::{logging, RawWsArgs, WsOptions, USAGE_ERROR};
use treq_core::{system_clock, DriverContext, EventSink};

#[derive(Parser, Debug)]
#[command(author, version, about = "treq client CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a WebSocket session through the treq server (interactive or batch)
    Ws(WsArgs),
}

#[derive(Args, Debug)]
struct WsArgs {
    /// WebSocket URL to connect to (ws:// or wss://)
    url: Option<String>,
    /// Request file containing a WebSocket request
    #[arg(short, long)]
    file: Option<String>,
    /// Select the request by name (file mode)
    #[arg(short, long)]
    name: Option<String>,
    /// Select the request by zero-based index (file mode)
    #[arg(short, long)]
    index: Option<String>,
    /// Profile to resolve variables with
    #[arg(short, long)]
    profile: Option<String>,
    /// Variable override, repeatable
    #[arg(short = 'v', long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,
    /// Server URL (default: http://127.0.0.1:4096)
    #[arg(short, long)]
    server: Option<String>,
    /// Bearer token for the server
    #[arg(short, long)]
    token: Option<String>,
    /// Connect timeout in milliseconds (>= 100)
    #[arg(long, value_name = "MS")]
    timeout: Option<String>,
    /// Send one payload, then close (batch mode)
    #[arg(short = 'x', long, value_name = "PAYLOAD")]
    execute: Option<String>,
    /// Seconds to wait for replies before closing in batch mode; -1 waits forever
    #[arg(short, long, value_name = "SECONDS", allow_hyphen_values = true)]
    wait: Option<String>,
    /// Emit NDJSON events instead of human-readable lines
    #[arg(long)]
    json: bool,
    /// Show raw envelopes and debug logs
    #[arg(long)]
    verbose: bool,
    /// Disable colored output
    #[arg(long)]
    no_color: bool,
    /// Path to the configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

impl WsArgs {
    fn into_options(self) -> WsOptions {
        WsOptions {
            args: RawWsArgs {
                url: self.url,
                file: self.file,
                name: self.name,
                index: self.index,
                profile: self.profile,
                vars: self.vars,
                timeout: self.timeout,
                wait: self.wait,
            },
            server: self.server,
            token: self.token,
            execute: self.execute,
            json: self.json,
            verbose: self.verbose,
            no_color: self.no_color,
        }
    }
}

/// Exit status for arguments clap rejected. Help and version output are not runs.
fn usage_failure(e: &clap::Error, ctx: &DriverContext) -> u8 {
    if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
        return 0;
    }
    let rendered = e.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    treq_client::fail_early(USAGE_ERROR, first.strip_prefix("error: ").unwrap_or(first), ctx)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(print_err) = e.print() {
                eprintln!("error: {print_err}");
            }
            let flags = WsOptions::output_flags_from(std::env::args_os().skip(1));
            let ctx = DriverContext::new(Arc::new(flags.renderer(true)), system_clock());
            return ExitCode::from(usage_failure(&e, &ctx));
        },
    };

    match cli.command {
        Commands::Ws(args) => {
            let loaded = config::load(&args.config);
            let (log_level, config_color) = loaded
                .as_ref()
                .map_or((LogLevel::default(), true), |l| (l.config.log_level, l.config.color));

            if let Err(e) = logging::init_logging(log_level.into(), args.verbose) {
                eprintln!("error: failed to initialize logging: {e}");
            }
            if let Ok(loaded) = &loaded {
                if let Some(path) = &loaded.file_missing {
                    if path != DEFAULT_CONFIG_PATH {
                        warn!(path = %path, "Configuration file not found, using defaults");
                    }
                }
                debug!(server = %loaded.config.server, "Configuration loaded");
            }

            let options = args.into_options();
            let sink: Arc<dyn EventSink> = Arc::new(options.renderer(config_color));
            let ctx = DriverContext::new(sink, system_clock());
            ExitCode::from(treq_client::run_ws(options, loaded, ctx).await)
        },
    }
}
