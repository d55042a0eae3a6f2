// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn env_filter_or(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// `--verbose` raises our own crates to debug and leaves the HTTP and
/// WebSocket stacks at the configured level.
fn default_directives(level: tracing::Level, verbose: bool) -> String {
    let level = level.as_str().to_lowercase();
    if verbose {
        format!("{level},treq_core=debug,treq_client=debug")
    } else {
        level
    }
}

// stdout carries the event stream, so diagnostics always go to stderr.
fn make_console_layer(directives: &str) -> DynLayer {
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter_or(directives))
        .boxed()
}

/// Initialize logging. `RUST_LOG` wins over both the configured level and `--verbose`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(
    level: tracing::Level,
    verbose: bool,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directives = default_directives(level, verbose);
    tracing_subscriber::registry().with(make_console_layer(&directives)).try_init()
}
