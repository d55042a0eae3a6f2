// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! treq core - the WebSocket session driver.
//!
//! Turns the sequenced envelope feed of a control-plane session into CLI
//! events, multiplexes it against interactive or batch input, and owns the
//! shutdown protocol.
//!
//! ## Modules
//!
//! - [`connection`]: the `SessionConnection` seam and the envelope stream
//! - [`mapper`]: envelope → event translation
//! - [`consumer`]: the consumer loop
//! - [`slash`]: slash-command parsing for interactive mode
//! - [`interactive`] / [`batch`]: the two input controllers
//! - [`shutdown`]: graceful close, drain-then-force, interrupts
//! - [`reporter`]: final summary and exit status
//! - [`driver`]: wires all of the above together for one run
//! - [`state`]: the shared run state
//! - [`error`]: error types

pub use async_trait::async_trait;

pub mod batch;
pub mod connection;
pub mod consumer;
pub mod driver;
pub mod error;
pub mod input;
pub mod interactive;
pub mod mapper;
pub mod reporter;
pub mod shutdown;
pub mod sink;
pub mod slash;
pub mod state;

pub use batch::{BatchController, BatchInput, BatchOutcome};
pub use connection::{ConnectedSession, EnvelopeStream, SessionConnection, SessionInfo};
pub use driver::{run_session, DriverContext, SessionMode};
pub use error::{SessionError, SlashError};
pub use input::{ChannelLineSource, InputEvent, LineSource, VecLineSource};
pub use reporter::{report_early_failure, report_run, RunReport};
pub use shutdown::ShutdownCoordinator;
pub use sink::EventSink;
pub use slash::{parse_slash_command, SlashCommand};
pub use state::{system_clock, Clock, RunState};
