//! # In-kernel debugger
//!
//! Ties the pieces together. A trap stub calls
//! [`ice_trap::Dispatcher::dispatch`] with a [`Session`] built from the
//! [`Debugger`]; the session decides whether the trap is one of ours (a
//! planted breakpoint, a single step, an embedded `int1`/`int3`), runs the
//! operator's [`CommandLoop`] when it has to stop, and arms whatever the
//! next resume needs.
//!
//! The loader process talks to the debugger through [`Transport`].
//!
//! ## Entry actions
//! Each resume leaves a [`DebuggerState`] for the next trap:
//! - `Break`: stop and run the command loop.
//! - `DelayedTrace`: a step needs another look from the new EIP.
//! - `DelayedArm`: the CPU stepped off a sticky breakpoint, so the
//!   breakpoints go back in and execution continues.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod commands;
mod config;
mod context;
mod debugger;
mod error;
mod session;
mod state;
mod transport;

pub use commands::{CommandLoop, Commands};
pub use config::{EmbeddedTrapPolicy, IceConfig};
pub use context::{DebuggeeContext, SourceContext, StepRequest};
pub use debugger::Debugger;
pub use error::{IceError, status, to_status};
pub use session::Session;
pub use state::DebuggerState;
pub use transport::{HistorySource, InitPacket, OutputDevice, SYSTEM_MAP_ENTRIES, Transport};

use ice_console::ConsoleLogger;
use log::SetLoggerError;

/// Install `logger` and cap the level at the configured one.
///
/// # Errors
/// A logger was already installed.
pub fn init_logging(logger: &'static ConsoleLogger, config: &IceConfig) -> Result<(), SetLoggerError> {
    ice_console::init(logger)?;
    log::set_max_level(config.log_level.min(logger.max_level()));
    Ok(())
}
