//! NDX Notify - operator CLI
//!
//! Runs the lease notification pipeline over a file of EventBridge events,
//! renders templates locally and validates configuration.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::command;
pub use commands::{run_check_config, run_process, run_render, ProcessArgs};
