//! Command-line shell for Canopy
//!
//! Drives a demo application rendered into an in-memory surface, one command
//! per line. Lines starting with `{` go straight to the JSON bridge, so the
//! same session can be scripted the way a remote inspector would.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod shell;

pub use commands::Command;
pub use shell::{CliError, Outcome, Shell};
