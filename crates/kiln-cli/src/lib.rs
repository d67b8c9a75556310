//! Command-line interface for Kiln.
//!
//! Kiln builds a web application that embeds a native module compiled to
//! WebAssembly. This crate wires the configuration and pipeline crates to a
//! terminal:
//!
//! - [`cli`] - argument parsing
//! - [`commands`] - `build`, `dev` and `check`
//! - [`config`] - locating and resolving the project configuration
//! - [`dev`] - development server, live reload and file watching
//! - [`error`] - CLI errors and their miette rendering
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and build summaries
//!
//! ```rust,no_run
//! use kiln_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
