//! Command-line interface definition.
//!
//! - `kiln build` - one full build pass
//! - `kiln dev` - build, watch and serve with live reload
//! - `kiln check` - resolve the configuration and show what a build would copy

mod commands;

use clap::Parser;

pub use commands::{BuildArgs, CheckArgs, Command, DevArgs, ProjectArgs};

/// Kiln - build coordinator for web apps with a native WebAssembly module
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Build coordinator for web apps with a native WebAssembly module",
    long_about = "Kiln compiles a Rust crate to WebAssembly, injects it into the JavaScript\n\
                  module graph, bundles the entry point and merges static assets into a\n\
                  single output directory."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
