use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available Kiln subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one build pass
    ///
    /// Compiles the native crate (or reuses the cached artifact), bundles the
    /// entry point and copies static assets into the output directory.
    Build(BuildArgs),

    /// Start the development server
    ///
    /// Builds once, serves the output directory, and rebuilds with live
    /// reload whenever sources change.
    Dev(DevArgs),

    /// Validate the configuration
    ///
    /// Prints the normalised configuration and the static asset copy plan,
    /// reporting destination conflicts without building anything.
    Check(CheckArgs),
}

/// Options shared by every command that reads a project.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Configuration file (kiln.toml, kiln.json or package.json)
    ///
    /// When omitted, the project root is searched in that order.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Compile the native crate in release mode
    #[arg(long)]
    pub release: bool,

    /// Output directory, overriding the configuration
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DevArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, value_name = "ADDR")]
    pub host: Option<IpAddr>,

    /// Open the browser once the server is up
    #[arg(long)]
    pub open: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}
