//! Logging setup for the `kiln` binary.
//!
//! Library crates only emit `tracing` events; the subscriber lives here and
//! is installed once, before any command runs.
//!
//! Level selection, highest priority first:
//! 1. `--verbose`: debug for every kiln crate
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. info for every kiln crate

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "kiln=debug,kiln_cli=debug,kiln_config=debug,kiln_pipeline=debug";
const QUIET_FILTER: &str = "kiln=error,kiln_cli=error,kiln_config=error,kiln_pipeline=error";
const DEFAULT_FILTER: &str = "kiln=info,kiln_cli=info,kiln_config=info,kiln_pipeline=info";

/// Pick the filter for the given flags.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber.
///
/// ```rust,no_run
/// use kiln_cli::logger::init_logger;
///
/// init_logger(false, false, false);
/// tracing::info!("starting build");
/// ```
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color || !should_use_colors());
}

/// Install the global subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    // A second init (e.g. from tests) is not an error worth reporting
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Whether stderr should receive ANSI colors.
///
/// `NO_COLOR` wins over `FORCE_COLOR`; otherwise the terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
