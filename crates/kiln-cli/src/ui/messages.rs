//! Status message functions for terminal output.

use owo_colors::OwoColorize;

/// Print a success line.
///
/// ```no_run
/// kiln_cli::ui::success("Build completed");
/// ```
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error line. Multi-line messages (compiler stderr) keep their
/// layout; only the first line is highlighted.
pub fn error(message: &str) {
    let (first, rest) = message.split_once('\n').unwrap_or((message, ""));
    eprintln!("{} {}", "✗".red().bold(), first.red());
    if !rest.is_empty() {
        eprintln!("{rest}");
    }
}

/// Print a debug line, only when `RUST_LOG` is set.
pub fn debug(message: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        eprintln!("{} {}", "◆".dimmed(), message.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_messages_do_not_panic() {
        success("Success message");
        info("Info message");
        warning("Warning message");
        error("native compiler exited with code 101\nerror[E0433]: failed to resolve");
        debug("Debug message");
    }
}
