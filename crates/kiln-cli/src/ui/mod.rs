//! Terminal output: status lines and build summaries.
//!
//! Everything is written to stderr so that `kiln check` can keep stdout for
//! machine-readable output.

mod format;
mod messages;

pub use format::{format_duration, format_size, print_build_summary};
pub use messages::{debug, error, info, success, warning};

/// Check if color output should be enabled for status lines.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` enables them even without a
/// terminal, otherwise it depends on whether stderr is attended.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the color decision globally.
pub fn init_colors() {
    owo_colors::set_override(should_use_color());
}
