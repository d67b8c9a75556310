//! Formatting utilities for sizes, durations, and build summaries.

use std::path::Path;
use std::time::Duration;

use console::Term;
use kiln_pipeline::{ChunkKind, NativeOutcome, PassReport};
use owo_colors::OwoColorize;

/// Format a byte count with the largest fitting unit.
///
/// ```
/// use kiln_cli::ui::format_size;
///
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format a duration as `ms`, seconds, or `Xm Ys`.
///
/// ```
/// use std::time::Duration;
/// use kiln_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn kind_label(kind: ChunkKind) -> &'static str {
    match kind {
        ChunkKind::Entry => "entry",
        ChunkKind::Loader => "loader",
        ChunkKind::Shim => "shim",
        ChunkKind::Native => "wasm",
        ChunkKind::Manifest => "manifest",
    }
}

/// Print the files a pass emitted, relative to the output directory.
pub fn print_build_summary(report: &PassReport, output_dir: &Path) {
    let width = Term::stderr().size().1 as usize;
    let rule = "─".repeat(width.clamp(20, 80));

    eprintln!("\n{}", "Build Summary".bold().underline());
    eprintln!("{rule}");

    for file in &report.bundle.files {
        let name = file.path.strip_prefix(output_dir).unwrap_or(&file.path);
        eprintln!(
            "  {} {} {} {}",
            "▸".blue(),
            name.display().bright_white().bold(),
            format_size(file.size).dimmed(),
            format!("({})", kind_label(file.kind)).dimmed()
        );
    }
    if report.assets.copied > 0 {
        eprintln!(
            "  {} {} static file(s) {}",
            "▸".blue(),
            report.assets.copied,
            format_size(report.assets.bytes).dimmed()
        );
    }

    eprintln!("{rule}");

    let native = match report.native {
        NativeOutcome::Cached => "native module cached".to_string(),
        NativeOutcome::Built { duration } => {
            format!("native module built in {}", format_duration(duration))
        }
    };
    eprintln!(
        "  {} {} in {} ({})",
        "Total:".bold(),
        format_size(report.bundle.total_size() + report.assets.bytes).green(),
        format_duration(report.duration).green(),
        native.dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "61m 1s");
    }
}
