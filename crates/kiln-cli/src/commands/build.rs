//! `kiln build`: one full pass.

use kiln_config::BuildConfig;
use kiln_pipeline::{PassReport, Pipeline};

use crate::cli::BuildArgs;
use crate::config::{self, Overrides};
use crate::error::Result;
use crate::ui;

pub async fn execute(args: BuildArgs) -> Result<()> {
    let overrides = Overrides {
        output_dir: args.out_dir,
        release: args.release,
        ..Default::default()
    };
    let config = config::load(&args.project, &overrides)?;

    let entry = config
        .entry_point
        .strip_prefix(&config.root)
        .unwrap_or(&config.entry_point);
    ui::info(&format!(
        "Building {} ({} mode)",
        entry.display(),
        config.native_tool.mode.as_flag().trim_start_matches('-')
    ));

    let output_dir = config.output_dir.clone();
    let report = run(config).await?;

    ui::print_build_summary(&report, &output_dir);
    ui::success(&format!(
        "Build completed in {}",
        ui::format_duration(report.duration)
    ));
    Ok(())
}

/// Run a single pass for a resolved configuration.
pub async fn run(config: BuildConfig) -> Result<PassReport> {
    Ok(Pipeline::new(config).run().await?)
}
