//! `kiln check`: resolve the configuration and plan the static copies
//! without building.
//!
//! The normalised configuration and the copy plan go to stdout as JSON;
//! warnings and conflicts go to stderr.

use std::collections::BTreeSet;
use std::path::PathBuf;

use kiln_config::BuildConfig;
use kiln_pipeline::{AssetMergePlanner, LOADER_FILE, MANIFEST_FILE, PipelineError};
use serde::Serialize;

use crate::cli::CheckArgs;
use crate::config::{self, Overrides};
use crate::error::Result;
use crate::ui;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport<'a> {
    pub config: &'a BuildConfig,
    pub copy_plan: Vec<PlannedCopy>,
}

#[derive(Debug, Serialize)]
pub struct PlannedCopy {
    pub from: PathBuf,
    pub to: PathBuf,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    let config = config::load(&args.project, &Overrides::default())?;

    for warning in warnings(&config) {
        ui::warning(&warning);
    }

    let report = check(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    ui::success(&format!(
        "Configuration is valid ({} static file(s) to copy)",
        report.copy_plan.len()
    ));
    Ok(())
}

/// Plan the static copies against the files every build writes under a fixed
/// name. Hashed chunk names are not known before a build.
pub fn check(config: &BuildConfig) -> Result<CheckReport<'_>> {
    let generated: BTreeSet<PathBuf> = [config.output_filename.as_str(), LOADER_FILE, MANIFEST_FILE]
        .into_iter()
        .map(|name| config.output_dir.join(name))
        .collect();

    let plan = AssetMergePlanner::new(config.output_dir.clone())
        .plan(&config.static_sources, &generated)
        .map_err(PipelineError::from)?;

    let copy_plan = plan
        .entries()
        .iter()
        .map(|entry| PlannedCopy {
            from: entry.source.clone(),
            to: entry.destination.clone(),
        })
        .collect();

    Ok(CheckReport { config, copy_plan })
}

/// Problems that do not invalidate the configuration but will fail a build.
pub fn warnings(config: &BuildConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.entry_point.is_file() {
        warnings.push(format!(
            "entry point {} does not exist",
            config.entry_point.display()
        ));
    }
    if !config.native_crate_dir.join("Cargo.toml").is_file() {
        warnings.push(format!(
            "no Cargo.toml in native crate directory {}",
            config.native_crate_dir.display()
        ));
    }
    for source in &config.static_sources {
        if !source.source_path.exists() {
            warnings.push(format!(
                "static source {} does not exist and will be skipped",
                source.source_path.display()
            ));
        }
    }
    warnings
}
