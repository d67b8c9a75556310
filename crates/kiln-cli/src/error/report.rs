//! Rendering CLI errors as miette reports.

use kiln_config::ConfigError;
use kiln_pipeline::PipelineError;
use miette::Report;

use crate::error::CliError;

/// Convert a [`CliError`] into a report for `main`.
///
/// Pipeline errors already implement `Diagnostic` and are reported as-is so
/// their codes and help survive. Configuration errors get a help line
/// pointing at the offending key.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Pipeline(PipelineError::Config(e)) | CliError::Config(e) => {
            config_error_to_miette(e)
        }
        CliError::Pipeline(e) => Report::new(e),
        other => miette::miette!("{}", other),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err.field().map(str::to_owned) {
        Some(field) => miette::miette!(
            code = "kiln::config",
            help = format!("check the '{field}' key in your configuration"),
            "{}",
            err
        ),
        None => miette::miette!(code = "kiln::config", "{}", err),
    }
}
