//! Error types for configuration loading and normalisation.
//!
//! Every variant names the offending field so the CLI can point the
//! developer at the exact key that needs fixing.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found\n\nHint: create kiln.toml, kiln.json or add a \"kiln\" field to package.json")]
    NotFound,

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("conflicting options: {first} and {second} cannot both be set")]
    Conflicting { first: String, second: String },

    #[error(
        "outputDir {} contains static source {} (field '{field}')\n\nHint: copying a directory into itself would loop forever",
        output.display(),
        source_dir.display()
    )]
    OutputContainsSource {
        field: String,
        output: PathBuf,
        source_dir: PathBuf,
    },

    #[error(
        "outputDir {} is inside static source {} (field '{field}')\n\nHint: every build would copy the previous output one level deeper",
        output.display(),
        source_dir.display()
    )]
    OutputInsideSource {
        field: String,
        output: PathBuf,
        source_dir: PathBuf,
    },

    #[error("devServer middleware hook: {reason}")]
    MiddlewareHook { reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Build an [`ConfigError::InvalidValue`] for `field`.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The configuration key this error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::InvalidValue { field, .. }
            | Self::OutputContainsSource { field, .. }
            | Self::OutputInsideSource { field, .. } => Some(field),
            Self::Conflicting { first, .. } => Some(first),
            Self::MiddlewareHook { .. } => Some("devServer.customRoutes"),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        // figment records the key path of the value that failed to deserialize
        if err.path.is_empty() {
            ConfigError::Parse(err.to_string())
        } else {
            let field = err.path.join(".");
            ConfigError::InvalidValue {
                field,
                message: err.kind.to_string(),
            }
        }
    }
}
