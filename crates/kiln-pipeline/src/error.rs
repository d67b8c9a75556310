//! Error taxonomy for the build pipeline.
//!
//! - [`NativeBuildError`]: the native compiler failed; fatal for one attempt
//! - [`ConflictError`]: static assets collide; blocks the build
//! - [`BundleError`]: the bundler could not assemble or finalize output
//! - [`PipelineError`]: everything above plus configuration and I/O failures
//!
//! There is deliberately no timeout error: native builds are never timed out.

use std::fmt::Write as _;
use std::path::PathBuf;

use kiln_config::ConfigError;
use miette::Diagnostic;
use thiserror::Error;

/// Native compiler failures.
///
/// `Clone` so that every caller waiting on a shared in-flight build observes
/// the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum NativeBuildError {
    /// The compiler ran and exited with a non-zero status
    #[error("native compiler exited with code {exit_code}\n{stderr}")]
    #[diagnostic(
        code(kiln::native::exit),
        help("Fix the compiler errors above; the previous build stays in place until then")
    )]
    Exit { exit_code: i32, stderr: String },

    /// The compiler could not be started
    #[error("failed to spawn native compiler '{program}': {message}")]
    #[diagnostic(
        code(kiln::native::spawn_failed),
        help("Install wasm-pack (https://rustwasm.github.io/wasm-pack/) or set nativeTool.program")
    )]
    Spawn { program: String, message: String },

    /// The compiler exited successfully but did not leave the expected files
    #[error("native build succeeded but {} is missing: {reason}", path.display())]
    #[diagnostic(
        code(kiln::native::missing_output),
        help("Check nativeTool.outDir and nativeTool.outName against the compiler's output layout")
    )]
    MissingOutput { path: PathBuf, reason: String },

    /// The native source tree could not be read for fingerprinting
    #[error("failed to fingerprint native sources: {message}")]
    #[diagnostic(code(kiln::native::fingerprint))]
    Fingerprint { message: String },

    /// The build was abandoned before it produced a result
    #[error("native build was cancelled")]
    #[diagnostic(code(kiln::native::cancelled))]
    Cancelled,
}

impl NativeBuildError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Exit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Why a destination in the output directory is contested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Two or more static sources without a declared precedence
    StaticSources { files: Vec<PathBuf> },
    /// A static file would overwrite a file the bundler generated
    Generated { file: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub destination: PathBuf,
    pub kind: ConflictKind,
}

/// Unresolvable static asset collisions, sorted by destination.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{} conflicting asset destination(s):\n{}", conflicts.len(), describe(conflicts))]
#[diagnostic(
    code(kiln::assets::conflict),
    help("Mark the later pattern with `force = true`, give it a distinct `to`, or rename the file")
)]
pub struct ConflictError {
    pub conflicts: Vec<Conflict>,
}

impl ConflictError {
    /// Every contested destination, in order.
    pub fn destinations(&self) -> Vec<&std::path::Path> {
        self.conflicts.iter().map(|c| c.destination.as_path()).collect()
    }
}

fn describe(conflicts: &[Conflict]) -> String {
    let mut out = String::new();
    for conflict in conflicts {
        let _ = match &conflict.kind {
            ConflictKind::StaticSources { files } => writeln!(
                out,
                "  {} <- {}",
                conflict.destination.display(),
                files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ConflictKind::Generated { file } => writeln!(
                out,
                "  {} is generated by the build (static copy: {})",
                conflict.destination.display(),
                file.display()
            ),
        };
    }
    out
}

#[derive(Debug, Error, Diagnostic)]
pub enum BundleError {
    /// The native chunk referenced by the manifest is not on disk
    #[error("native chunk {} is not written; refusing to finalize the manifest", .0.display())]
    #[diagnostic(code(kiln::bundle::missing_chunk))]
    MissingChunk(PathBuf),

    #[error("entry point not found: {}", .0.display())]
    #[diagnostic(
        code(kiln::bundle::entry_not_found),
        help("Check the 'entryPoint' field in your config")
    )]
    EntryNotFound(PathBuf),

    #[error("bundler '{name}' failed: {message}")]
    #[diagnostic(code(kiln::bundle::failed))]
    Bundler { name: String, message: String },

    #[error("I/O error while writing bundle: {0}")]
    #[diagnostic(code(kiln::bundle::io))]
    Io(#[from] std::io::Error),
}

/// Top-level error for one pipeline pass.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    #[diagnostic(code(kiln::config))]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    NativeBuild(#[from] NativeBuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bundle(#[from] BundleError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(kiln::io))]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_error_carries_stderr() {
        let err = NativeBuildError::Exit {
            exit_code: 101,
            stderr: "error[E0433]: failed to resolve".to_string(),
        };
        assert_eq!(err.exit_code(), Some(101));
        assert!(err.to_string().contains("error[E0433]"));
    }

    #[test]
    fn missing_output_is_not_an_exit_error() {
        let err = NativeBuildError::MissingOutput {
            path: PathBuf::from("pkg/index_bg.wasm"),
            reason: "not found".to_string(),
        };
        assert_eq!(err.exit_code(), None);
        assert!(err.to_string().contains("pkg/index_bg.wasm"));
    }

    #[test]
    fn conflict_error_lists_destinations() {
        let err = ConflictError {
            conflicts: vec![
                Conflict {
                    destination: PathBuf::from("dist/a.txt"),
                    kind: ConflictKind::StaticSources {
                        files: vec![PathBuf::from("one/a.txt"), PathBuf::from("two/a.txt")],
                    },
                },
                Conflict {
                    destination: PathBuf::from("dist/index.js"),
                    kind: ConflictKind::Generated {
                        file: PathBuf::from("static/index.js"),
                    },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 conflicting"));
        assert!(msg.contains("dist/a.txt <- one/a.txt, two/a.txt"));
        assert!(msg.contains("dist/index.js is generated"));
    }

    #[test]
    fn pipeline_error_from_native() {
        let err: PipelineError = NativeBuildError::Cancelled.into();
        assert!(matches!(err, PipelineError::NativeBuild(_)));
    }
}
