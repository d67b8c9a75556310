//! Runs the native compiler as a subprocess and collects its output files.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use indexmap::IndexSet;
use kiln_config::NativeToolConfig;
use tokio::process::Command;

use crate::cache::{BuildArtifact, Fingerprint};
use crate::error::NativeBuildError;

/// Invokes the configured compiler, e.g.
///
/// ```text
/// wasm-pack build --target web --out-dir pkg --out-name index --dev --weak-refs <crate_dir>
/// ```
#[derive(Debug, Clone)]
pub struct NativeCompiler {
    tool: NativeToolConfig,
}

impl NativeCompiler {
    pub fn new(tool: NativeToolConfig) -> Self {
        Self { tool }
    }

    /// Arguments passed to the compiler, in order.
    pub fn args(&self, crate_dir: &Path, flags: &IndexSet<String>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "build".into(),
            "--target".into(),
            self.tool.target.clone().into(),
            "--out-dir".into(),
            self.tool.out_dir.clone().into(),
            "--out-name".into(),
            self.tool.out_name.clone().into(),
            self.tool.mode.as_flag().into(),
        ];
        args.extend(flags.iter().map(OsString::from));
        args.push(crate_dir.into());
        args
    }

    /// Directory the compiler writes into.
    pub fn out_dir(&self, crate_dir: &Path) -> PathBuf {
        // `join` keeps absolute out dirs as they are
        crate_dir.join(&self.tool.out_dir)
    }

    /// Run the compiler once and read back its output.
    ///
    /// The child is killed if the returned future is dropped before it exits.
    pub async fn run(
        &self,
        crate_dir: &Path,
        flags: &IndexSet<String>,
        env: &BTreeMap<String, Option<String>>,
        fingerprint: Fingerprint,
    ) -> Result<BuildArtifact, NativeBuildError> {
        let started = Instant::now();
        let program = self.tool.program.display().to_string();

        let mut cmd = Command::new(&self.tool.program);
        cmd.args(self.args(crate_dir, flags)).current_dir(crate_dir);
        for (key, value) in env {
            match value {
                Some(value) => cmd.env(key, value),
                None => cmd.env_remove(key),
            };
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(%program, crate_dir = %crate_dir.display(), "spawning native compiler");

        let child = cmd.spawn().map_err(|e| NativeBuildError::Spawn {
            program: program.clone(),
            message: e.to_string(),
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| NativeBuildError::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        if !output.stdout.is_empty() {
            tracing::trace!(stdout = %String::from_utf8_lossy(&output.stdout), "native compiler output");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            // No exit code means the child was killed by a signal
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(NativeBuildError::Exit { exit_code, stderr });
        }

        let out_dir = self.out_dir(crate_dir);
        let out_name = &self.tool.out_name;

        let binary_path = out_dir.join(format!("{out_name}_bg.wasm"));
        let binary = tokio::fs::read(&binary_path)
            .await
            .map_err(|e| missing(binary_path, e))?;

        let shim_path = out_dir.join(format!("{out_name}.js"));
        let shim = tokio::fs::read_to_string(&shim_path)
            .await
            .map_err(|e| missing(shim_path, e))?;

        Ok(BuildArtifact {
            fingerprint,
            out_name: out_name.clone(),
            binary,
            shim,
            build_time: started.elapsed(),
        })
    }
}

fn missing(path: PathBuf, err: std::io::Error) -> NativeBuildError {
    NativeBuildError::MissingOutput {
        path,
        reason: err.to_string(),
    }
}
