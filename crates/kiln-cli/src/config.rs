//! Locating and resolving the project configuration for a command.
//!
//! Command-line overrides are written into the raw configuration before it
//! is resolved, so they go through the same validation as file values.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use kiln_config::{
    BuildConfig, ConfigDiscovery, ConfigResolver, RawConfig, RawDevServer, RawNativeTool,
};
use path_clean::PathClean;

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub release: bool,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub open: bool,
}

impl Overrides {
    pub fn apply(&self, raw: &mut RawConfig) {
        if let Some(dir) = &self.output_dir {
            // The nested `output.path` shape would conflict with `outputDir`
            match raw.output.as_mut() {
                Some(output) if output.path.is_some() => output.path = Some(dir.clone()),
                _ => raw.output_dir = Some(dir.clone()),
            }
        }

        if self.release {
            raw.native_tool
                .get_or_insert_with(RawNativeTool::default)
                .mode = Some("release".to_string());
        }

        if self.host.is_some() || self.port.is_some() || self.open {
            let dev = raw.dev_server.get_or_insert_with(RawDevServer::default);
            if let Some(host) = self.host {
                dev.host = Some(host.to_string());
            }
            if let Some(port) = self.port {
                dev.port = Some(port);
            }
            if self.open {
                dev.auto_open = Some(true);
            }
        }
    }
}

/// The project root: `--cwd` if given, the current directory otherwise.
pub fn project_root(project: &ProjectArgs) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let root = match &project.cwd {
        Some(dir) => cwd.join(dir).clean(),
        None => cwd,
    };
    if !root.is_dir() {
        return Err(CliError::FileNotFound(root));
    }
    Ok(root)
}

/// Read the raw configuration, from `--config` or by discovery.
pub fn load_raw(root: &Path, config: Option<&Path>) -> Result<RawConfig> {
    match config {
        Some(path) => {
            let path = root.join(path).clean();
            if !path.is_file() {
                return Err(CliError::FileNotFound(path));
            }
            tracing::debug!(path = %path.display(), "using explicit config file");
            Ok(ConfigDiscovery::load_path(&path)?)
        }
        None => {
            let discovery = ConfigDiscovery::new(root);
            if let Some(source) = discovery.find() {
                tracing::debug!(path = %source.path().display(), "discovered config file");
            }
            Ok(discovery.load()?)
        }
    }
}

/// Load, override and resolve the configuration for a command.
pub fn load(project: &ProjectArgs, overrides: &Overrides) -> Result<BuildConfig> {
    let root = project_root(project)?;
    let mut raw = load_raw(&root, project.config.as_deref())?;
    overrides.apply(&mut raw);
    Ok(ConfigResolver::new(root).resolve(raw)?)
}
