//! The normalised configuration model consumed by the pipeline.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use indexmap::IndexSet;
use serde::Serialize;

use crate::routes::RouteSpec;

/// Port used when `devServer.port` is absent.
pub const DEFAULT_DEV_PORT: u16 = 8080;

/// Fully resolved build configuration. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Directory the configuration was resolved against
    pub root: PathBuf,
    pub entry_point: PathBuf,
    pub output_dir: PathBuf,
    pub output_filename: String,
    pub static_sources: Vec<StaticSource>,
    pub native_crate_dir: PathBuf,
    pub native_build_flags: IndexSet<String>,
    /// `None` values are left unset for the compiler to default
    pub native_env: BTreeMap<String, Option<String>>,
    pub native_tool: NativeToolConfig,
    pub native_watch_dirs: Vec<PathBuf>,
    pub dev_server: DevServerConfig,
}

/// What happens when a static source maps onto a destination an earlier
/// static source already claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverwritePolicy {
    /// Collisions are configuration errors
    Forbid,
    /// This source wins over earlier declarations
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSource {
    pub source_path: PathBuf,
    /// Relative prefix inside the output directory (empty for the root)
    pub dest_prefix: PathBuf,
    pub overwrite: OverwritePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildMode {
    Development,
    Release,
}

impl BuildMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "development" | "dev" => Some(Self::Development),
            "release" | "production" => Some(Self::Release),
            _ => None,
        }
    }

    pub fn as_flag(self) -> &'static str {
        match self {
            Self::Development => "--dev",
            Self::Release => "--release",
        }
    }
}

/// How the native compiler is invoked and where it leaves its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeToolConfig {
    pub program: PathBuf,
    pub target: String,
    /// Output directory, relative to the crate directory unless absolute
    pub out_dir: PathBuf,
    pub out_name: String,
    pub mode: BuildMode,
}

impl Default for NativeToolConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("wasm-pack"),
            target: "web".to_string(),
            out_dir: PathBuf::from("pkg"),
            out_name: "index".to_string(),
            mode: BuildMode::Development,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub auto_open: bool,
    /// Evaluated in order, before the built-in handlers
    pub custom_routes: Vec<RouteSpec>,
}

impl DevServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr())
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_DEV_PORT,
            auto_open: false,
            custom_routes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_parsing() {
        assert_eq!(BuildMode::parse("dev"), Some(BuildMode::Development));
        assert_eq!(BuildMode::parse("production"), Some(BuildMode::Release));
        assert_eq!(BuildMode::parse("fast"), None);
        assert_eq!(BuildMode::Release.as_flag(), "--release");
    }

    #[test]
    fn dev_server_url() {
        let server = DevServerConfig {
            port: 3000,
            ..Default::default()
        };
        assert_eq!(server.url(), "http://127.0.0.1:3000");
    }
}
