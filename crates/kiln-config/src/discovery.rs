//! File-based config discovery for CLI use
//!
//! Finds a Kiln configuration file in a project directory and loads it
//! through `figment`, layering the `KILN_*` environment overrides on top.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::raw::RawConfig;

/// Configuration file names, in lookup order.
pub const CONFIG_FILES: &[&str] = &["kiln.toml", "kiln.json"];

/// Where a configuration was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Toml(PathBuf),
    Json(PathBuf),
    /// The `"kiln"` field of a `package.json`
    PackageJson(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Toml(p) | Self::Json(p) | Self::PackageJson(p) => p,
        }
    }
}

/// File-based configuration discovery.
///
/// # Example
///
/// ```no_run
/// use kiln_config::{ConfigDiscovery, ConfigResolver};
///
/// let discovery = ConfigDiscovery::new(".");
/// let raw = discovery.load().unwrap();
/// let config = ConfigResolver::new(discovery.root()).resolve(raw).unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find a config file in the root directory.
    ///
    /// Searches `kiln.toml`, then `kiln.json`, then a `package.json` with a
    /// non-null `kiln` field.
    pub fn find(&self) -> Option<ConfigSource> {
        let toml_path = self.root.join(CONFIG_FILES[0]);
        if toml_path.is_file() {
            return Some(ConfigSource::Toml(toml_path));
        }

        let json_path = self.root.join(CONFIG_FILES[1]);
        if json_path.is_file() {
            return Some(ConfigSource::Json(json_path));
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed: Value = serde_json::from_str(&content).ok()?;
        match parsed.get("kiln") {
            Some(value) if !value.is_null() => Some(ConfigSource::PackageJson(pkg_path)),
            _ => None,
        }
    }

    /// Load the discovered config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<RawConfig> {
        let source = self.find().ok_or(ConfigError::NotFound)?;
        Self::load_from(&source)
    }

    /// Load a specific config source with environment overrides applied.
    pub fn load_from(source: &ConfigSource) -> Result<RawConfig> {
        tracing::debug!(path = %source.path().display(), "loading configuration");

        let figment = match source {
            ConfigSource::Toml(path) => Figment::from(Toml::file_exact(path)),
            ConfigSource::Json(path) => Figment::from(Json::file_exact(path)),
            ConfigSource::PackageJson(path) => Figment::from(Json::file_exact(path)).focus("kiln"),
        };

        let raw = with_env_overrides(figment)?.extract::<RawConfig>()?;
        Ok(raw)
    }

    /// Load a config file by path, choosing the format from its name.
    pub fn load_path(path: &Path) -> Result<RawConfig> {
        let source = match (
            path.file_name().and_then(|n| n.to_str()),
            path.extension().and_then(|e| e.to_str()),
        ) {
            (Some("package.json"), _) => ConfigSource::PackageJson(path.to_path_buf()),
            (_, Some("toml")) => ConfigSource::Toml(path.to_path_buf()),
            (_, Some("json")) => ConfigSource::Json(path.to_path_buf()),
            _ => {
                return Err(ConfigError::invalid(
                    "config",
                    format!("unsupported config file: {}", path.display()),
                ));
            }
        };
        if !path.is_file() {
            return Err(ConfigError::NotFound);
        }
        Self::load_from(&source)
    }
}

/// `KILN_PORT` and `KILN_OUTPUT_DIR` override the file.
fn with_env_overrides(mut figment: Figment) -> Result<Figment> {
    if let Ok(port) = std::env::var("KILN_PORT") {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid("KILN_PORT", format!("'{port}' is not a port")))?;
        figment = figment.merge(Serialized::default("devServer.port", port));
    }
    if let Ok(dir) = std::env::var("KILN_OUTPUT_DIR") {
        figment = figment.merge(Serialized::default("outputDir", dir));
    }
    Ok(figment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::StaticAssetsDecl;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn toml_wins_over_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kiln.toml"), "entryPoint = \"a.js\"").unwrap();
        fs::write(dir.path().join("kiln.json"), r#"{"entryPoint": "b.js"}"#).unwrap();

        let found = ConfigDiscovery::new(dir.path()).find().unwrap();
        assert!(matches!(found, ConfigSource::Toml(_)));
    }

    #[test]
    fn package_json_without_kiln_field_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn load_returns_not_found_when_no_config() {
        let dir = TempDir::new().unwrap();
        let result = ConfigDiscovery::new(dir.path()).load();
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn load_from_package_json_field() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{
                "name": "app",
                "kiln": {
                    "entryPoint": "js/index.js",
                    "staticSources": ["static"]
                }
            }"#,
        )
        .unwrap();

        let raw = ConfigDiscovery::new(dir.path()).load().unwrap();
        assert_eq!(raw.entry_point.as_deref(), Some("js/index.js"));
        assert_eq!(
            raw.static_sources,
            Some(StaticAssetsDecl::LegacyArray(vec!["static".into()]))
        );
    }

    #[test]
    #[serial_test::serial]
    fn env_port_overrides_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("kiln.toml"),
            "entryPoint = \"a.js\"\n[devServer]\nport = 80\n",
        )
        .unwrap();

        // SAFETY: serialised with every other test that touches KILN_PORT
        unsafe { std::env::set_var("KILN_PORT", "9000") };
        let raw = ConfigDiscovery::new(dir.path()).load();
        unsafe { std::env::remove_var("KILN_PORT") };

        assert_eq!(raw.unwrap().dev_server.unwrap().port, Some(9000));
    }

    #[test]
    #[serial_test::serial]
    fn invalid_value_names_the_field() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("kiln.toml"),
            "entryPoint = \"a.js\"\n[devServer]\nport = \"eighty\"\n",
        )
        .unwrap();

        let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
        assert_eq!(err.field(), Some("devServer.port"));
    }
}
