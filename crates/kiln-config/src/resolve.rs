//! Normalisation of [`RawConfig`] into [`BuildConfig`].
//!
//! This is the only place that knows about historical configuration shapes.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use path_clean::PathClean;

use crate::error::{ConfigError, Result};
use crate::model::{
    BuildConfig, BuildMode, DevServerConfig, NativeToolConfig, OverwritePolicy, StaticSource,
    DEFAULT_DEV_PORT,
};
use crate::raw::{
    EnvValueDecl, FlagsDecl, PatternDecl, RawConfig, RawDevServer, RawNativeTool,
    StaticAssetsDecl,
};
use crate::routes::{MiddlewareHook, RouteChain, RouteSpec};

const DEFAULT_OUTPUT_DIR: &str = "dist";
const DEFAULT_OUTPUT_FILENAME: &str = "index.js";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Turns a [`RawConfig`] into a validated [`BuildConfig`].
///
/// # Example
///
/// ```
/// use kiln_config::{ConfigResolver, RawConfig, StaticAssetsDecl};
///
/// let raw = RawConfig {
///     entry_point: Some("js/index.js".into()),
///     static_sources: Some(StaticAssetsDecl::LegacyArray(vec!["static".into()])),
///     ..Default::default()
/// };
/// let config = ConfigResolver::new("/project").resolve(raw).unwrap();
/// assert_eq!(config.output_dir, std::path::PathBuf::from("/project/dist"));
/// ```
#[derive(Clone)]
pub struct ConfigResolver {
    root: PathBuf,
    hook: Option<MiddlewareHook>,
    env: EnvLookup,
}

impl ConfigResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: root.clean(),
            hook: None,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Register a middleware hook that receives the default handler chain.
    pub fn with_middleware_hook(mut self, hook: MiddlewareHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Replace the process-environment lookup used for `{ fromEnv }` values.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub fn resolve(&self, raw: RawConfig) -> Result<BuildConfig> {
        let entry = raw
            .entry_point
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "entryPoint".to_string(),
            })?;
        let entry_point = self.absolute(Path::new(entry));

        let (output_dir, output_filename) = self.resolve_output(&raw)?;

        let static_sources = match &raw.static_sources {
            Some(decl) => self.resolve_static_sources(decl)?,
            None => Vec::new(),
        };
        check_output_disjoint(&output_dir, &static_sources)?;

        let native_crate_dir = self.absolute(
            raw.native_crate_dir
                .as_deref()
                .unwrap_or_else(|| Path::new(".")),
        );

        let native_build_flags = resolve_flags(raw.native_build_flags.as_ref())?;
        let native_env = self.resolve_env(&raw.native_env);
        let mut native_tool = resolve_native_tool(raw.native_tool.as_ref())?;
        // A bare name is looked up on PATH; anything with a directory part is
        // relative to the project root
        if native_tool.program.components().count() > 1 {
            native_tool.program = self.absolute(&native_tool.program);
        }
        let native_watch_dirs = raw
            .native_watch_dirs
            .iter()
            .map(|dir| self.absolute(dir))
            .collect();

        let dev_server = self.resolve_dev_server(raw.dev_server.as_ref())?;

        let config = BuildConfig {
            root: self.root.clone(),
            entry_point,
            output_dir,
            output_filename,
            static_sources,
            native_crate_dir,
            native_build_flags,
            native_env,
            native_tool,
            native_watch_dirs,
            dev_server,
        };

        tracing::debug!(
            output_dir = %config.output_dir.display(),
            static_sources = config.static_sources.len(),
            custom_routes = config.dev_server.custom_routes.len(),
            "resolved build configuration"
        );

        Ok(config)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.root.join(path).clean()
        }
    }

    fn resolve_output(&self, raw: &RawConfig) -> Result<(PathBuf, String)> {
        let nested = raw.output.clone().unwrap_or_default();

        let dir = match (&raw.output_dir, &nested.path) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflicting {
                    first: "outputDir".to_string(),
                    second: "output.path".to_string(),
                });
            }
            (Some(dir), None) | (None, Some(dir)) => dir.clone(),
            (None, None) => PathBuf::from(DEFAULT_OUTPUT_DIR),
        };

        let filename = match (&raw.output_filename, &nested.filename) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflicting {
                    first: "outputFilename".to_string(),
                    second: "output.filename".to_string(),
                });
            }
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => DEFAULT_OUTPUT_FILENAME.to_string(),
        };

        if filename.is_empty() || !is_plain_relative(Path::new(&filename)) {
            return Err(ConfigError::invalid(
                "outputFilename",
                format!("'{filename}' must be a relative path inside outputDir"),
            ));
        }

        Ok((self.absolute(&dir), filename))
    }

    fn resolve_static_sources(&self, decl: &StaticAssetsDecl) -> Result<Vec<StaticSource>> {
        let patterns: Vec<PatternDecl> = match decl {
            StaticAssetsDecl::LegacyArray(dirs) => dirs
                .iter()
                .map(|dir| PatternDecl {
                    from: dir.clone(),
                    to: None,
                    force: false,
                })
                .collect(),
            StaticAssetsDecl::StructuredPatterns(patterns) => patterns.clone(),
        };

        patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                let field = format!("staticSources[{index}]");
                if pattern.from.trim().is_empty() {
                    return Err(ConfigError::invalid(field, "'from' must not be empty"));
                }

                let dest_prefix = match pattern.to.as_deref() {
                    None | Some("") | Some(".") => PathBuf::new(),
                    Some(to) => {
                        let to = Path::new(to);
                        if !is_plain_relative(to) {
                            return Err(ConfigError::invalid(
                                format!("{field}.to"),
                                "must be a relative path that stays inside outputDir",
                            ));
                        }
                        to.clean()
                    }
                };

                Ok(StaticSource {
                    source_path: self.absolute(Path::new(&pattern.from)),
                    dest_prefix,
                    overwrite: if pattern.force {
                        OverwritePolicy::Override
                    } else {
                        OverwritePolicy::Forbid
                    },
                })
            })
            .collect()
    }

    fn resolve_env(
        &self,
        env: &BTreeMap<String, Option<EnvValueDecl>>,
    ) -> BTreeMap<String, Option<String>> {
        env.iter()
            .map(|(key, value)| {
                let resolved = match value {
                    None => None,
                    Some(EnvValueDecl::Literal(literal)) => Some(literal.clone()),
                    Some(EnvValueDecl::FromEnv { from_env }) => {
                        let found = (self.env)(from_env);
                        if found.is_none() {
                            tracing::debug!(
                                variable = %from_env,
                                key = %key,
                                "environment variable not set, leaving native env unset"
                            );
                        }
                        found
                    }
                };
                (key.clone(), resolved)
            })
            .collect()
    }

    fn resolve_dev_server(&self, raw: Option<&RawDevServer>) -> Result<DevServerConfig> {
        let defaults = DevServerConfig::default();
        let Some(raw) = raw else {
            return Ok(DevServerConfig {
                custom_routes: self.apply_hook(Vec::new())?,
                ..defaults
            });
        };

        let host = match raw.host.as_deref() {
            None => defaults.host,
            Some("localhost") => defaults.host,
            Some(host) => host
                .parse::<IpAddr>()
                .map_err(|e| ConfigError::invalid("devServer.host", e.to_string()))?,
        };

        let declared = raw.custom_routes.clone().unwrap_or_default();
        let custom_routes = self.apply_hook(declared)?;

        Ok(DevServerConfig {
            host,
            port: raw.port.unwrap_or(DEFAULT_DEV_PORT),
            auto_open: raw.auto_open.unwrap_or(false),
            custom_routes,
        })
    }

    /// Run the middleware hook over the default chain plus declared routes
    /// and return the custom routes in evaluation order.
    fn apply_hook(&self, declared: Vec<RouteSpec>) -> Result<Vec<RouteSpec>> {
        let mut chain = RouteChain::defaults();
        for route in declared {
            chain.push(route);
        }

        let chain = match &self.hook {
            None => chain,
            Some(hook) => {
                let returned = hook.call(chain.clone()).ok_or_else(|| {
                    ConfigError::MiddlewareHook {
                        reason: "hook did not return a handler chain".to_string(),
                    }
                })?;
                if !is_subsequence(chain.entries(), returned.entries()) {
                    return Err(ConfigError::MiddlewareHook {
                        reason: "returned chain must keep every entry it was given, in order"
                            .to_string(),
                    });
                }
                returned
            }
        };

        chain
            .custom_routes()
            .enumerate()
            .map(|(index, route)| self.resolve_route(index, route))
            .collect()
    }

    fn resolve_route(&self, index: usize, route: &RouteSpec) -> Result<RouteSpec> {
        let field = format!("devServer.customRoutes[{index}]");
        if !route.path.starts_with('/') {
            return Err(ConfigError::invalid(
                format!("{field}.path"),
                format!("'{}' must start with '/'", route.path),
            ));
        }
        let method = route.method.to_ascii_uppercase();
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::invalid(
                format!("{field}.method"),
                format!("'{}' is not an HTTP method", route.method),
            ));
        }
        Ok(RouteSpec {
            method,
            path: route.path.clone(),
            file: self.absolute(&route.file),
            content_type: route.content_type.clone(),
        })
    }
}

fn resolve_flags(decl: Option<&FlagsDecl>) -> Result<IndexSet<String>> {
    let flags: Vec<String> = match decl {
        None => Vec::new(),
        Some(FlagsDecl::Line(line)) => line.split_whitespace().map(str::to_string).collect(),
        Some(FlagsDecl::List(list)) => list.iter().map(|f| f.trim().to_string()).collect(),
    };

    if let Some(position) = flags.iter().position(|f| f.is_empty()) {
        return Err(ConfigError::invalid(
            format!("nativeBuildFlags[{position}]"),
            "flags must not be empty",
        ));
    }

    Ok(flags.into_iter().collect())
}

fn resolve_native_tool(raw: Option<&RawNativeTool>) -> Result<NativeToolConfig> {
    let defaults = NativeToolConfig::default();
    let Some(raw) = raw else {
        return Ok(defaults);
    };

    let mode = match raw.mode.as_deref() {
        None => defaults.mode,
        Some(mode) => BuildMode::parse(mode).ok_or_else(|| {
            ConfigError::invalid(
                "nativeTool.mode",
                format!("'{mode}' (expected 'development' or 'release')"),
            )
        })?,
    };

    let out_name = raw.out_name.clone().unwrap_or(defaults.out_name);
    if out_name.is_empty() || out_name.contains(['/', '\\']) {
        return Err(ConfigError::invalid(
            "nativeTool.outName",
            format!("'{out_name}' must be a bare file stem"),
        ));
    }

    Ok(NativeToolConfig {
        program: raw.program.clone().unwrap_or(defaults.program),
        target: raw.target.clone().unwrap_or(defaults.target),
        out_dir: raw.out_dir.clone().unwrap_or(defaults.out_dir),
        out_name,
        mode,
    })
}

/// `outputDir` and the static sources must not nest in either direction.
fn check_output_disjoint(output_dir: &Path, sources: &[StaticSource]) -> Result<()> {
    for (index, source) in sources.iter().enumerate() {
        let field = format!("staticSources[{index}]");
        if source.source_path.starts_with(output_dir) {
            return Err(ConfigError::OutputContainsSource {
                field,
                output: output_dir.to_path_buf(),
                source_dir: source.source_path.clone(),
            });
        }
        if output_dir.starts_with(&source.source_path) {
            return Err(ConfigError::OutputInsideSource {
                field,
                output: output_dir.to_path_buf(),
                source_dir: source.source_path.clone(),
            });
        }
    }
    Ok(())
}

/// Relative, and never climbs above its base.
fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_subsequence<T: PartialEq>(needle: &[T], haystack: &[T]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|item| rest.any(|candidate| candidate == item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsequence_check() {
        assert!(is_subsequence(&[1, 3], &[0, 1, 2, 3]));
        assert!(is_subsequence::<i32>(&[], &[1]));
        assert!(!is_subsequence(&[3, 1], &[1, 2, 3]));
        assert!(!is_subsequence(&[1, 4], &[1, 2, 3]));
    }

    #[test]
    fn plain_relative_paths() {
        assert!(is_plain_relative(Path::new("img/icons")));
        assert!(is_plain_relative(Path::new("./img")));
        assert!(!is_plain_relative(Path::new("../escape")));
        assert!(!is_plain_relative(Path::new("/abs")));
    }

    #[test]
    fn flags_are_deduplicated_in_order() {
        let flags = resolve_flags(Some(&FlagsDecl::Line(
            "--weak-refs --reference-types --weak-refs".into(),
        )))
        .unwrap();
        let flags: Vec<_> = flags.into_iter().collect();
        assert_eq!(flags, vec!["--weak-refs", "--reference-types"]);
    }

    #[test]
    fn empty_flag_in_list_is_rejected() {
        let err = resolve_flags(Some(&FlagsDecl::List(vec!["--dev".into(), " ".into()])))
            .unwrap_err();
        assert_eq!(err.field(), Some("nativeBuildFlags[1]"));
    }
}
