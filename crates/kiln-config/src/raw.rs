//! Raw, pre-normalisation configuration shapes.
//!
//! Configuration files written against older versions of the tool use
//! different shapes for the same concept. Each of those variants is modelled
//! here as a tagged union and collapsed exactly once by
//! [`ConfigResolver`](crate::ConfigResolver); nothing downstream ever sees a
//! raw shape.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routes::RouteSpec;

/// Configuration as read from disk, before defaults and validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
    /// Application entry module (`entry` in older files)
    #[serde(default, alias = "entry", skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,

    /// Nested `output: { path, filename }` shape used by the oldest files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RawOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_sources: Option<StaticAssetsDecl>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_crate_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_build_flags: Option<FlagsDecl>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub native_env: BTreeMap<String, Option<EnvValueDecl>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_tool: Option<RawNativeTool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native_watch_dirs: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_server: Option<RawDevServer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// The two historical ways of declaring static asset directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticAssetsDecl {
    /// `staticSources = ["static", "public"]`
    LegacyArray(Vec<String>),
    /// `staticSources = [{ from = "static" }, { from = "icons", to = "img", force = true }]`
    StructuredPatterns(Vec<PatternDecl>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatternDecl {
    pub from: String,
    /// Destination prefix inside the output directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Let this source overwrite files copied by earlier sources
    #[serde(default)]
    pub force: bool,
}

/// Native build flags, either `"--weak-refs --reference-types"` or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagsDecl {
    Line(String),
    List(Vec<String>),
}

/// A `nativeEnv` value: a literal, or a lookup in the process environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValueDecl {
    Literal(String),
    FromEnv {
        #[serde(rename = "fromEnv")]
        from_env: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawNativeTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawDevServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, alias = "open", skip_serializing_if = "Option::is_none")]
    pub auto_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_routes: Option<Vec<RouteSpec>>,
}
