//! Declarative dev-server routes and the middleware registration hook.
//!
//! Older project files registered middleware by mutating the server's
//! handler list in place. Here the hook is a pure function from the default
//! [`RouteChain`] to a new chain, which the resolver validates and reduces to
//! an ordered list of [`RouteSpec`]s.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One custom route: when `method` and `path` match, respond with the
/// contents of `file`, optionally forcing a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteSpec {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RouteSpec {
    /// A `GET` route serving `file` at `path`.
    pub fn get(path: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            method: default_method(),
            path: path.into(),
            file: file.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Handlers the dev server always provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRoute {
    /// SSE endpoint and reload client script
    LiveReload,
    /// Files from the output directory
    StaticFiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEntry {
    Builtin(BuiltinRoute),
    Custom(RouteSpec),
}

/// Ordered handler chain as seen by a middleware hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChain {
    entries: Vec<ChainEntry>,
}

impl RouteChain {
    /// The chain the dev server uses when no middleware is registered.
    pub fn defaults() -> Self {
        Self {
            entries: vec![
                ChainEntry::Builtin(BuiltinRoute::LiveReload),
                ChainEntry::Builtin(BuiltinRoute::StaticFiles),
            ],
        }
    }

    /// Build a chain from explicit entries.
    pub fn from_entries(entries: Vec<ChainEntry>) -> Self {
        Self { entries }
    }

    /// Append a custom route.
    pub fn push(&mut self, route: RouteSpec) {
        self.entries.push(ChainEntry::Custom(route));
    }

    /// Insert a custom route ahead of every other entry.
    pub fn prepend(&mut self, route: RouteSpec) {
        self.entries.insert(0, ChainEntry::Custom(route));
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn builtins(&self) -> impl Iterator<Item = BuiltinRoute> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            ChainEntry::Builtin(b) => Some(*b),
            ChainEntry::Custom(_) => None,
        })
    }

    pub fn custom_routes(&self) -> impl Iterator<Item = &RouteSpec> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            ChainEntry::Custom(route) => Some(route),
            ChainEntry::Builtin(_) => None,
        })
    }
}

type HookFn = dyn Fn(RouteChain) -> Option<RouteChain> + Send + Sync;

/// Programmatic middleware registration.
///
/// Receives the default chain and must hand back an equal or extended one.
/// Returning `None` is reported as a configuration error.
#[derive(Clone)]
pub struct MiddlewareHook(Arc<HookFn>);

impl MiddlewareHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(RouteChain) -> Option<RouteChain> + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    pub fn call(&self, chain: RouteChain) -> Option<RouteChain> {
        (self.0)(chain)
    }
}

impl fmt::Debug for MiddlewareHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MiddlewareHook(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_spec_defaults_to_get() {
        let route: RouteSpec =
            serde_json::from_str(r#"{"path": "/favicon.ico", "file": "static/favicon.svg"}"#)
                .unwrap();
        assert_eq!(route.method, "GET");
        assert_eq!(route.content_type, None);
    }

    #[test]
    fn chain_separates_builtins_and_custom() {
        let mut chain = RouteChain::defaults();
        chain.push(RouteSpec::get("/a", "a.txt"));
        chain.prepend(RouteSpec::get("/b", "b.txt"));

        let builtins: Vec<_> = chain.builtins().collect();
        assert_eq!(
            builtins,
            vec![BuiltinRoute::LiveReload, BuiltinRoute::StaticFiles]
        );

        let custom: Vec<_> = chain.custom_routes().map(|r| r.path.as_str()).collect();
        assert_eq!(custom, vec!["/b", "/a"]);
    }
}
