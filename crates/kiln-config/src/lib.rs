//! Configuration for the Kiln build coordinator.
//!
//! Configuration files have changed shape over time. This crate reads every
//! historical shape ([`raw`]), normalises it once ([`ConfigResolver`]) and
//! hands the rest of the workspace a single [`BuildConfig`].

pub mod discovery;
pub mod error;
pub mod model;
pub mod raw;
pub mod resolve;
pub mod routes;

pub use discovery::{ConfigDiscovery, ConfigSource, CONFIG_FILES};
pub use error::{ConfigError, Result};
pub use model::*;
pub use raw::*;
pub use resolve::ConfigResolver;
pub use routes::{BuiltinRoute, ChainEntry, MiddlewareHook, RouteChain, RouteSpec};
