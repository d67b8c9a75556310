//! Development server.
//!
//! - live reload over Server-Sent Events
//! - files served straight from the output directory
//! - custom routes from the configuration, ahead of the built-in handlers
//! - debounced file watching that triggers rebuilds
//! - an error overlay while the last build is failing

pub mod error_overlay;
pub mod middleware;
pub mod server;
pub mod state;
pub mod watcher;

pub use middleware::{
    FileRoute, HandlerChain, LiveReload, RouteHandler, StaticFiles, compose, default_chain,
};
pub use server::DevServer;
pub use state::{BuildStatus, DevServerState, SharedState};
pub use watcher::{FileChange, FileWatcher};

use serde::{Deserialize, Serialize};

/// Path of the SSE endpoint.
pub const EVENTS_PATH: &str = "/__kiln/events";
/// Path of the reload client script.
pub const RELOAD_SCRIPT_PATH: &str = "/__kiln/reload.js";

/// Events pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DevEvent {
    BuildStarted,
    BuildCompleted { duration_ms: u64 },
    BuildFailed { error: String },
    ClientConnected { id: usize },
}
