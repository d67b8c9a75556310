//! Shared state for the development server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::dev::DevEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    NotStarted,
    InProgress { started_at: Instant },
    Success { duration_ms: u64 },
    Failed { error: String },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    pub fn is_not_started(&self) -> bool {
        matches!(self, BuildStatus::NotStarted)
    }

    /// The failure message, if the last build failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Connected SSE clients by id.
pub type ClientRegistry = RwLock<HashMap<usize, mpsc::Sender<String>>>;

/// State shared between request handlers and the rebuild loop.
///
/// A failed build only changes the status; the output directory keeps the
/// last good build, which stays servable.
pub struct DevServerState {
    status: RwLock<BuildStatus>,
    clients: ClientRegistry,
    next_client_id: AtomicUsize,
    out_dir: PathBuf,
}

impl DevServerState {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            status: RwLock::new(BuildStatus::NotStarted),
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicUsize::new(0),
            out_dir: out_dir.into(),
        }
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
    }

    pub fn complete_build(&self, duration_ms: u64) {
        *self.status.write() = BuildStatus::Success { duration_ms };
    }

    pub fn fail_build(&self, error: String) {
        *self.status.write() = BuildStatus::Failed { error };
    }

    pub fn status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Register a new SSE client and return its id and event receiver.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Send an event to every client, dropping the ones that went away.
    pub async fn broadcast(&self, event: &DevEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize dev event");
                return;
            }
        };

        // Clone the senders so the lock is not held across awaits
        let clients: Vec<_> = self
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut gone = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                gone.push(id);
            }
        }

        for id in gone {
            tracing::debug!(client = id, "dropping disconnected client");
            self.unregister_client(id);
        }
    }
}

pub type SharedState = Arc<DevServerState>;
