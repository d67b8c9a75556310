//! Single-flight native builds.
//!
//! At most one compiler process runs per crate directory. A request that
//! arrives while a build of the same crate is in flight waits for that build
//! and receives the same result, success or failure.
//!
//! In-flight builds are tracked through weak handles: once every caller has
//! dropped its future the build future is dropped too, which kills the
//! compiler process, and the next request starts a fresh build.

mod compiler;

pub use compiler::NativeCompiler;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use indexmap::IndexSet;
use kiln_config::NativeToolConfig;
use parking_lot::Mutex;

use crate::cache::{BuildArtifact, Fingerprint};
use crate::error::NativeBuildError;

pub type NativeBuildResult = Result<Arc<BuildArtifact>, NativeBuildError>;

type BuildFuture = Shared<BoxFuture<'static, NativeBuildResult>>;

/// One native build request.
#[derive(Debug, Clone)]
pub struct NativeBuildRequest {
    pub crate_dir: PathBuf,
    pub flags: IndexSet<String>,
    pub env: BTreeMap<String, Option<String>>,
    /// Fingerprint of the inputs, stamped onto the resulting artifact
    pub fingerprint: Fingerprint,
}

pub struct NativeBuildInvoker {
    compiler: NativeCompiler,
    in_flight: Mutex<HashMap<PathBuf, WeakShared<BoxFuture<'static, NativeBuildResult>>>>,
    spawned: Arc<AtomicUsize>,
}

impl NativeBuildInvoker {
    pub fn new(tool: NativeToolConfig) -> Self {
        Self {
            compiler: NativeCompiler::new(tool),
            in_flight: Mutex::new(HashMap::new()),
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build the crate, joining an in-flight build of the same directory if
    /// there is one.
    pub async fn build(&self, request: NativeBuildRequest) -> NativeBuildResult {
        let crate_dir = request.crate_dir.clone();
        let build = self.join_or_start(request);
        let result = build.clone().await;
        self.release(&crate_dir, &build);
        result
    }

    /// Number of compiler processes started over this invoker's lifetime.
    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Whether a build for `crate_dir` is currently running.
    pub fn is_building(&self, crate_dir: &Path) -> bool {
        let in_flight = self.in_flight.lock();
        in_flight
            .get(crate_dir)
            .and_then(WeakShared::upgrade)
            .is_some_and(|build| build.peek().is_none())
    }

    fn join_or_start(&self, request: NativeBuildRequest) -> BuildFuture {
        let mut in_flight = self.in_flight.lock();

        if let Some(existing) = in_flight.get(&request.crate_dir).and_then(WeakShared::upgrade) {
            if existing.peek().is_none() {
                tracing::debug!(
                    crate_dir = %request.crate_dir.display(),
                    "joining in-flight native build"
                );
                return existing;
            }
        }

        let compiler = self.compiler.clone();
        let spawned = Arc::clone(&self.spawned);
        let crate_dir = request.crate_dir.clone();

        let build: BuildFuture = async move {
            spawned.fetch_add(1, Ordering::SeqCst);
            let artifact = compiler
                .run(
                    &request.crate_dir,
                    &request.flags,
                    &request.env,
                    request.fingerprint,
                )
                .await?;
            Ok(Arc::new(artifact))
        }
        .boxed()
        .shared();

        // A fresh, unpolled future always has a weak handle
        if let Some(weak) = build.downgrade() {
            in_flight.insert(crate_dir, weak);
        }
        build
    }

    /// Drop the bookkeeping entry once the build it refers to is finished.
    fn release(&self, crate_dir: &Path, build: &BuildFuture) {
        let mut in_flight = self.in_flight.lock();
        let finished = match in_flight.get(crate_dir).and_then(WeakShared::upgrade) {
            Some(current) => current.ptr_eq(build),
            None => true,
        };
        if finished {
            in_flight.remove(crate_dir);
        }
    }
}

impl std::fmt::Debug for NativeBuildInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBuildInvoker")
            .field("compiler", &self.compiler)
            .field("spawned", &self.spawn_count())
            .finish_non_exhaustive()
    }
}
