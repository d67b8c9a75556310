//! One build pass, start to finish.
//!
//! ```text
//! fingerprint ─► cache hit? ──yes──────────────┐
//!                    │ no                      ▼
//!                    └─► native build ─► inject binary ─► bundle ─► plan assets ─► copy
//! ```
//!
//! The binary is written by the injector before the bundler runs. Chunks from
//! earlier builds are pruned only once the new bundle is on disk, so a failed
//! pass leaves the previous loader chain intact. Static assets are planned
//! against everything the bundler wrote, so generated files are never
//! overwritten by static copies.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_config::BuildConfig;
use tracing::Instrument;

use crate::assets::{AssetMergePlanner, CopyPlan, CopyReport};
use crate::bundler::{BundleOutput, BundleRequest, Bundler, PassthroughBundler};
use crate::cache::{
    ArtifactCache, BuildArtifact, Fingerprint, FingerprintInputs, compute_fingerprint,
};
use crate::error::{ConflictError, NativeBuildError, PipelineError};
use crate::graph::ModuleGraphInjector;
use crate::native::{NativeBuildInvoker, NativeBuildRequest};

/// How the native artifact for a pass was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOutcome {
    Cached,
    Built { duration: Duration },
}

/// Summary of a successful pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub fingerprint: Fingerprint,
    pub native: NativeOutcome,
    pub bundle: BundleOutput,
    pub assets: CopyReport,
    pub duration: Duration,
}

pub struct Pipeline {
    config: Arc<BuildConfig>,
    cache: ArtifactCache,
    invoker: NativeBuildInvoker,
    injector: ModuleGraphInjector,
    planner: AssetMergePlanner,
    bundler: Arc<dyn Bundler>,
}

impl Pipeline {
    /// A pipeline using the built-in [`PassthroughBundler`].
    pub fn new(config: BuildConfig) -> Self {
        let invoker = NativeBuildInvoker::new(config.native_tool.clone());
        Self {
            injector: ModuleGraphInjector::new(config.output_dir.clone()),
            planner: AssetMergePlanner::new(config.output_dir.clone()),
            config: Arc::new(config),
            cache: ArtifactCache::new(),
            invoker,
            bundler: Arc::new(PassthroughBundler),
        }
    }

    pub fn with_bundler(mut self, bundler: impl Bundler + 'static) -> Self {
        self.bundler = Arc::new(bundler);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn invoker(&self) -> &NativeBuildInvoker {
        &self.invoker
    }

    /// Fingerprint the current native inputs. Reads the source tree on the
    /// blocking pool.
    pub async fn fingerprint(&self) -> Result<Fingerprint, NativeBuildError> {
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            compute_fingerprint(&FingerprintInputs {
                crate_dir: &config.native_crate_dir,
                flags: &config.native_build_flags,
                env: &config.native_env,
                tool: &config.native_tool,
                watch_dirs: &config.native_watch_dirs,
            })
        })
        .await
        .map_err(|e| NativeBuildError::Fingerprint {
            message: e.to_string(),
        })?
    }

    /// The native artifact for the current inputs, building it only when the
    /// cache has no match.
    pub async fn native_artifact(
        &self,
    ) -> Result<(Arc<BuildArtifact>, NativeOutcome), NativeBuildError> {
        let fingerprint = self.fingerprint().await?;

        if let Some(artifact) = self.cache.lookup(&fingerprint) {
            tracing::debug!(fingerprint = %fingerprint.short(), "native artifact cache hit");
            return Ok((artifact, NativeOutcome::Cached));
        }

        tracing::info!(
            crate_dir = %self.config.native_crate_dir.display(),
            fingerprint = %fingerprint.short(),
            "building native module"
        );

        let artifact = self
            .invoker
            .build(NativeBuildRequest {
                crate_dir: self.config.native_crate_dir.clone(),
                flags: self.config.native_build_flags.clone(),
                env: self.config.native_env.clone(),
                fingerprint,
            })
            .instrument(tracing::info_span!("native_build"))
            .await?;

        self.cache.store(Arc::clone(&artifact));

        let duration = artifact.build_time;
        Ok((artifact, NativeOutcome::Built { duration }))
    }

    /// Plan static copies against a set of generated files.
    pub fn plan_assets(&self, generated: &BTreeSet<PathBuf>) -> Result<CopyPlan, ConflictError> {
        self.planner.plan(&self.config.static_sources, generated)
    }

    /// Run one full pass.
    pub async fn run(&self) -> Result<PassReport, PipelineError> {
        let span = tracing::info_span!(
            "pipeline",
            output = %self.config.output_dir.display()
        );
        self.run_pass().instrument(span).await
    }

    async fn run_pass(&self) -> Result<PassReport, PipelineError> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let (artifact, native) = self.native_artifact().await?;

        let injected = self
            .injector
            .inject(&artifact)
            .instrument(tracing::debug_span!("inject"))
            .await?;

        let bundle = self
            .bundler
            .bundle(BundleRequest {
                entry_point: &self.config.entry_point,
                output_dir: &self.config.output_dir,
                output_filename: &self.config.output_filename,
                native: &injected,
            })
            .instrument(tracing::debug_span!("bundle", bundler = self.bundler.name()))
            .await?;

        let generated: BTreeSet<PathBuf> = bundle.paths().map(PathBuf::from).collect();
        let pruned = self
            .injector
            .prune_stale(&artifact.out_name, &generated)
            .await?;
        if pruned > 0 {
            tracing::debug!(files = pruned, "removed stale native chunks");
        }

        let plan = self.plan_assets(&generated)?;
        let assets = plan
            .execute()
            .instrument(tracing::debug_span!("copy_assets", files = plan.len()))
            .await?;

        let duration = started.elapsed();
        tracing::info!(
            bundler = self.bundler.name(),
            files = bundle.files.len() + assets.copied,
            ?native,
            elapsed_ms = duration.as_millis() as u64,
            "build pass complete"
        );

        Ok(PassReport {
            fingerprint: artifact.fingerprint.clone(),
            native,
            bundle,
            assets,
            duration,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("output_dir", &self.config.output_dir)
            .field("bundler", &self.bundler.name())
            .finish_non_exhaustive()
    }
}
