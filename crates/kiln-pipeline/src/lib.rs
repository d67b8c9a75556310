//! Build orchestration for Kiln.
//!
//! A pass compiles the native crate (or reuses the cached artifact), writes
//! the binary into the output directory, hands the entry to a [`Bundler`] and
//! finally merges the static asset directories around what was generated.
//!
//! ```no_run
//! use kiln_config::{ConfigDiscovery, ConfigResolver};
//! use kiln_pipeline::Pipeline;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let discovery = ConfigDiscovery::new(".");
//! let config = ConfigResolver::new(discovery.root()).resolve(discovery.load()?)?;
//!
//! let report = Pipeline::new(config).run().await?;
//! println!("{} files in {:?}", report.bundle.files.len(), report.duration);
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod bundler;
pub mod cache;
pub mod error;
pub mod graph;
pub mod native;
pub mod pipeline;

pub use assets::{AssetMergePlanner, CopyEntry, CopyPlan, CopyReport};
pub use bundler::{
    BundleOutput, BundleRequest, Bundler, ChunkKind, EmittedFile, MANIFEST_FILE,
    PassthroughBundler,
};
pub use cache::{ArtifactCache, BuildArtifact, CacheStats, Fingerprint};
pub use error::{
    BundleError, Conflict, ConflictError, ConflictKind, NativeBuildError, PipelineError,
};
pub use graph::{InjectedModule, LOADER_FILE, ModuleGraphInjector, NATIVE_SPECIFIER};
pub use native::{NativeBuildInvoker, NativeBuildRequest, NativeBuildResult};
pub use pipeline::{NativeOutcome, PassReport, Pipeline};
