//! In-memory cache for the native artifact.
//!
//! The native build is the slow step of every pass, so its result is kept in
//! memory keyed by a [`Fingerprint`] of all its inputs. A pass whose
//! fingerprint matches the cached one skips the compiler entirely.
//!
//! The cache holds one entry. A new fingerprint displaces the old artifact,
//! so there is never more than one live artifact per fingerprint.

mod key;

pub use key::{Fingerprint, FingerprintInputs, compute_fingerprint};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

/// Output of one successful native build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub fingerprint: Fingerprint,
    /// Stem the compiler used for its files (`<out_name>_bg.wasm`, `<out_name>.js`)
    pub out_name: String,
    /// Compiled binary module
    pub binary: Vec<u8>,
    /// JavaScript loader emitted next to the binary
    pub shim: String,
    pub build_time: Duration,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct ArtifactCache {
    slot: RwLock<Option<Arc<BuildArtifact>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached artifact, if its fingerprint matches.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<BuildArtifact>> {
        let slot = self.slot.read();
        match slot.as_ref() {
            Some(artifact) if artifact.fingerprint == *fingerprint => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(artifact))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an artifact under its fingerprint, returning whatever it displaced.
    pub fn store(&self, artifact: Arc<BuildArtifact>) -> Option<Arc<BuildArtifact>> {
        let fingerprint = artifact.fingerprint.clone();
        let previous = self.slot.write().replace(artifact);
        if let Some(previous) = &previous {
            if previous.fingerprint != fingerprint {
                tracing::debug!(fingerprint = %previous.fingerprint.short(), "evicted native artifact");
            }
        }
        previous
    }

    /// Most recently stored artifact, regardless of fingerprint.
    ///
    /// After a failed rebuild this is what the dev server keeps serving.
    pub fn current(&self) -> Option<Arc<BuildArtifact>> {
        self.slot.read().clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(hex: &str) -> Arc<BuildArtifact> {
        Arc::new(BuildArtifact {
            fingerprint: Fingerprint::from_hex(hex),
            out_name: "index".into(),
            binary: b"\0asm".to_vec(),
            shim: "export default function init() {}".into(),
            build_time: Duration::from_millis(5),
        })
    }

    #[test]
    fn lookup_on_empty_cache_misses() {
        let cache = ArtifactCache::new();
        assert!(cache.lookup(&Fingerprint::from_hex("aa")).is_none());
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 1 });
    }

    #[test]
    fn lookup_matches_only_the_stored_fingerprint() {
        let cache = ArtifactCache::new();
        cache.store(artifact("aa"));

        assert!(cache.lookup(&Fingerprint::from_hex("aa")).is_some());
        assert!(cache.lookup(&Fingerprint::from_hex("bb")).is_none());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn store_displaces_previous_artifact() {
        let cache = ArtifactCache::new();
        assert!(cache.store(artifact("aa")).is_none());

        let displaced = cache.store(artifact("bb")).unwrap();
        assert_eq!(displaced.fingerprint.as_hex(), "aa");
        assert!(cache.lookup(&Fingerprint::from_hex("aa")).is_none());
        assert_eq!(cache.current().unwrap().fingerprint.as_hex(), "bb");
    }
}
