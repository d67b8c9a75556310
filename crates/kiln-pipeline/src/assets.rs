//! Static asset merging.
//!
//! Every file under each static source maps onto one destination in the
//! output directory. [`AssetMergePlanner`] decides, before anything is copied,
//! which source wins each destination:
//!
//! - one claimant: it is copied
//! - several claimants: the later source wins only if it declares
//!   [`OverwritePolicy::Override`]; otherwise the collision is reported
//! - a destination the build itself generates is never overwritten, whatever
//!   the policy
//!
//! All collisions are collected and reported together in one [`ConflictError`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use kiln_config::{OverwritePolicy, StaticSource};
use path_clean::PathClean;
use walkdir::WalkDir;

use crate::error::{Conflict, ConflictError, ConflictKind};

/// One file copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Index of the static source that contributed this file
    pub origin: usize,
}

/// Resolved copy operations, free of collisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    output_dir: PathBuf,
    entries: Vec<CopyEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub bytes: u64,
}

impl CopyPlan {
    pub fn entries(&self) -> &[CopyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every planned file into the output directory.
    pub async fn execute(&self) -> std::io::Result<CopyReport> {
        let mut report = CopyReport::default();

        for entry in &self.entries {
            if !entry.destination.starts_with(&self.output_dir) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "refusing to copy outside the output directory: {}",
                        entry.destination.display()
                    ),
                ));
            }
            if let Some(parent) = entry.destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            report.bytes += tokio::fs::copy(&entry.source, &entry.destination).await?;
            report.copied += 1;
        }

        tracing::debug!(files = report.copied, bytes = report.bytes, "copied static assets");
        Ok(report)
    }
}

/// Plans static asset copies for one output directory.
#[derive(Debug, Clone)]
pub struct AssetMergePlanner {
    output_dir: PathBuf,
}

impl AssetMergePlanner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir: PathBuf = output_dir.into();
        Self {
            output_dir: output_dir.clean(),
        }
    }

    /// Resolve `sources` into a copy plan.
    ///
    /// `generated` holds the files the build writes itself (bundle, chunks,
    /// manifest). Any static file landing on one of them is a conflict.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] listing every contested destination.
    pub fn plan(
        &self,
        sources: &[StaticSource],
        generated: &BTreeSet<PathBuf>,
    ) -> Result<CopyPlan, ConflictError> {
        let generated: BTreeSet<PathBuf> = generated.iter().map(|p| p.clean()).collect();

        let mut claimed: IndexMap<PathBuf, CopyEntry> = IndexMap::new();
        let mut conflicts: BTreeMap<PathBuf, ConflictKind> = BTreeMap::new();

        for (origin, source) in sources.iter().enumerate() {
            for (file, relative) in files_of(&source.source_path, &self.output_dir) {
                let destination = self
                    .output_dir
                    .join(&source.dest_prefix)
                    .join(&relative)
                    .clean();

                if generated.contains(&destination) {
                    conflicts
                        .entry(destination)
                        .or_insert(ConflictKind::Generated { file });
                    continue;
                }

                let entry = CopyEntry {
                    source: file,
                    destination: destination.clone(),
                    origin,
                };

                match claimed.get(&destination) {
                    None => {
                        claimed.insert(destination, entry);
                    }
                    Some(_) if source.overwrite == OverwritePolicy::Override => {
                        // Last registered wins, and is copied last
                        claimed.shift_remove(&destination);
                        claimed.insert(destination, entry);
                    }
                    Some(existing) => {
                        let existing = existing.source.clone();
                        match conflicts.entry(destination).or_insert_with(|| {
                            ConflictKind::StaticSources {
                                files: vec![existing],
                            }
                        }) {
                            ConflictKind::StaticSources { files } => files.push(entry.source),
                            ConflictKind::Generated { .. } => {}
                        }
                    }
                }
            }
        }

        if !conflicts.is_empty() {
            return Err(ConflictError {
                conflicts: conflicts
                    .into_iter()
                    .map(|(destination, kind)| Conflict { destination, kind })
                    .collect(),
            });
        }

        Ok(CopyPlan {
            output_dir: self.output_dir.clone(),
            entries: claimed.into_values().collect(),
        })
    }
}

/// Regular files under `source`, sorted, with their path relative to it.
///
/// A file source contributes itself under its own name. A missing source
/// contributes nothing. Nothing under `output_dir` is ever a source file.
fn files_of(source: &Path, output_dir: &Path) -> Vec<(PathBuf, PathBuf)> {
    if source.is_file() {
        return source
            .file_name()
            .map(|name| vec![(source.to_path_buf(), PathBuf::from(name))])
            .unwrap_or_default();
    }
    if !source.is_dir() {
        tracing::warn!(source = %source.display(), "static source does not exist, skipping");
        return Vec::new();
    }

    WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != output_dir)
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable static entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(source).ok()?.to_path_buf();
            Some((entry.into_path(), relative))
        })
        .collect()
}
