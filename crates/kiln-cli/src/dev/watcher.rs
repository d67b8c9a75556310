//! File watching for `kiln dev`.
//!
//! Watches the project root (and any extra native watch directories)
//! recursively and forwards relevant changes over a channel. Build outputs
//! are ignored so a rebuild never triggers itself.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{CliError, Result};

/// Directory names ignored wherever they appear.
const IGNORED_NAMES: &[&str] = &["node_modules", "target"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch every directory in `roots`, skipping anything under `ignored`.
    ///
    /// Repeated events for the same path inside `debounce` are dropped.
    pub fn new(
        roots: Vec<PathBuf>,
        ignored: Vec<PathBuf>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if let Some(missing) = roots.iter().find(|r| !r.is_dir()) {
            return Err(CliError::FileNotFound(missing.clone()));
        }

        let (tx, rx) = mpsc::channel(100);
        let filter = ChangeFilter {
            roots: roots.clone(),
            ignored,
        };
        let mut last_event: Option<(PathBuf, Instant)> = None;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "file watcher error");
                    return;
                }
            };

            for path in &event.paths {
                if filter.should_ignore(path) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // The receiver is gone once the dev loop has stopped
                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })?;

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        Ok((
            Self {
                _watcher: watcher,
                roots,
            },
            rx,
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Which paths are worth a rebuild.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    pub roots: Vec<PathBuf>,
    pub ignored: Vec<PathBuf>,
}

impl ChangeFilter {
    pub fn should_ignore(&self, path: &Path) -> bool {
        let Some(relative) = self
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
        else {
            return true;
        };

        if self.ignored.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }

        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            (name.starts_with('.') && name != "." && name != "..")
                || IGNORED_NAMES.iter().any(|ignored| name == *ignored)
        }) || relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with('~'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ChangeFilter {
        ChangeFilter {
            roots: vec![PathBuf::from("/project"), PathBuf::from("/shared/proto")],
            ignored: vec![PathBuf::from("/project/dist"), PathBuf::from("/project/native/pkg")],
        }
    }

    #[test]
    fn sources_are_watched() {
        let filter = filter();
        assert!(!filter.should_ignore(Path::new("/project/native/src/lib.rs")));
        assert!(!filter.should_ignore(Path::new("/project/js/index.js")));
        assert!(!filter.should_ignore(Path::new("/shared/proto/messages.proto")));
    }

    #[test]
    fn build_outputs_are_ignored() {
        let filter = filter();
        assert!(filter.should_ignore(Path::new("/project/dist/index.js")));
        assert!(filter.should_ignore(Path::new("/project/native/pkg/index_bg.wasm")));
        assert!(filter.should_ignore(Path::new("/project/native/target/debug/build.log")));
        assert!(filter.should_ignore(Path::new("/project/node_modules/pkg/index.js")));
    }

    #[test]
    fn hidden_backup_and_outside_files_are_ignored() {
        let filter = filter();
        assert!(filter.should_ignore(Path::new("/project/.git/index")));
        assert!(filter.should_ignore(Path::new("/project/src/.lib.rs.swp")));
        assert!(filter.should_ignore(Path::new("/project/src/lib.rs~")));
        assert!(filter.should_ignore(Path::new("/elsewhere/lib.rs")));
    }

    #[test]
    fn change_path() {
        let path = PathBuf::from("/project/src/lib.rs");
        assert_eq!(FileChange::Removed(path.clone()).path(), path.as_path());
    }
}
