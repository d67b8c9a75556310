//! Fingerprint computation using BLAKE3 content-addressed hashing.
//!
//! The fingerprint is a deterministic hash of every input that can change the
//! native artifact, so it changes whenever the artifact would.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use indexmap::IndexSet;
use kiln_config::NativeToolConfig;
use walkdir::WalkDir;

use crate::error::NativeBuildError;

/// Current fingerprint format version. Increment when the hashed layout changes.
const FINGERPRINT_FORMAT_VERSION: u32 = 1;

/// Manifest files at the crate root that affect compilation.
const CRATE_MANIFESTS: &[&str] = &["Cargo.toml", "Cargo.lock", "build.rs"];

/// Content-addressed fingerprint of one native build's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a native build depends on.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInputs<'a> {
    pub crate_dir: &'a Path,
    pub flags: &'a IndexSet<String>,
    pub env: &'a BTreeMap<String, Option<String>>,
    pub tool: &'a NativeToolConfig,
    /// Extra source directories outside `crate_dir/src`
    pub watch_dirs: &'a [PathBuf],
}

/// Compute the fingerprint for a native build.
///
/// The hash covers:
/// 1. Fingerprint format version
/// 2. Crate manifests and every file under `src/` (sorted path + content hash)
/// 3. Files in extra watch directories
/// 4. Build flags, in declaration order
/// 5. Environment entries (sorted by name; unset values hash differently from empty ones)
/// 6. Tool settings
pub fn compute_fingerprint(inputs: &FingerprintInputs<'_>) -> Result<Fingerprint, NativeBuildError> {
    let mut hasher = Hasher::new();

    hasher.update(&FINGERPRINT_FORMAT_VERSION.to_le_bytes());

    for name in CRATE_MANIFESTS {
        let path = inputs.crate_dir.join(name);
        if path.is_file() {
            hash_file(&mut hasher, Path::new(name), &path)?;
        }
    }

    hash_tree(&mut hasher, inputs.crate_dir, &inputs.crate_dir.join("src"))?;
    for dir in inputs.watch_dirs {
        hash_tree(&mut hasher, inputs.crate_dir, dir)?;
    }

    // Flag order is significant to the compiler.
    for flag in inputs.flags {
        hasher.update(b"flag:");
        hasher.update(flag.as_bytes());
        hasher.update(b"\0");
    }

    hash_env(&mut hasher, inputs.env);
    hash_tool(&mut hasher, inputs.tool);

    Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
}

/// Hash all regular files under `dir`, sorted by path. Missing directories
/// contribute nothing.
fn hash_tree(hasher: &mut Hasher, base: &Path, dir: &Path) -> Result<(), NativeBuildError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| NativeBuildError::Fingerprint {
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let label = path.strip_prefix(base).unwrap_or(path);
        hash_file(hasher, label, path)?;
    }
    Ok(())
}

fn hash_file(hasher: &mut Hasher, label: &Path, path: &Path) -> Result<(), NativeBuildError> {
    let content = std::fs::read(path).map_err(|e| NativeBuildError::Fingerprint {
        message: format!("{}: {e}", path.display()),
    })?;

    hasher.update(label.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(blake3::hash(&content).as_bytes());
    Ok(())
}

fn hash_env(hasher: &mut Hasher, env: &BTreeMap<String, Option<String>>) {
    for (name, value) in env {
        hasher.update(b"env:");
        hasher.update(name.as_bytes());
        match value {
            Some(value) => {
                hasher.update(b"=");
                hasher.update(value.as_bytes());
            }
            None => {
                hasher.update(b"!unset");
            }
        }
        hasher.update(b"\0");
    }
}

fn hash_tool(hasher: &mut Hasher, tool: &NativeToolConfig) {
    hasher.update(tool.program.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(tool.target.as_bytes());
    hasher.update(b"\0");
    hasher.update(tool.out_dir.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(tool.out_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(tool.mode.as_flag().as_bytes());
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.') && n.len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::BuildMode;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        flags: IndexSet<String>,
        env: BTreeMap<String, Option<String>>,
        tool: NativeToolConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"app\"\n").unwrap();
            fs::create_dir_all(dir.path().join("src")).unwrap();
            fs::write(dir.path().join("src/lib.rs"), "pub fn one() -> u32 { 1 }").unwrap();
            Self {
                dir,
                flags: IndexSet::new(),
                env: BTreeMap::new(),
                tool: NativeToolConfig::default(),
            }
        }

        fn fingerprint(&self) -> Fingerprint {
            compute_fingerprint(&FingerprintInputs {
                crate_dir: self.dir.path(),
                flags: &self.flags,
                env: &self.env,
                tool: &self.tool,
                watch_dirs: &[],
            })
            .unwrap()
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let fixture = Fixture::new();
        assert_eq!(fixture.fingerprint(), fixture.fingerprint());
    }

    #[test]
    fn source_change_changes_fingerprint() {
        let fixture = Fixture::new();
        let before = fixture.fingerprint();
        fs::write(fixture.dir.path().join("src/lib.rs"), "pub fn one() -> u32 { 2 }").unwrap();
        assert_ne!(before, fixture.fingerprint());
    }

    #[test]
    fn flag_order_is_significant() {
        let mut fixture = Fixture::new();
        fixture.flags = ["--weak-refs", "--reference-types"]
            .into_iter()
            .map(String::from)
            .collect();
        let a = fixture.fingerprint();
        fixture.flags = ["--reference-types", "--weak-refs"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_ne!(a, fixture.fingerprint());
    }

    #[test]
    fn unset_env_differs_from_empty() {
        let mut fixture = Fixture::new();
        fixture.env.insert("RUSTFLAGS".into(), None);
        let unset = fixture.fingerprint();
        fixture.env.insert("RUSTFLAGS".into(), Some(String::new()));
        assert_ne!(unset, fixture.fingerprint());
    }

    #[test]
    fn build_mode_changes_fingerprint() {
        let mut fixture = Fixture::new();
        let dev = fixture.fingerprint();
        fixture.tool.mode = BuildMode::Release;
        assert_ne!(dev, fixture.fingerprint());
    }

    #[test]
    fn output_and_target_dirs_are_not_hashed() {
        let fixture = Fixture::new();
        let before = fixture.fingerprint();
        fs::create_dir_all(fixture.dir.path().join("target/debug")).unwrap();
        fs::write(fixture.dir.path().join("target/debug/junk"), "x").unwrap();
        fs::create_dir_all(fixture.dir.path().join("pkg")).unwrap();
        fs::write(fixture.dir.path().join("pkg/index.js"), "x").unwrap();
        assert_eq!(before, fixture.fingerprint());
    }

    #[test]
    fn short_form_is_a_prefix() {
        let fp = Fingerprint::from_hex("0123456789abcdef");
        assert_eq!(fp.short(), "01234567");
    }
}
