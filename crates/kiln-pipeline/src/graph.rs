//! Native module injection.
//!
//! The compiled binary is exposed to the JavaScript entry as an async module
//! under the `kiln:native` specifier. Importing it yields a loader whose
//! default export resolves once the binary is fetched and instantiated, so the
//! binary lands in its own chunk and is only downloaded on first use.
//!
//! [`ModuleGraphInjector::inject`] writes the content-hashed binary into the
//! output directory before it returns. An [`InjectedModule`] can only be
//! obtained that way, which is what lets the bundler rely on the binary being
//! on disk when it writes a manifest that references it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::cache::{BuildArtifact, Fingerprint};
use crate::error::BundleError;

/// Import specifier the entry uses for the native module.
pub const NATIVE_SPECIFIER: &str = "kiln:native";

/// File name of the generated loader module.
pub const LOADER_FILE: &str = "kiln-native.js";

const HASH_LEN: usize = 16;

/// The binary chunk as written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeChunk {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub content_hash: String,
}

/// A generated JavaScript file the bundler still has to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk {
    pub file_name: String,
    pub source: String,
}

/// Native module wired into the module graph.
#[derive(Debug, Clone)]
pub struct InjectedModule {
    fingerprint: Fingerprint,
    binary: NativeChunk,
    shim: ScriptChunk,
    loader: ScriptChunk,
}

impl InjectedModule {
    pub fn specifier(&self) -> &'static str {
        NATIVE_SPECIFIER
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Binary chunk, already written.
    pub fn binary(&self) -> &NativeChunk {
        &self.binary
    }

    /// Compiler-generated glue, rewritten to load the hashed binary.
    pub fn shim(&self) -> &ScriptChunk {
        &self.shim
    }

    /// Async module the entry's `kiln:native` import resolves to.
    pub fn loader(&self) -> &ScriptChunk {
        &self.loader
    }
}

#[derive(Debug, Clone)]
pub struct ModuleGraphInjector {
    output_dir: PathBuf,
}

impl ModuleGraphInjector {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write the artifact's binary and prepare the scripts that load it.
    pub async fn inject(&self, artifact: &BuildArtifact) -> Result<InjectedModule, BundleError> {
        let out_name = &artifact.out_name;

        let binary_hash = short_hash(&artifact.binary);
        let binary_name = format!("{out_name}.{binary_hash}.wasm");
        let binary_path = self.output_dir.join(&binary_name);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let mut file = tokio::fs::File::create(&binary_path).await?;
        file.write_all(&artifact.binary).await?;
        file.sync_all().await?;
        drop(file);

        let shim_source = artifact
            .shim
            .replace(&format!("{out_name}_bg.wasm"), &binary_name);
        let shim_name = format!("{out_name}.{}.js", short_hash(shim_source.as_bytes()));

        let loader = ScriptChunk {
            file_name: LOADER_FILE.to_string(),
            source: loader_source(&shim_name),
        };

        tracing::debug!(
            chunk = %binary_name,
            bytes = artifact.binary.len(),
            "native chunk written"
        );

        Ok(InjectedModule {
            fingerprint: artifact.fingerprint.clone(),
            binary: NativeChunk {
                file_name: binary_name,
                path: binary_path,
                size: artifact.binary.len() as u64,
                content_hash: binary_hash,
            },
            shim: ScriptChunk {
                file_name: shim_name,
                source: shim_source,
            },
            loader,
        })
    }

    /// Remove hashed chunks of `out_name` left over from earlier builds.
    ///
    /// Only call this once a bundle has been written: until then the loader
    /// on disk still imports the previous chunks. Anything in `keep` stays.
    pub async fn prune_stale(
        &self,
        out_name: &str,
        keep: &BTreeSet<PathBuf>,
    ) -> std::io::Result<usize> {
        let prefix = format!("{out_name}.");
        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !keep.contains(&path) && name.starts_with(&prefix) && is_hashed(name, &prefix) {
                tracing::trace!(file = %name, "removing stale native chunk");
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// `<prefix><hash>.wasm` or `<prefix><hash>.js` with a hash of the expected shape.
fn is_hashed(name: &str, prefix: &str) -> bool {
    let rest = &name[prefix.len()..];
    let Some((hash, ext)) = rest.split_once('.') else {
        return false;
    };
    matches!(ext, "wasm" | "js")
        && hash.len() == HASH_LEN
        && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

fn short_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex()[..HASH_LEN].to_string()
}

fn loader_source(shim_file: &str) -> String {
    format!(
        r#"// Generated by kiln. Instantiates the native module on first use.
let ready;

export default function load() {{
  if (!ready) {{
    ready = import("./{shim_file}").then(async (native) => {{
      await native.default();
      return native;
    }});
  }}
  return ready;
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn artifact(binary: &[u8]) -> BuildArtifact {
        BuildArtifact {
            fingerprint: Fingerprint::from_hex("feed"),
            out_name: "index".into(),
            binary: binary.to_vec(),
            shim: "const url = new URL('index_bg.wasm', import.meta.url);".into(),
            build_time: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn binary_is_on_disk_when_inject_returns() {
        let dir = TempDir::new().unwrap();
        let injector = ModuleGraphInjector::new(dir.path());

        let module = injector.inject(&artifact(b"\0asm-one")).await.unwrap();

        let written = std::fs::read(&module.binary().path).unwrap();
        assert_eq!(written, b"\0asm-one");
        assert_eq!(module.binary().size, 8);
        assert_eq!(module.specifier(), "kiln:native");
    }

    #[tokio::test]
    async fn shim_points_at_hashed_binary() {
        let dir = TempDir::new().unwrap();
        let injector = ModuleGraphInjector::new(dir.path());

        let module = injector.inject(&artifact(b"\0asm")).await.unwrap();

        assert!(module.shim().source.contains(&module.binary().file_name));
        assert!(!module.shim().source.contains("index_bg.wasm"));
        assert!(module.loader().source.contains(&module.shim().file_name));
    }

    #[tokio::test]
    async fn injecting_leaves_previous_chunks_until_pruned() {
        let dir = TempDir::new().unwrap();
        let injector = ModuleGraphInjector::new(dir.path());

        let first = injector.inject(&artifact(b"\0asm-one")).await.unwrap();
        let second = injector.inject(&artifact(b"\0asm-two")).await.unwrap();
        assert_ne!(first.binary().file_name, second.binary().file_name);
        assert!(first.binary().path.exists());

        let shim = dir.path().join(&second.shim().file_name);
        std::fs::write(&shim, &second.shim().source).unwrap();
        std::fs::write(dir.path().join("index.js"), "entry").unwrap();
        let keep = BTreeSet::from([second.binary().path.clone(), shim.clone()]);

        let removed = injector.prune_stale("index", &keep).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!first.binary().path.exists());
        assert!(second.binary().path.exists());
        assert!(shim.exists());
        assert!(dir.path().join("index.js").exists());
    }

    #[test]
    fn only_hashed_names_are_stale() {
        assert!(is_hashed("index.0123456789abcdef.wasm", "index."));
        assert!(!is_hashed("index.js", "index."));
        assert!(!is_hashed("index.d.ts", "index."));
    }
}
