//! The bundler seam.
//!
//! Kiln does not bundle JavaScript itself. A [`Bundler`] receives the entry
//! point and the already-injected native module and writes the output files.
//! [`PassthroughBundler`] is the built-in implementation: it emits the entry
//! as-is with the native import redirected to the generated loader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BundleError;
use crate::graph::{InjectedModule, LOADER_FILE, NATIVE_SPECIFIER};

/// File name of the build manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

pub struct BundleRequest<'a> {
    pub entry_point: &'a Path,
    pub output_dir: &'a Path,
    pub output_filename: &'a str,
    pub native: &'a InjectedModule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkKind {
    Entry,
    Loader,
    Shim,
    Native,
    Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub kind: ChunkKind,
    pub size: u64,
}

/// Everything a bundler wrote, including the native chunk it was handed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    pub files: Vec<EmittedFile>,
}

impl BundleOutput {
    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files.iter().map(|f| f.path.as_path())
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    entry: &'a str,
    native: ManifestNative<'a>,
    chunks: Vec<ManifestChunk>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestNative<'a> {
    file: &'a str,
    fingerprint: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestChunk {
    file: String,
    kind: ChunkKind,
    size: u64,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    fn name(&self) -> &str;

    /// Write the bundle for `request` into its output directory.
    ///
    /// Implementations must not finalize a manifest that references the
    /// native chunk unless that chunk exists on disk.
    async fn bundle(&self, request: BundleRequest<'_>) -> Result<BundleOutput, BundleError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBundler;

#[async_trait]
impl Bundler for PassthroughBundler {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn bundle(&self, request: BundleRequest<'_>) -> Result<BundleOutput, BundleError> {
        let native = request.native;

        let entry_source = match tokio::fs::read_to_string(request.entry_point).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BundleError::EntryNotFound(request.entry_point.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let entry_source = rewrite_native_imports(&entry_source);

        let mut output = BundleOutput::default();

        let entry_path = request.output_dir.join(request.output_filename);
        write(&mut output, entry_path, ChunkKind::Entry, entry_source.as_bytes()).await?;

        let loader = native.loader();
        write(
            &mut output,
            request.output_dir.join(&loader.file_name),
            ChunkKind::Loader,
            loader.source.as_bytes(),
        )
        .await?;

        let shim = native.shim();
        write(
            &mut output,
            request.output_dir.join(&shim.file_name),
            ChunkKind::Shim,
            shim.source.as_bytes(),
        )
        .await?;

        let binary = native.binary();
        match tokio::fs::metadata(&binary.path).await {
            Ok(meta) if meta.is_file() => output.files.push(EmittedFile {
                path: binary.path.clone(),
                kind: ChunkKind::Native,
                size: meta.len(),
            }),
            _ => return Err(BundleError::MissingChunk(binary.path.clone())),
        }

        let manifest = Manifest {
            entry: request.output_filename,
            native: ManifestNative {
                file: &binary.file_name,
                fingerprint: native.fingerprint().as_hex(),
            },
            chunks: output
                .files
                .iter()
                .map(|f| ManifestChunk {
                    file: relative_name(&f.path, request.output_dir),
                    kind: f.kind,
                    size: f.size,
                })
                .collect(),
        };
        let manifest = serde_json::to_vec_pretty(&manifest).map_err(|e| BundleError::Bundler {
            name: self.name().to_string(),
            message: e.to_string(),
        })?;
        write(
            &mut output,
            request.output_dir.join(MANIFEST_FILE),
            ChunkKind::Manifest,
            &manifest,
        )
        .await?;

        Ok(output)
    }
}

async fn write(
    output: &mut BundleOutput,
    path: PathBuf,
    kind: ChunkKind,
    contents: &[u8],
) -> Result<(), BundleError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, contents).await?;
    output.files.push(EmittedFile {
        path,
        kind,
        size: contents.len() as u64,
    });
    Ok(())
}

/// Point `kiln:native` imports at the generated loader.
fn rewrite_native_imports(source: &str) -> String {
    let replacement = format!("./{LOADER_FILE}");
    source
        .replace(
            &format!("\"{NATIVE_SPECIFIER}\""),
            &format!("\"{replacement}\""),
        )
        .replace(&format!("'{NATIVE_SPECIFIER}'"), &format!("'{replacement}'"))
}

fn relative_name(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
