//! Scratch projects for CLI tests.
//!
//! On unix the native compiler is a shell script that writes the expected
//! outputs, logs each run and fails while a `fail` marker file exists.
//! Tests executing it are `#[serial]`: running a script another thread is
//! still writing fails with `ETXTBSY`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use kiln_config::{BuildConfig, ConfigDiscovery, ConfigResolver};
use tempfile::TempDir;

const FAKE_COMPILER: &str = r#"#!/bin/sh
echo run >> .markers/log
if [ -f .markers/fail ]; then
  echo "error[E0308]: mismatched types" >&2
  exit 101
fi
out_dir=pkg
out_name=index
while [ $# -gt 0 ]; do
  case "$1" in
    --out-dir) out_dir="$2"; shift ;;
    --out-name) out_name="$2"; shift ;;
  esac
  shift
done
mkdir -p "$out_dir"
cat src/lib.rs > "$out_dir/${out_name}_bg.wasm"
printf "const url = new URL('%s_bg.wasm', import.meta.url);\nexport default async function init() {}\n" "$out_name" > "$out_dir/${out_name}.js"
"#;

pub struct Project {
    dir: TempDir,
}

impl Project {
    /// A project with sources, static files and a `kiln.toml` that points
    /// at the fake compiler.
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().unwrap(),
        };

        project.write("Cargo.toml", "[package]\nname = \"app\"\nversion = \"0.1.0\"\n");
        project.write("src/lib.rs", "pub fn answer() -> u32 { 42 }\n");
        project.write(
            "js/index.js",
            "import init from \"kiln:native\";\n\ninit();\n",
        );
        project.write("static/favicon.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        project.write(
            "static/index.html",
            "<html><body><script type=\"module\" src=\"index.js\"></script></body></html>",
        );
        fs::create_dir_all(project.root().join(".markers")).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            project.write("tools/fake-wasm-pack", FAKE_COMPILER);
            fs::set_permissions(
                project.root().join("tools/fake-wasm-pack"),
                fs::Permissions::from_mode(0o755),
            )
            .unwrap();
        }

        project.write(
            "kiln.toml",
            r#"entryPoint = "js/index.js"
staticSources = ["static"]
nativeBuildFlags = "--weak-refs"

[nativeTool]
program = "tools/fake-wasm-pack"

[devServer]
port = 0

[[devServer.customRoutes]]
path = "/favicon.ico"
file = "static/favicon.svg"
contentType = "image/svg+xml"
"#,
        );

        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn dist(&self) -> PathBuf {
        self.root().join("dist")
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn set_failing(&self, failing: bool) {
        let marker = self.root().join(".markers/fail");
        if failing {
            fs::write(marker, "").unwrap();
        } else {
            let _ = fs::remove_file(marker);
        }
    }

    pub fn compiler_runs(&self) -> usize {
        fs::read_to_string(self.root().join(".markers/log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    pub fn config(&self) -> BuildConfig {
        let raw = ConfigDiscovery::new(self.root()).load().unwrap();
        ConfigResolver::new(self.root())
            .with_env_lookup(|_| None)
            .resolve(raw)
            .unwrap()
    }
}
