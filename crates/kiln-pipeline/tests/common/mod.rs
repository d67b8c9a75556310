//! Test project with a scripted stand-in for the native compiler.
//!
//! The script understands `--out-dir` and `--out-name`, records every
//! invocation in a log file, writes its pid to the `pid` marker and reacts to
//! marker files:
//!
//! - `fail` present: prints a compiler error to stderr and exits 101
//! - `skip-output` present: exits 0 without writing anything
//!
//! Tests that write and execute the script are `#[serial]`, since executing a
//! file another thread is still writing fails with `ETXTBSY`.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kiln_config::{
    BuildConfig, ConfigResolver, EnvValueDecl, FlagsDecl, RawConfig, RawNativeTool,
    StaticAssetsDecl,
};
use tempfile::TempDir;

const FAKE_COMPILER: &str = r#"#!/bin/sh
echo $$ > "$KILN_TEST_MARKERS/pid"
echo run >> "$KILN_TEST_LOG"
sleep "${KILN_TEST_DELAY:-0}"
if [ -f "$KILN_TEST_MARKERS/fail" ]; then
  echo "error[E0433]: failed to resolve: use of undeclared crate or module" >&2
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
if [ -f "$KILN_TEST_MARKERS/skip-output" ]; then
  exit 0
fi
mkdir -p "$out_dir"
cat src/lib.rs > "$out_dir/${out_name}_bg.wasm"
printf "const url = new URL('%s_bg.wasm', import.meta.url);\nexport default async function init() {}\n" "$out_name" > "$out_dir/${out_name}.js"
"#;

pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let project = Self { dir };

        project.write("Cargo.toml", "[package]\nname = \"app\"\nversion = \"0.1.0\"\n");
        project.write("src/lib.rs", "pub fn answer() -> u32 { 42 }\n");
        project.write(
            "js/index.js",
            "import load from \"kiln:native\";\n\nload().then((native) => console.log(native));\n",
        );
        project.write("static/favicon.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        project.write("static/index.html", "<script type=\"module\" src=\"index.js\"></script>");
        fs::create_dir_all(project.markers()).unwrap();

        let script = project.root().join("tools/fake-wasm-pack");
        project.write("tools/fake-wasm-pack", FAKE_COMPILER);
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn markers(&self) -> PathBuf {
        self.root().join(".markers")
    }

    pub fn set_marker(&self, name: &str, on: bool) {
        let path = self.markers().join(name);
        if on {
            fs::write(path, "").unwrap();
        } else {
            let _ = fs::remove_file(path);
        }
    }

    /// How many times the compiler has been started.
    pub fn compiler_runs(&self) -> usize {
        fs::read_to_string(self.root().join(".markers/log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    /// Pid of the most recently started compiler.
    pub fn compiler_pid(&self) -> Option<u32> {
        fs::read_to_string(self.markers().join("pid"))
            .ok()
            .and_then(|pid| pid.trim().parse().ok())
    }

    /// Whether `pid` is still running. Zombies count as gone.
    #[cfg(target_os = "linux")]
    pub fn process_running(pid: u32) -> bool {
        match fs::read_to_string(format!("/proc/{pid}/stat")) {
            // The state follows the parenthesised command name
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) => false,
        }
    }

    /// Whether `pid` is still running. Zombies count as gone.
    #[cfg(not(target_os = "linux"))]
    pub fn process_running(pid: u32) -> bool {
        std::process::Command::new("ps")
            .args(["-o", "stat=", "-p", &pid.to_string()])
            .output()
            .map(|out| {
                let state = String::from_utf8_lossy(&out.stdout);
                let state = state.trim();
                !state.is_empty() && !state.starts_with('Z')
            })
            .unwrap_or(false)
    }

    pub fn raw(&self) -> RawConfig {
        let literal = |v: &Path| Some(EnvValueDecl::Literal(v.display().to_string()));

        let mut raw = RawConfig {
            entry_point: Some("js/index.js".into()),
            static_sources: Some(StaticAssetsDecl::LegacyArray(vec!["static".into()])),
            native_build_flags: Some(FlagsDecl::Line("--weak-refs --reference-types".into())),
            native_tool: Some(RawNativeTool {
                program: Some(self.root().join("tools/fake-wasm-pack")),
                ..Default::default()
            }),
            ..Default::default()
        };
        raw.native_env
            .insert("KILN_TEST_LOG".into(), literal(&self.markers().join("log")));
        raw.native_env
            .insert("KILN_TEST_MARKERS".into(), literal(&self.markers()));
        raw
    }

    pub fn with_delay(raw: &mut RawConfig, seconds: &str) {
        raw.native_env.insert(
            "KILN_TEST_DELAY".into(),
            Some(EnvValueDecl::Literal(seconds.to_string())),
        );
    }

    pub fn resolve(&self, raw: RawConfig) -> BuildConfig {
        ConfigResolver::new(self.root())
            .with_env_lookup(|_| None)
            .resolve(raw)
            .unwrap()
    }

    pub fn config(&self) -> BuildConfig {
        self.resolve(self.raw())
    }
}
