//! Planning static assets from resolved configuration.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use kiln_config::{ConfigResolver, PatternDecl, RawConfig, StaticAssetsDecl};
use kiln_pipeline::{AssetMergePlanner, CopyPlan};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn plan(root: &Path, assets: StaticAssetsDecl) -> CopyPlan {
    let raw = RawConfig {
        entry_point: Some("js/index.js".into()),
        static_sources: Some(assets),
        ..Default::default()
    };
    let config = ConfigResolver::new(root)
        .with_env_lookup(|_| None)
        .resolve(raw)
        .unwrap();

    AssetMergePlanner::new(config.output_dir.clone())
        .plan(&config.static_sources, &BTreeSet::new())
        .unwrap()
}

#[test]
fn legacy_and_structured_declarations_plan_the_same_copies() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "static/index.html", "<html></html>");
    write(dir.path(), "static/favicon.svg", "<svg/>");
    write(dir.path(), "static/img/logo.png", "png");
    write(dir.path(), "static/fonts/inter/regular.woff2", "woff2");

    let legacy = plan(
        dir.path(),
        StaticAssetsDecl::LegacyArray(vec!["static".into()]),
    );
    let structured = plan(
        dir.path(),
        StaticAssetsDecl::StructuredPatterns(vec![PatternDecl {
            from: "static".into(),
            to: None,
            force: false,
        }]),
    );

    assert_eq!(legacy, structured);
    assert_eq!(legacy.len(), 4);
    assert_eq!(
        legacy.entries()[0].destination,
        dir.path().join("dist/favicon.svg")
    );
}
