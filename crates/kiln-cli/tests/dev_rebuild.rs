//! Rebuild behaviour of `kiln dev` against a scripted native compiler.

#![cfg(unix)]

mod common;

use std::fs;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::Request;
use common::Project;
use kiln_cli::commands::dev::rebuild;
use kiln_cli::dev::{DevServerState, compose, default_chain};
use kiln_pipeline::Pipeline;
use serial_test::serial;

async fn get(chain: &kiln_cli::dev::HandlerChain, path: &str) -> String {
    let response = chain
        .dispatch(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await;
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
#[serial]
async fn failed_rebuild_is_reported_without_losing_the_last_build() {
    let project = Project::new();
    let config = project.config();
    let state = Arc::new(DevServerState::new(config.output_dir.clone()));
    let chain = compose(&default_chain(&state), &config.dev_server.custom_routes);
    let pipeline = Pipeline::new(config);
    let (_, mut events) = state.register_client();

    assert!(rebuild(&pipeline, &state).await);
    assert!(state.status().is_success());
    assert!(events.recv().await.unwrap().contains("BuildStarted"));
    assert!(events.recv().await.unwrap().contains("BuildCompleted"));
    let built_entry = fs::read_to_string(project.dist().join("index.js")).unwrap();

    project.write("src/lib.rs", "pub fn answer() -> u32 { \"42\" }\n");
    project.set_failing(true);

    assert!(!rebuild(&pipeline, &state).await);
    assert!(events.recv().await.unwrap().contains("BuildStarted"));
    let failed = events.recv().await.unwrap();
    assert!(failed.contains("BuildFailed"));
    assert!(failed.contains("E0308"));

    let error = state.status().error().map(str::to_owned).unwrap();
    assert!(error.contains("exited with code 101"));

    // The previous output is still on disk and still served
    assert_eq!(
        fs::read_to_string(project.dist().join("index.js")).unwrap(),
        built_entry
    );
    assert_eq!(get(&chain, "/index.js").await, built_entry);
    assert!(get(&chain, "/").await.contains("Build failed"));

    project.set_failing(false);
    project.write("src/lib.rs", "pub fn answer() -> u32 { 42 }\n");
    assert!(rebuild(&pipeline, &state).await);
    assert!(get(&chain, "/").await.contains("<script type=\"module\""));
}

#[tokio::test]
#[serial]
async fn javascript_only_changes_reuse_the_native_artifact() {
    let project = Project::new();
    let config = project.config();
    let state = DevServerState::new(config.output_dir.clone());
    let pipeline = Pipeline::new(config);

    assert!(rebuild(&pipeline, &state).await);
    project.write("js/index.js", "import init from \"kiln:native\";\ninit().then(() => {});\n");
    assert!(rebuild(&pipeline, &state).await);

    assert_eq!(project.compiler_runs(), 1);
    let entry = fs::read_to_string(project.dist().join("index.js")).unwrap();
    assert!(entry.contains("init().then"));
}
