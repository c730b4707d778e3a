//! Build verification scenarios driven by the mock runner.

use std::sync::Arc;

use forge_core::{BuildStage, ProjectTree, StageStatus};
use forge_runner::{BuildVerifier, MockResponse, MockRunner, VerifierConfig};

fn pwa_tree() -> ProjectTree {
    ProjectTree::from_files([
        ("package.json", r#"{"name":"app","scripts":{"dev":"vite","build":"vite build"}}"#),
        ("pnpm-lock.yaml", "lockfileVersion: '6.0'\n"),
        ("index.html", "<html></html>"),
    ])
}

#[tokio::test]
async fn test_install_failure_stops_the_pipeline() {
    let runner = MockRunner::new().respond_to(
        "install",
        MockResponse::failure(1, "ERR_PNPM_FETCH_404  GET https://registry.npmjs.org/not-a-pkg: Not Found - 404")
            .with_delay(40),
    );
    let verifier = BuildVerifier::new(Arc::new(runner.clone()), VerifierConfig::default()).unwrap();

    let result = verifier.verify(&pwa_tree(), None).await.unwrap();

    assert!(!result.install_success);
    assert!(!result.build_success);
    assert!(!result.dev_server_success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("install failed (exit 1): ERR_PNPM_FETCH_404"));

    // Only the install command ran, and the time is the install's.
    assert_eq!(runner.commands(), vec!["pnpm install"]);
    for stage in [BuildStage::Build, BuildStage::DevServer] {
        let report = result.stage(stage).unwrap();
        assert_eq!(report.status, StageStatus::Skipped);
        assert_eq!(report.duration_ms, 0);
    }
    let install = result.stage(BuildStage::Install).unwrap();
    assert!(install.duration_ms >= 40);
    assert!(result.time_taken_ms >= install.duration_ms);
    assert_eq!(install.exit_code, Some(1));
}

#[tokio::test]
async fn test_result_serializes_with_camel_case_stages() {
    let runner = MockRunner::new();
    let verifier = BuildVerifier::new(Arc::new(runner), VerifierConfig::default()).unwrap();

    let result = verifier.verify(&pwa_tree(), None).await.unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["installSuccess"], true);
    assert_eq!(json["devServerSuccess"], true);
    assert_eq!(json["stages"][2]["stage"], "dev-server");
    assert_eq!(json["stages"][0]["status"], "passed");
}
