//! Pipeline tests: the testable properties of the run graph and its execution

use axoasset::LocalAsset;
use shipwright_schema::{RunOutcome, TargetStatus};
use temp_dir::TempDir;

use super::mock::*;
use crate::artifacts::ArtifactStore;
use crate::config::FailurePolicy;
use crate::errors::ShipError;
use crate::release::ReleaseHost;
use crate::tasks::{gather_work, StepKind};
use crate::{execute_run, package, RunPlan};

#[test]
fn levels_put_packaging_strictly_after_builds_and_release() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&utf8_temp(&tmp), matrix_three(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();

    let levels = graph.levels();
    assert_eq!(levels.len(), 2);
    // first level: all the builds plus the release record, mutually unordered
    assert_eq!(levels[0].len(), 4);
    assert!(levels[0]
        .iter()
        .all(|&idx| !matches!(graph.step(idx).kind, StepKind::Package(_))));
    // second level: one packaging step per target
    assert_eq!(levels[1].len(), 3);
    assert!(levels[1]
        .iter()
        .all(|&idx| matches!(graph.step(idx).kind, StepKind::Package(_))));
}

#[test]
fn packaging_count_equals_successful_build_count() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(
        &utf8_temp(&tmp),
        matrix_three(),
        "v1.2.3",
        vec!["armv6".to_owned()],
    );
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::new();

    let report = execute_run(&graph, &store, &host).unwrap();

    // two successful builds -> exactly two packaging invocations, no more no fewer
    assert_eq!(store.len(), 2);
    assert_eq!(host.uploads.lock().unwrap().len(), 2);
    assert_eq!(report.outcome, RunOutcome::Partial);
    assert!(report.release_created);

    // the failed target is reported failed, not silently dropped
    let armv6 = report.targets.iter().find(|t| t.id == "armv6").unwrap();
    assert_eq!(armv6.status, TargetStatus::BuildFailed);
    assert!(armv6.reason.as_deref().unwrap().contains("simulated"));
    assert!(armv6.asset_name.is_none());

    // the siblings were unaffected
    for id in ["x86_64", "x86_64-windows"] {
        let target = report.targets.iter().find(|t| t.id == id).unwrap();
        assert_eq!(target.status, TargetStatus::Packaged);
    }
}

#[test]
fn release_creation_failure_means_zero_packaging() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&utf8_temp(&tmp), matrix_three(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::failing_create();

    let report = execute_run(&graph, &store, &host).unwrap();

    // the builds themselves were fine...
    assert_eq!(store.len(), 3);
    // ...but nothing was packaged or uploaded
    assert!(host.uploads.lock().unwrap().is_empty());
    assert_eq!(report.outcome, RunOutcome::Aborted);
    assert!(!report.release_created);
    for target in &report.targets {
        assert_eq!(target.status, TargetStatus::Skipped);
        assert!(target
            .reason
            .as_deref()
            .unwrap()
            .contains("create-release"));
    }
}

#[test]
fn fail_fast_policy_stops_all_packaging() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(
        &utf8_temp(&tmp),
        matrix_three(),
        "v1.2.3",
        vec!["armv6".to_owned()],
    );
    cfg.policy = FailurePolicy::FailFast;
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::new();

    let report = execute_run(&graph, &store, &host).unwrap();

    assert!(host.uploads.lock().unwrap().is_empty());
    assert_eq!(report.outcome, RunOutcome::Aborted);
    let skipped: Vec<_> = report
        .targets
        .iter()
        .filter(|t| t.status == TargetStatus::Skipped)
        .collect();
    assert_eq!(skipped.len(), 2);
    for target in skipped {
        assert!(target.reason.as_deref().unwrap().contains("fail-fast"));
    }
}

#[test]
fn one_tag_one_release_record() {
    let host = MockHost::new();
    let first = host.ensure_release("v1.2.3", "v1.2.3").unwrap();
    let second = host.ensure_release("v1.2.3", "v1.2.3").unwrap();
    assert_eq!(first, second);
    assert_eq!(host.releases.lock().unwrap().len(), 1);
}

#[test]
fn single_musl_target_scenario() {
    let tmp = TempDir::new().unwrap();
    let dist_dir = utf8_temp(&tmp);
    let cfg = test_config(&dist_dir, matrix_one(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::new();

    let report = execute_run(&graph, &store, &host).unwrap();

    assert_eq!(report.outcome, RunOutcome::Complete);
    assert_eq!(report.version, "1.2.3");
    assert_eq!(*host.releases.lock().unwrap(), vec!["v1.2.3".to_owned()]);

    let uploads = host.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_name, "templar-x86_64.tar.xz");
    assert_eq!(uploads[0].content_type, "application/x-gtar");

    // the archive is real: it exists in the dist dir and contains the binary
    let archive = dist_dir.join("templar-x86_64.tar.xz");
    assert!(archive.exists());
    let binary = LocalAsset::untar_xz_file(&archive, "templar").unwrap();
    assert!(binary.is_empty());
}

#[test]
fn zip_and_tarball_attach_to_the_same_release() {
    let tmp = TempDir::new().unwrap();
    let dist_dir = utf8_temp(&tmp);
    let cfg = test_config(&dist_dir, matrix_linux_windows(), "v2.0.0", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::new();

    let report = execute_run(&graph, &store, &host).unwrap();
    assert_eq!(report.outcome, RunOutcome::Complete);

    let uploads = host.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    // both assets landed on one release handle
    assert!(uploads.iter().all(|u| u.upload_target == "mock://v2.0.0"));
    let mut names = host.upload_names();
    names.sort();
    assert_eq!(
        names,
        vec!["templar-x86_64-windows.zip", "templar-x86_64.tar.xz"]
    );
    let zip = uploads
        .iter()
        .find(|u| u.file_name.ends_with(".zip"))
        .unwrap();
    assert_eq!(zip.content_type, "application/zip");

    // and the zip really is a zip with the windows binary inside
    let archive = dist_dir.join("templar-x86_64-windows.zip");
    let binary = LocalAsset::unzip_file(&archive, "templar.exe").unwrap();
    assert!(binary.is_empty());
}

#[test]
fn missing_artifact_skips_only_that_target() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&utf8_temp(&tmp), matrix_one(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::new();
    let release = host.ensure_release("v1.2.3", "v1.2.3").unwrap();

    // nothing was ever published for this tag
    let result = package::package_and_upload(&graph, &store, &host, &release, &graph.targets[0]);
    assert!(matches!(result, Err(ShipError::ArtifactMissing { .. })));
    assert!(host.uploads.lock().unwrap().is_empty());
}

#[test]
fn one_flaky_upload_gets_retried() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&utf8_temp(&tmp), matrix_one(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::failing_uploads(1);

    let report = execute_run(&graph, &store, &host).unwrap();

    // first attempt failed, the retry landed it
    assert_eq!(report.outcome, RunOutcome::Complete);
    assert_eq!(host.uploads.lock().unwrap().len(), 1);
}

#[test]
fn persistent_upload_failure_is_reported_distinctly() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&utf8_temp(&tmp), matrix_one(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();
    let store = ArtifactStore::default();
    let host = MockHost::failing_uploads(2);

    let report = execute_run(&graph, &store, &host).unwrap();

    assert_eq!(report.outcome, RunOutcome::Partial);
    let target = &report.targets[0];
    // the binary exists but isn't published: that's an upload failure,
    // never conflated with a build failure
    assert_eq!(target.status, TargetStatus::UploadFailed);
    assert!(store.fetch("x86_64").is_some());
    assert!(host.uploads.lock().unwrap().is_empty());
}

#[test]
fn malformed_tag_fails_before_any_work() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&utf8_temp(&tmp), matrix_one(), "not-a-tag", vec![]);
    assert!(gather_work(&cfg, mock_tools()).is_err());
}

#[test]
fn plan_reports_steps_and_assets_without_running() {
    let tmp = TempDir::new().unwrap();
    let dist_dir = utf8_temp(&tmp);
    let cfg = test_config(&dist_dir, matrix_linux_windows(), "v1.2.3", vec![]);
    let graph = gather_work(&cfg, mock_tools()).unwrap();

    let plan = RunPlan::from_graph(&graph);
    assert_eq!(plan.steps.len(), 5);
    assert_eq!(plan.assets.len(), 2);
    let package_step = plan
        .steps
        .iter()
        .find(|s| s.id == "package:x86_64")
        .unwrap();
    assert_eq!(package_step.needs, vec!["build:x86_64", "create-release"]);
    assert_eq!(plan.assets[0].file_name, "templar-x86_64.tar.xz");

    // planning left the dist dir untouched
    assert!(!dist_dir.join("templar-x86_64.tar.xz").exists());
}
