//! Unit tests for the apply engine

use super::apply::render_ini;
use super::{ApplyOutcome, Reconciler};
use crate::backoff::RetryPolicy;
use crate::error::ControllerError;
use crate::paths::Paths;
use crate::test_utils::{test_desired_state, test_reconciler, test_source_entry};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_first_apply_writes_everything_and_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, grafana, service) = test_reconciler(dir.path());
    let desired = test_desired_state();

    let result = reconciler.apply(&desired, None).await.unwrap();

    assert_eq!(result.outcome, ApplyOutcome::Applied);
    assert!(result.restarted);
    assert_eq!(service.restarts(), 1);
    assert_eq!(grafana.probe_count(), 1);
    assert!(reconciler.paths.config_file().exists());
    assert!(reconciler.paths.dashboard_provider_file().exists());
    assert!(reconciler.paths.last_applied_file().exists());
    assert_eq!(
        result.last_applied.fingerprint,
        desired.fingerprint()
    );
}

#[tokio::test]
async fn test_second_apply_of_same_state_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, grafana, service) = test_reconciler(dir.path());
    let desired = test_desired_state();

    let first = reconciler.apply(&desired, None).await.unwrap();
    let ini_mtime = std::fs::metadata(reconciler.paths.config_file())
        .unwrap()
        .modified()
        .unwrap();

    let second = reconciler
        .apply(&desired, Some(&first.last_applied))
        .await
        .unwrap();

    assert_eq!(second.outcome, ApplyOutcome::Unchanged);
    assert!(!second.restarted);
    // No extra restart, no extra probe, no file mutation
    assert_eq!(service.restarts(), 1);
    assert_eq!(grafana.probe_count(), 1);
    assert_eq!(
        std::fs::metadata(reconciler.paths.config_file())
            .unwrap()
            .modified()
            .unwrap(),
        ini_mtime
    );
}

#[tokio::test]
async fn test_provisioning_only_change_does_not_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, service) = test_reconciler(dir.path());
    let desired = test_desired_state();

    let first = reconciler.apply(&desired, None).await.unwrap();
    assert_eq!(service.restarts(), 1);

    // Add a datasource: the ini is untouched, Grafana rescans on its own
    let mut with_source = desired.clone();
    with_source.datasources = super::datasources::plan(&[test_source_entry(
        "prometheus/0",
        "http://10.0.0.5:9090",
    )]);
    let result = reconciler
        .apply(&with_source, Some(&first.last_applied))
        .await
        .unwrap();

    assert_eq!(result.outcome, ApplyOutcome::Applied);
    assert!(!result.restarted);
    assert_eq!(service.restarts(), 1);
}

#[tokio::test]
async fn test_credential_change_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, service) = test_reconciler(dir.path());
    let desired = test_desired_state();
    let first = reconciler.apply(&desired, None).await.unwrap();

    let mut rotated = desired.clone();
    rotated.admin_password = "rotated".to_string();
    let result = reconciler
        .apply(&rotated, Some(&first.last_applied))
        .await
        .unwrap();

    assert!(result.restarted);
    assert_eq!(service.restarts(), 2);
}

#[tokio::test]
async fn test_failed_restart_is_retried_even_though_ini_is_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, grafana, service) = test_reconciler(dir.path());
    let desired = test_desired_state();
    let first = reconciler.apply(&desired, None).await.unwrap();
    assert_eq!(service.restarts(), 1);

    // A port change whose restart fails: the pass errors and persists nothing
    let mut changed = desired.clone();
    changed.http_port = 3100;
    service.fail_next_restarts(1);
    let err = reconciler
        .apply(&changed, Some(&first.last_applied))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Service(_)));
    assert_eq!(service.restarts(), 1);
    assert_eq!(grafana.probe_count(), 1);

    // The retry finds the new ini already on disk but must still restart,
    // otherwise Grafana keeps serving the old port forever
    let result = reconciler
        .apply(&changed, Some(&first.last_applied))
        .await
        .unwrap();
    assert!(result.restarted);
    assert_eq!(service.restarts(), 2);
    assert_eq!(result.last_applied.fingerprint, changed.fingerprint());

    // A further unchanged pass does not restart again
    let again = reconciler
        .apply(&changed, Some(&result.last_applied))
        .await
        .unwrap();
    assert_eq!(again.outcome, ApplyOutcome::Unchanged);
    assert_eq!(service.restarts(), 2);
}

#[tokio::test]
async fn test_health_retries_then_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, grafana, _) = test_reconciler(dir.path());
    grafana.fail_health_probes(2);

    let result = reconciler.apply(&test_desired_state(), None).await.unwrap();
    assert_eq!(result.outcome, ApplyOutcome::Applied);
    assert_eq!(grafana.probe_count(), 3);
}

#[tokio::test]
async fn test_health_retry_budget_exhausted_is_transient_and_keeps_last_applied() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, grafana, _) = test_reconciler(dir.path());
    grafana.fail_health_probes(10);

    let err = reconciler
        .apply(&test_desired_state(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ControllerError::Transient { attempts: 3, .. }));
    assert!(!err.is_config_error());
    // Failure must not persist a fingerprint; the next trigger retries fully
    assert!(!reconciler.paths.last_applied_file().exists());
}

#[tokio::test]
async fn test_malformed_slot_reported_but_pass_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, _) = test_reconciler(dir.path());
    let mut desired = test_desired_state();
    desired.dashboards[0] = Some(r#"{"title":"CPU"}"#.to_string());
    desired.dashboards[3] = Some("{broken".to_string());

    let result = reconciler.apply(&desired, None).await.unwrap();

    assert_eq!(result.outcome, ApplyOutcome::Applied);
    assert_eq!(result.malformed_slots.len(), 1);
    assert!(reconciler.paths.dashboards_dir().join("cpu-0.json").exists());
}

#[tokio::test]
async fn test_load_last_applied_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, _) = test_reconciler(dir.path());

    assert!(reconciler.load_last_applied().unwrap().is_none());

    let result = reconciler.apply(&test_desired_state(), None).await.unwrap();
    let loaded = reconciler.load_last_applied().unwrap().unwrap();
    assert_eq!(loaded.fingerprint, result.last_applied.fingerprint);
}

#[test]
fn test_render_ini_carries_config_values() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::under_root(dir.path());
    let mut desired = test_desired_state();
    desired.http_port = 3080;
    desired.admin_user = "ops".to_string();

    let ini = render_ini(&desired, &paths);
    assert!(ini.contains("http_port = 3080"));
    assert!(ini.contains("admin_user = ops"));
    assert!(ini.contains("admin_password = test-password"));
    assert!(ini.contains("Grafana 11.4.0"));
    assert!(ini.contains(&format!("provisioning = {}", paths.provisioning_dir().display())));
}

#[test]
fn test_render_ini_version_bump_changes_content() {
    // A version bump must change the ini so the restart path triggers
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::under_root(dir.path());
    let desired = test_desired_state();
    let mut bumped = desired.clone();
    bumped.grafana_version = "11.5.0".parse().unwrap();

    assert_ne!(render_ini(&desired, &paths), render_ini(&bumped, &paths));
}

#[tokio::test]
async fn test_probe_delays_follow_policy() {
    // Uses a tiny policy; asserts the retry loop respects the attempt budget
    let dir = tempfile::tempdir().unwrap();
    let grafana = Arc::new(grafana_client::MockGrafanaClient::new());
    grafana.fail_health_probes(5);
    let service = Arc::new(crate::test_utils::RecordingServiceManager::default());
    let reconciler = Reconciler::new(
        Paths::under_root(dir.path()),
        grafana.clone(),
        service,
        RetryPolicy {
            attempts: 5,
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
        },
    );

    let err = reconciler
        .apply(&test_desired_state(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Transient { attempts: 5, .. }));
    assert_eq!(grafana.probe_count(), 5);
}
