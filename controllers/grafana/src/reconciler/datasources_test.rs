//! Unit tests for the datasource reconciler

use super::datasources::plan;
use crate::test_utils::{test_reconciler, test_source_entry};
use model::SourceEntry;

fn entries(units: &[&str]) -> Vec<SourceEntry> {
    units
        .iter()
        .map(|u| test_source_entry(u, "http://10.0.0.5:9090"))
        .collect()
}

#[test]
fn test_plan_exactly_one_default() {
    let specs = plan(&entries(&["prometheus/2", "prometheus/0", "prometheus/1"]));
    assert_eq!(specs.len(), 3);
    assert_eq!(specs.iter().filter(|s| s.is_default).count(), 1);
    // Lexicographically first name wins
    assert!(specs[0].is_default, "first (sorted) spec should be default");
    assert!(specs[0].name.ends_with("prometheus_0"));
}

#[test]
fn test_plan_is_deterministic_regardless_of_input_order() {
    let a = plan(&entries(&["prometheus/1", "prometheus/0"]));
    let b = plan(&entries(&["prometheus/0", "prometheus/1"]));
    assert_eq!(a, b);
}

#[test]
fn test_plan_same_model_uuid_distinct_units_no_collision() {
    let specs = plan(&entries(&["prometheus/0", "prometheus/1"]));
    assert_eq!(specs.len(), 2);
    assert_ne!(specs[0].name, specs[1].name);
}

#[test]
fn test_plan_deduplicates_republished_entries() {
    let specs = plan(&entries(&["prometheus/0", "prometheus/0"]));
    assert_eq!(specs.len(), 1);
}

#[test]
fn test_plan_empty_entries() {
    assert!(plan(&[]).is_empty());
}

#[test]
fn test_reconcile_writes_provisioning_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, _) = test_reconciler(dir.path());
    let specs = plan(&entries(&["prometheus/0"]));

    assert!(reconciler.reconcile_datasources(&specs).unwrap());
    let content =
        std::fs::read_to_string(reconciler.paths.datasources_file()).unwrap();
    assert!(content.contains("apiVersion: 1"));
    assert!(content.contains("isDefault: true"));
    assert!(content.contains("access: proxy"));

    // Identical specs: no rewrite
    assert!(!reconciler.reconcile_datasources(&specs).unwrap());
}

#[test]
fn test_reconcile_removes_disappeared_relation_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, _) = test_reconciler(dir.path());

    let both = plan(&entries(&["prometheus/0", "prometheus/1"]));
    reconciler.reconcile_datasources(&both).unwrap();

    // prometheus/1 relation torn down
    let remaining = plan(&entries(&["prometheus/0"]));
    assert!(reconciler.reconcile_datasources(&remaining).unwrap());

    let content =
        std::fs::read_to_string(reconciler.paths.datasources_file()).unwrap();
    assert!(content.contains("deleteDatasources"));
    assert!(content.contains("prometheus_1"));
    // The survivor is still provisioned and is now the default
    assert!(content.contains("isDefault: true"));
}

#[test]
fn test_reconcile_no_datasources_and_no_prior_file_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (reconciler, _, _) = test_reconciler(dir.path());
    assert!(!reconciler.reconcile_datasources(&[]).unwrap());
    assert!(!reconciler.paths.datasources_file().exists());
}
