//! Role classification of uploaded datasets

use qs_roles::*;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

fn fixture(path: &str) -> String {
    let full = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../testing/fixtures")
        .join(path);
    std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("{}: {}", full.display(), e))
}

fn records(values: Value) -> Vec<Map<String, Value>> {
    values
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

#[test]
fn test_uploaded_records_to_confirmed_roles() {
    let rows = records(json!([
        { "Date": "2026-04-12", "Shift": "A", "LineSpeed": 45.2, "ChillTemp": 18.1, "HazePct": 1.2 },
        { "Date": "2026-04-13", "Shift": "B", "LineSpeed": 46.0, "ChillTemp": 18.3, "HazePct": 1.4, "Notes": "" }
    ]));
    let columns = columns_from_records(&rows);
    assert_eq!(columns.len(), 6);

    let assignment = classify(&columns);
    assert_eq!(assignment.role_of("HazePct"), Some(Role::Response));
    assert_eq!(assignment.role_of("LineSpeed"), Some(Role::Factor));
    assert_eq!(assignment.role_of("ChillTemp"), Some(Role::Factor));
    assert_eq!(assignment.role_of("Shift"), Some(Role::Nuisance));
    assert_eq!(assignment.role_of("Notes"), Some(Role::Unassigned));

    let confirmed = assignment.confirm().unwrap();
    assert_eq!(confirmed.responses(), vec!["HazePct"]);
    assert_eq!(confirmed.factors().len(), 2);
}

#[test]
fn test_manual_override_before_confirmation() {
    let mut assignment = classify(&["Notes", "LineSpeed"]);
    assert!(!assignment.is_confirmed_usable());
    assert!(assignment.clone().confirm().is_err());

    assignment.set_role("Notes", Role::Response).unwrap();
    let confirmed = assignment.confirm().unwrap();
    assert_eq!(confirmed.responses(), vec!["Notes"]);
}

#[test]
fn test_rules_from_fixture() {
    let rules = RoleRules::from_yaml(&fixture("roles/film-line.yaml")).unwrap();
    let classifier = RoleClassifier::new(rules);

    assert_eq!(classifier.suggest_role("COF_static"), Role::Response);
    assert_eq!(classifier.suggest_role("SealDwell"), Role::Factor);
    assert_eq!(classifier.suggest_role("RollNumber"), Role::Nuisance);
    // "cpk" is not in this rule set
    assert_eq!(classifier.suggest_role("Cpk"), Role::Unassigned);
}
