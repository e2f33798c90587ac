//! Keyword classifier for uploaded data columns
use crate::assignment::RoleAssignment;
use crate::rules::{Role, RoleRules};
use serde_json::{Map, Value};

/// Classifies column names into statistical roles
#[derive(Debug, Clone, Default)]
pub struct RoleClassifier {
    rules: RoleRules,
}

impl RoleClassifier {
    pub fn new(rules: RoleRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RoleRules {
        &self.rules
    }

    /// Role for a single column: case-insensitive substring match, first
    /// keyword set in priority order wins.
    pub fn suggest_role(&self, column: &str) -> Role {
        let lower = column.to_lowercase();
        self.rules
            .ordered()
            .into_iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|(role, _)| role)
            .unwrap_or(Role::Unassigned)
    }

    /// Assign a role to every column. Never fails and never drops a column;
    /// repeated names collapse to their first occurrence.
    pub fn classify<S: AsRef<str>>(&self, columns: &[S]) -> RoleAssignment {
        let mut assignment = RoleAssignment::new();
        for column in columns {
            let column = column.as_ref();
            assignment.push(column.to_string(), self.suggest_role(column));
        }
        let counts = assignment.counts();
        tracing::debug!(
            columns = assignment.len(),
            response = counts.response,
            factor = counts.factor,
            nuisance = counts.nuisance,
            "columns classified"
        );
        assignment
    }
}

/// Column names of uploaded records: union of keys, in record order then
/// key order within each record
pub fn columns_from_records(records: &[Map<String, Value>]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}
