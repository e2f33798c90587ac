//! Quality Studio Roles: parameter role classification
//!
//! Suggests, for every column of an uploaded dataset, whether it is a
//! response, a factor, a nuisance variable or unassigned, so capability and
//! DoE analysis can start from a sensible mapping.
//!
//! # Example
//!
//! ```
//! use qs_roles::{classify, Role};
//!
//! let roles = classify(&["defectRate", "lineSpeed", "operator"]);
//! assert_eq!(roles.role_of("defectRate"), Some(Role::Response));
//! assert_eq!(roles.role_of("lineSpeed"), Some(Role::Factor));
//! assert_eq!(roles.role_of("operator"), Some(Role::Nuisance));
//! assert!(roles.is_confirmed_usable());
//! ```

pub mod assignment;
pub mod classifier;
pub mod rules;

pub use assignment::{ColumnRole, ConfirmedRoles, RoleAssignment, RoleCounts};
pub use classifier::{columns_from_records, RoleClassifier};
pub use rules::{Role, RoleRules};

/// Classify columns with the default keyword rules
pub fn classify<S: AsRef<str>>(columns: &[S]) -> RoleAssignment {
    RoleClassifier::default().classify(columns)
}

/// Role for a single column with the default keyword rules
pub fn suggest_role(column: &str) -> Role {
    RoleClassifier::default().suggest_role(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_total() {
        let columns = ["Cpk", "webTensionIn", "shift", "comment", "ppm_haze"];
        let roles = classify(&columns);
        assert_eq!(roles.len(), columns.len());
        for column in columns {
            assert!(roles.role_of(column).is_some(), "{} has no role", column);
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let columns = vec!["defectRate".to_string(), "coatWeight".to_string(), "line".to_string()];
        assert_eq!(classify(&columns), classify(&columns));
    }

    #[test]
    fn test_suggest_role() {
        assert_eq!(suggest_role("tensileStrength"), Role::Response);
    }
}
