//! Role assignments and the confirmation gate
use crate::rules::Role;
use qs_core::{QsError, Result};
use serde::{Deserialize, Serialize};

/// A column together with its role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRole {
    pub column: String,
    pub role: Role,
}

/// Role of every column of one uploaded dataset, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleAssignment {
    columns: Vec<ColumnRole>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub response: usize,
    pub factor: usize,
    pub nuisance: usize,
    pub unassigned: usize,
}

impl RoleAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; a column already present keeps its first role
    pub(crate) fn push(&mut self, column: String, role: Role) {
        if self.role_of(&column).is_none() {
            self.columns.push(ColumnRole { column, role });
        }
    }

    pub fn role_of(&self, column: &str) -> Option<Role> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.role)
    }

    /// Manually override the role of a known column
    pub fn set_role(&mut self, column: &str, role: Role) -> Result<()> {
        match self.columns.iter_mut().find(|c| c.column == column) {
            Some(entry) => {
                entry.role = role;
                Ok(())
            }
            None => Err(QsError::NotFound(format!("column {}", column))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnRole> {
        self.columns.iter()
    }

    pub fn columns_with(&self, role: Role) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.column.as_str())
            .collect()
    }

    pub fn counts(&self) -> RoleCounts {
        let mut counts = RoleCounts::default();
        for entry in &self.columns {
            match entry.role {
                Role::Response => counts.response += 1,
                Role::Factor => counts.factor += 1,
                Role::Nuisance => counts.nuisance += 1,
                Role::Unassigned => counts.unassigned += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Usable for capability / DoE analysis: at least one response column
    pub fn is_confirmed_usable(&self) -> bool {
        self.columns.iter().any(|c| c.role == Role::Response)
    }

    /// Gate the assignment for downstream analysis
    pub fn confirm(self) -> Result<ConfirmedRoles> {
        if !self.is_confirmed_usable() {
            return Err(QsError::InvalidInput(
                "assign at least one response column before analysis".to_string(),
            ));
        }
        Ok(ConfirmedRoles { assignment: self })
    }
}

/// An assignment that passed the confirmation gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedRoles {
    assignment: RoleAssignment,
}

impl ConfirmedRoles {
    pub fn responses(&self) -> Vec<&str> {
        self.assignment.columns_with(Role::Response)
    }

    pub fn factors(&self) -> Vec<&str> {
        self.assignment.columns_with(Role::Factor)
    }

    pub fn nuisances(&self) -> Vec<&str> {
        self.assignment.columns_with(Role::Nuisance)
    }

    pub fn assignment(&self) -> &RoleAssignment {
        &self.assignment
    }
}
