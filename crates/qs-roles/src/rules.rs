//! Role keyword rules
//!
//! Keyword sets are checked in a fixed priority order: response, then
//! factor, then nuisance. Only the keyword lists are configurable.

use qs_core::{QsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistical role of a data column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Quality characteristic to optimize (defect rate, yield, Cpk)
    Response,
    /// Controllable process setting (speed, pressure, temperature)
    Factor,
    /// Context or noise (operator, date, line)
    Nuisance,
    Unassigned,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Response => "response",
            Role::Factor => "factor",
            Role::Nuisance => "nuisance",
            Role::Unassigned => "unassigned",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword sets for the role heuristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRules {
    pub response: Vec<String>,
    pub factor: Vec<String>,
    pub nuisance: Vec<String>,
}

const RESPONSE_KEYWORDS: &[&str] = &[
    "defect", "yield", "quality", "haze", "strength", "thickness", "cpk", "cp", "ppm",
];
const FACTOR_KEYWORDS: &[&str] = &[
    "speed", "pressure", "temp", "tension", "humidity", "power", "time", "rate",
];
const NUISANCE_KEYWORDS: &[&str] = &["operator", "shift", "date", "id", "line", "block"];

impl Default for RoleRules {
    fn default() -> Self {
        Self {
            response: to_owned(RESPONSE_KEYWORDS),
            factor: to_owned(FACTOR_KEYWORDS),
            nuisance: to_owned(NUISANCE_KEYWORDS),
        }
    }
}

impl RoleRules {
    /// Load keyword sets from YAML.
    ///
    /// Keywords are lower-cased; empty keywords are rejected because they
    /// would match every column.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: Self =
            serde_yaml::from_str(yaml).map_err(|e| QsError::ConfigError(e.to_string()))?;
        rules.normalized()
    }

    /// Lower-case and trim every keyword, rejecting empty ones
    pub fn normalized(self) -> Result<Self> {
        let clean = |list: Vec<String>| -> Result<Vec<String>> {
            list.into_iter()
                .map(|k| {
                    let k = k.trim().to_lowercase();
                    if k.is_empty() {
                        Err(QsError::ConfigError("empty role keyword".to_string()))
                    } else {
                        Ok(k)
                    }
                })
                .collect()
        };
        Ok(Self {
            response: clean(self.response)?,
            factor: clean(self.factor)?,
            nuisance: clean(self.nuisance)?,
        })
    }

    /// Keyword sets in priority order
    pub fn ordered(&self) -> [(Role, &[String]); 3] {
        [
            (Role::Response, self.response.as_slice()),
            (Role::Factor, self.factor.as_slice()),
            (Role::Nuisance, self.nuisance.as_slice()),
        ]
    }
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sets_are_disjoint() {
        let rules = RoleRules::default();
        for word in &rules.response {
            assert!(!rules.factor.contains(word));
            assert!(!rules.nuisance.contains(word));
        }
        for word in &rules.factor {
            assert!(!rules.nuisance.contains(word));
        }
    }

    #[test]
    fn test_yaml_lowercases_keywords() {
        let rules = RoleRules::from_yaml(
            "response: [Gloss]\nfactor: [' Dwell ']\nnuisance: [Roll]\n",
        )
        .unwrap();
        assert_eq!(rules.response, vec!["gloss"]);
        assert_eq!(rules.factor, vec!["dwell"]);
    }

    #[test]
    fn test_yaml_rejects_empty_keyword() {
        let err = RoleRules::from_yaml("response: ['']\nfactor: []\nnuisance: []\n").unwrap_err();
        assert!(matches!(err, QsError::ConfigError(_)));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Nuisance).unwrap(), "\"nuisance\"");
        assert_eq!(Role::Unassigned.to_string(), "unassigned");
    }
}
