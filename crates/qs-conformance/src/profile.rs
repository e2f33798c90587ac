//! Conformance Profiles
//!
//! Defines the default tolerance and how strictly missing parameters are
//! treated when judging a process run against a golden batch.

use qs_core::{QsError, Result, DEFAULT_TOLERANCE_PCT};
use serde::{Deserialize, Serialize};

/// How a missing measurement affects the strict verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Missing parameters are listed but never block
    #[default]
    Report,
    /// Missing parameters block the strict verdict
    Fail,
}

/// Conformance profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceProfile {
    /// Profile name (e.g., "standard@1.0", "audit@1.0")
    pub name: String,

    /// Tolerance percent for parameters without an explicit entry
    #[serde(default = "default_tolerance")]
    pub default_tolerance_pct: f64,

    #[serde(default)]
    pub missing: MissingPolicy,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_PCT
}

impl ConformanceProfile {
    /// Everyday line monitoring: missing sensors are reported only
    pub fn standard() -> Self {
        Self {
            name: "standard@1.0".to_string(),
            default_tolerance_pct: DEFAULT_TOLERANCE_PCT,
            missing: MissingPolicy::Report,
        }
    }

    /// Release audits: every reference parameter must be measured
    pub fn audit() -> Self {
        Self {
            name: "audit@1.0".to_string(),
            default_tolerance_pct: DEFAULT_TOLERANCE_PCT,
            missing: MissingPolicy::Fail,
        }
    }

    /// Load profile from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let profile: Self =
            serde_yaml::from_str(yaml).map_err(|e| QsError::ConfigError(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.default_tolerance_pct.is_finite() || self.default_tolerance_pct < 0.0 {
            return Err(QsError::InvalidInput(format!(
                "default tolerance must be a non-negative number, got {}",
                self.default_tolerance_pct
            )));
        }
        Ok(())
    }

    /// Get profile by name
    pub fn for_name(name: &str) -> Self {
        match name {
            "standard" => Self::standard(),
            "audit" => Self::audit(),
            _ => Self::standard(),
        }
    }
}

impl Default for ConformanceProfile {
    fn default() -> Self {
        Self::standard()
    }
}
