//! Service configuration
//!
//! Read from the YAML file named by `QS_CONFIG` when set, defaults
//! otherwise. `QS_ADDR` overrides the listen address.
use qs_conformance::ConformanceProfile;
use qs_core::{QsError, Result};
use qs_roles::RoleRules;
use qs_schedule::{CatchUpPolicy, CoordinatorConfig, DEFAULT_LOG_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "QS_CONFIG";
pub const ADDR_ENV: &str = "QS_ADDR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub addr: String,
    /// Seconds between schedule polls; 0 disables the poll loop
    pub poll_interval_secs: u64,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub conformance: ConformanceProfile,
    pub roles: RoleRules,
    pub catch_up: CatchUpPolicy,
    pub delivery_log_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8787".to_string(),
            poll_interval_secs: 60,
            log_filter: "info".to_string(),
            conformance: ConformanceProfile::default(),
            roles: RoleRules::default(),
            catch_up: CatchUpPolicy::default(),
            delivery_log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ServiceConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| QsError::ConfigError(e.to_string()))?;
        config.validated()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| QsError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// Configuration for this process: file from `QS_CONFIG`, then the
    /// `QS_ADDR` override
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            config.addr = addr;
        }
        Ok(config)
    }

    fn validated(mut self) -> Result<Self> {
        self.conformance
            .validate()
            .map_err(|e| QsError::ConfigError(e.to_string()))?;
        self.roles = self.roles.normalized()?;
        if self.delivery_log_capacity == 0 {
            return Err(QsError::ConfigError(
                "delivery_log_capacity must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            catch_up: self.catch_up,
            log_capacity: self.delivery_log_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qs_conformance::MissingPolicy;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.addr, "0.0.0.0:8787");
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.catch_up, CatchUpPolicy::FireEach);
        assert_eq!(config.coordinator().log_capacity, 1000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ServiceConfig::from_yaml(
            "poll_interval_secs: 15\ncatch_up: skip_missed\nconformance:\n  name: audit@1.0\n  missing: fail\n",
        )
        .unwrap();
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.catch_up, CatchUpPolicy::SkipMissed);
        assert_eq!(config.conformance.missing, MissingPolicy::Fail);
        assert_eq!(config.conformance.default_tolerance_pct, 5.0);
        assert_eq!(config.addr, "0.0.0.0:8787");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ServiceConfig::from_yaml("poll_interval_secs: soon\n").unwrap_err();
        assert_eq!(err.code(), "CONFIG");
        let err = ServiceConfig::from_yaml("conformance:\n  name: x\n  default_tolerance_pct: -1\n")
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::from_file("/nonexistent/qs.yaml").unwrap_err();
        assert!(matches!(err, QsError::ConfigError(_)));
    }
}
