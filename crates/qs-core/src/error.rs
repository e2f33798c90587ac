//! Unified Error Model
use thiserror::Error;

/// Result alias used across the Quality Studio crates
pub type Result<T> = std::result::Result<T, QsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QsError {
    /// Malformed reference or tolerance data
    #[error("INPUT/{0}")]
    InvalidInput(String),

    /// Malformed recurrence rule or schedule
    #[error("SPEC/{0}")]
    InvalidSpec(String),

    /// A reference parameter has no measured value. Informational only.
    #[error("MISSING/{0}")]
    MissingParameter(String),

    #[error("DELIVERY/{0}")]
    DeliveryFailure(String),

    /// Operation not allowed in the entity's current state
    #[error("STATE/{0}")]
    InvalidState(String),

    #[error("NOTFOUND/{0}")]
    NotFound(String),

    #[error("STORE/{0}")]
    StoreError(String),

    #[error("CONFIG/{0}")]
    ConfigError(String),
}

impl QsError {
    /// Short error code, the prefix before the slash
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INPUT",
            Self::InvalidSpec(_) => "SPEC",
            Self::MissingParameter(_) => "MISSING",
            Self::DeliveryFailure(_) => "DELIVERY",
            Self::InvalidState(_) => "STATE",
            Self::NotFound(_) => "NOTFOUND",
            Self::StoreError(_) => "STORE",
            Self::ConfigError(_) => "CONFIG",
        }
    }

    /// Whether the error comes from caller-supplied data
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::InvalidSpec(_) | Self::InvalidState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = QsError::InvalidSpec("weekly schedule needs dayOfWeek".to_string());
        assert_eq!(err.to_string(), "SPEC/weekly schedule needs dayOfWeek");
        assert_eq!(err.code(), "SPEC");
        assert!(err.is_validation());
    }

    #[test]
    fn test_delivery_is_not_validation() {
        let err = QsError::DeliveryFailure("smtp timeout".to_string());
        assert!(!err.is_validation());
    }
}
