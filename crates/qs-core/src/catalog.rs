//! Parameter Catalog: known process parameters of the converting lines
//!
//! Every parameter the plant records has a stable camelCase key, a display
//! label and a unit. Keys outside the catalog are still accepted through
//! [`ParameterKey::Custom`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Key of a process parameter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterKey {
    LineSpeed,
    WebTensionIn,
    WebTensionOut,
    NipPressure,
    RollTempChill,
    RollTempTop,
    RollTempBottom,
    Humidity,
    RoomTemp,
    CoronaDyne,
    UvDose,
    CoatWeight,
    UnwindTorque,
    RewindTorque,
    /// Parameter not in the catalog (user-defined or from an uploaded file)
    Custom(String),
}

/// Catalog entry for a known parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
}

/// Known parameters in display order
pub const CATALOG: &[ParameterInfo] = &[
    ParameterInfo { key: "lineSpeed", label: "Line Speed", unit: "m/min" },
    ParameterInfo { key: "webTensionIn", label: "Web Tension In", unit: "N/m" },
    ParameterInfo { key: "webTensionOut", label: "Web Tension Out", unit: "N/m" },
    ParameterInfo { key: "nipPressure", label: "Nip Pressure", unit: "bar" },
    ParameterInfo { key: "rollTempChill", label: "Chill Roll Temp", unit: "°C" },
    ParameterInfo { key: "rollTempTop", label: "Top Roll Temp", unit: "°C" },
    ParameterInfo { key: "rollTempBottom", label: "Bottom Roll Temp", unit: "°C" },
    ParameterInfo { key: "humidity", label: "Humidity", unit: "%" },
    ParameterInfo { key: "roomTemp", label: "Room Temp", unit: "°C" },
    ParameterInfo { key: "coronaDyne", label: "Corona Dyne", unit: "dyne/cm" },
    ParameterInfo { key: "uvDose", label: "UV Dose", unit: "mJ/cm²" },
    ParameterInfo { key: "coatWeight", label: "Coat Weight", unit: "g/m²" },
    ParameterInfo { key: "unwindTorque", label: "Unwind Torque", unit: "Nm" },
    ParameterInfo { key: "rewindTorque", label: "Rewind Torque", unit: "Nm" },
];

/// Catalog keys, index-aligned with [`CATALOG`]
const KNOWN: [ParameterKey; 14] = [
    ParameterKey::LineSpeed,
    ParameterKey::WebTensionIn,
    ParameterKey::WebTensionOut,
    ParameterKey::NipPressure,
    ParameterKey::RollTempChill,
    ParameterKey::RollTempTop,
    ParameterKey::RollTempBottom,
    ParameterKey::Humidity,
    ParameterKey::RoomTemp,
    ParameterKey::CoronaDyne,
    ParameterKey::UvDose,
    ParameterKey::CoatWeight,
    ParameterKey::UnwindTorque,
    ParameterKey::RewindTorque,
];

static BY_NAME: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    CATALOG
        .iter()
        .enumerate()
        .map(|(idx, info)| (info.key, idx))
        .collect()
});

impl ParameterKey {
    /// Parse a key, falling back to `Custom` for names outside the catalog
    pub fn parse(name: &str) -> Self {
        match BY_NAME.get(name) {
            Some(&idx) => Self::from_index(idx),
            None => ParameterKey::Custom(name.to_string()),
        }
    }

    fn from_index(idx: usize) -> Self {
        KNOWN[idx].clone()
    }

    fn index(&self) -> Option<usize> {
        KNOWN.iter().position(|known| known == self)
    }

    /// Catalog entry, `None` for custom keys
    pub fn info(&self) -> Option<&'static ParameterInfo> {
        self.index().map(|idx| &CATALOG[idx])
    }

    /// Wire name of the key
    pub fn as_str(&self) -> &str {
        match self {
            ParameterKey::Custom(name) => name.as_str(),
            known => known.info().map(|i| i.key).unwrap_or_default(),
        }
    }

    /// Display label; custom keys use their own name
    pub fn label(&self) -> &str {
        self.info().map(|i| i.label).unwrap_or_else(|| self.as_str())
    }

    /// Unit of measure; empty for custom keys
    pub fn unit(&self) -> &'static str {
        self.info().map(|i| i.unit).unwrap_or("")
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ParameterKey::Custom(_))
    }
}

impl From<String> for ParameterKey {
    fn from(name: String) -> Self {
        match BY_NAME.get(name.as_str()) {
            Some(&idx) => Self::from_index(idx),
            None => ParameterKey::Custom(name),
        }
    }
}

impl From<&str> for ParameterKey {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<ParameterKey> for String {
    fn from(key: ParameterKey) -> Self {
        match key {
            ParameterKey::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
