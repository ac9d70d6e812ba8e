//! Scale Configuration Model

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleParity {
    #[default]
    #[serde(alias = "none", alias = "NONE")]
    None,
    #[serde(alias = "odd", alias = "ODD")]
    Odd,
    #[serde(alias = "even", alias = "EVEN")]
    Even,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

/// Serial weighing scale configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub port_name: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: ScaleParity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ScaleConfig {
    pub fn new(id: &str, port_name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            port_name: port_name.to_string(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: ScaleParity::None,
            stop_bits: default_stop_bits(),
            is_active: true,
        }
    }

    /// Identifier used for all lookups (scale ids are case-insensitive)
    pub fn key(&self) -> String {
        normalize_scale_id(&self.id)
    }
}

pub fn normalize_scale_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Runtime connection status of a scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl fmt::Display for ScaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleStatus::Disconnected => write!(f, "disconnected"),
            ScaleStatus::Connected => write!(f, "connected"),
            ScaleStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of a scale's runtime state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleRuntimeState {
    pub status: ScaleStatus,
    pub last_error: Option<String>,
    pub port_name: Option<String>,
    pub listener_count: usize,
}
