use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Template;

// ==================== Print Jobs ====================

/// Extra barcode appended after the rendered document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeMedia {
    pub value: String,
    #[serde(rename = "type", default)]
    pub symbology: Option<String>,
}

/// Extra QR code appended after the rendered document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrMedia {
    pub value: String,
    #[serde(default)]
    pub size: Option<u8>,
}

/// Print job request (client -> bridge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobRequest {
    pub job_id: String,
    #[serde(default)]
    pub station_id: Option<String>,
    pub printer_id: String,
    pub document_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Pre-encoded images (opaque, never rasterized here)
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub barcodes: Vec<BarcodeMedia>,
    #[serde(default)]
    pub qrs: Vec<QrMedia>,
}

impl PrintJobRequest {
    pub fn has_media(&self) -> bool {
        !self.images.is_empty() || !self.barcodes.is_empty() || !self.qrs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "DONE"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Print job result (bridge -> requesting connection only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobResult {
    pub job_id: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
}

impl PrintJobResult {
    pub fn done(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Done,
            error_message: None,
        }
    }

    pub fn error(job_id: &str, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Error,
            error_message: Some(message.into()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == JobStatus::Done
    }
}

// ==================== Templates ====================

/// Template replacement request, discriminated by `action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUpdateRequest {
    pub action: String,
    #[serde(alias = "payload")]
    pub template: Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUpdateResult {
    pub document_type: String,
    pub success: bool,
    pub message: String,
    pub action: String,
}

impl TemplateUpdateResult {
    pub const ACTION: &'static str = "TemplateUpdateResult";

    pub fn new(document_type: &str, success: bool, message: impl Into<String>) -> Self {
        Self {
            document_type: document_type.to_string(),
            success,
            message: message.into(),
            action: Self::ACTION.to_string(),
        }
    }
}

// ==================== Scales ====================

/// Live scale reading broadcast to the connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleReadingMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub station_id: String,
    pub scale_id: String,
    pub weight: f64,
    pub unit: String,
    pub stable: bool,
    /// Unix millis
    pub timestamp: i64,
}

impl ScaleReadingMessage {
    pub const KIND: &'static str = "SCALE_READING";

    pub fn new(
        station_id: &str,
        scale_id: &str,
        weight: f64,
        unit: &str,
        stable: bool,
        timestamp: i64,
    ) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            station_id: station_id.to_string(),
            scale_id: scale_id.to_string(),
            weight,
            unit: unit.to_string(),
            stable,
            timestamp,
        }
    }
}

/// Listener registration for live readings of one scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSubscriptionRequest {
    pub action: String,
    pub scale_id: String,
}
