//! Wire messages exchanged with the single protocol client
//!
//! Every frame is a JSON text frame. Inbound frames are classified by
//! [`InboundMessage::classify`]:
//!
//! | Discriminant | Message |
//! |--------------|---------|
//! | `action` = `UpdateTemplate` / `SaveTemplate` | [`TemplateUpdateRequest`] |
//! | `action` = `SubscribeScale` / `UnsubscribeScale` | [`ScaleSubscriptionRequest`] |
//! | `jobId` present | [`PrintJobRequest`] |

use serde::Serialize;
use thiserror::Error;

pub mod payload;
pub use payload::*;

/// Known `action` keywords
pub mod actions {
    pub const UPDATE_TEMPLATE: &str = "UpdateTemplate";
    pub const SAVE_TEMPLATE: &str = "SaveTemplate";
    pub const SUBSCRIBE_SCALE: &str = "SubscribeScale";
    pub const UNSUBSCRIBE_SCALE: &str = "UnsubscribeScale";
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Expected a JSON object")]
    NotAnObject,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unrecognized message shape")]
    Unrecognized,
}

/// Classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    PrintJob(Box<PrintJobRequest>),
    TemplateUpdate(Box<TemplateUpdateRequest>),
    ScaleSubscription {
        scale_id: String,
        subscribe: bool,
    },
}

impl InboundMessage {
    /// Classify a raw text frame
    pub fn classify(text: &str) -> Result<Self, ClassifyError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let obj = value.as_object().ok_or(ClassifyError::NotAnObject)?;

        if let Some(action) = obj.get("action").and_then(|a| a.as_str()) {
            let action = action.trim();
            if action.eq_ignore_ascii_case(actions::UPDATE_TEMPLATE)
                || action.eq_ignore_ascii_case(actions::SAVE_TEMPLATE)
            {
                let req: TemplateUpdateRequest = serde_json::from_value(value)?;
                return Ok(InboundMessage::TemplateUpdate(Box::new(req)));
            }
            let subscribe = action.eq_ignore_ascii_case(actions::SUBSCRIBE_SCALE);
            if subscribe || action.eq_ignore_ascii_case(actions::UNSUBSCRIBE_SCALE) {
                let req: ScaleSubscriptionRequest = serde_json::from_value(value)?;
                return Ok(InboundMessage::ScaleSubscription {
                    scale_id: req.scale_id,
                    subscribe,
                });
            }
            return Err(ClassifyError::UnknownAction(action.to_string()));
        }

        if obj.contains_key("jobId") {
            let req: PrintJobRequest = serde_json::from_value(value)?;
            return Ok(InboundMessage::PrintJob(Box::new(req)));
        }

        Err(ClassifyError::Unrecognized)
    }
}

/// Outbound message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    PrintResult(PrintJobResult),
    ScaleReading(ScaleReadingMessage),
    TemplateUpdateResult(TemplateUpdateResult),
}

impl OutboundMessage {
    /// Serialize into a text frame
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<PrintJobResult> for OutboundMessage {
    fn from(value: PrintJobResult) -> Self {
        Self::PrintResult(value)
    }
}

impl From<ScaleReadingMessage> for OutboundMessage {
    fn from(value: ScaleReadingMessage) -> Self {
        Self::ScaleReading(value)
    }
}

impl From<TemplateUpdateResult> for OutboundMessage {
    fn from(value: TemplateUpdateResult) -> Self {
        Self::TemplateUpdateResult(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_print_job() {
        let text = r#"{
            "jobId": "J1",
            "stationId": "S1",
            "printerId": "P1",
            "documentType": "SaleReceipt",
            "data": {"Number": "A-1"},
            "qrs": [{"value": "https://example.test"}]
        }"#;
        match InboundMessage::classify(text).unwrap() {
            InboundMessage::PrintJob(req) => {
                assert_eq!(req.job_id, "J1");
                assert_eq!(req.printer_id, "P1");
                assert_eq!(req.qrs.len(), 1);
                assert!(req.images.is_empty());
                assert!(req.has_media());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_template_update() {
        let text = r#"{
            "action": "updatetemplate",
            "template": {"documentType": "KitchenOrder", "sections": []}
        }"#;
        match InboundMessage::classify(text).unwrap() {
            InboundMessage::TemplateUpdate(req) => {
                assert_eq!(req.template.document_type, "KitchenOrder");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_scale_subscription() {
        let text = r#"{"action": "UnsubscribeScale", "scaleId": "S-1"}"#;
        assert_eq!(
            InboundMessage::classify(text).unwrap(),
            InboundMessage::ScaleSubscription {
                scale_id: "S-1".to_string(),
                subscribe: false
            }
        );
    }

    #[test]
    fn test_classify_failures() {
        assert!(matches!(
            InboundMessage::classify("not json"),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            InboundMessage::classify("[1,2]"),
            Err(ClassifyError::NotAnObject)
        ));
        assert!(matches!(
            InboundMessage::classify(r#"{"action": "Reboot"}"#),
            Err(ClassifyError::UnknownAction(_))
        ));
        assert!(matches!(
            InboundMessage::classify(r#"{"hello": 1}"#),
            Err(ClassifyError::Unrecognized)
        ));
    }

    #[test]
    fn test_outbound_shapes() {
        let text = OutboundMessage::from(PrintJobResult::error("J9", "offline"))
            .to_text()
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["jobId"], "J9");
        assert_eq!(v["status"], "ERROR");
        assert_eq!(v["errorMessage"], "offline");

        let text = OutboundMessage::from(ScaleReadingMessage::new("S1", "sc", 1.5, "kg", true, 7))
            .to_text()
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["type"], "SCALE_READING");
        assert_eq!(v["scaleId"], "sc");

        let text = OutboundMessage::from(TemplateUpdateResult::new("Invoice", true, "saved"))
            .to_text()
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["action"], "TemplateUpdateResult");
        assert_eq!(v["documentType"], "Invoice");
    }
}
