//! Server events published to in-process subscribers

use shared::message::{PrintJobRequest, TemplateUpdateRequest};
use std::net::SocketAddr;
use std::sync::Arc;

/// Event emitted by the protocol server
///
/// Payloads are behind `Arc` so fan-out to several subscribers stays cheap.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connected {
        connection_id: String,
        peer: SocketAddr,
    },
    Disconnected {
        connection_id: String,
    },
    PrintRequested {
        connection_id: String,
        request: Arc<PrintJobRequest>,
    },
    TemplateUpdateRequested {
        connection_id: String,
        request: Arc<TemplateUpdateRequest>,
    },
    ScaleSubscription {
        connection_id: String,
        scale_id: String,
        subscribe: bool,
    },
}

impl ServerEvent {
    pub fn connection_id(&self) -> &str {
        match self {
            ServerEvent::Connected { connection_id, .. }
            | ServerEvent::Disconnected { connection_id }
            | ServerEvent::PrintRequested { connection_id, .. }
            | ServerEvent::TemplateUpdateRequested { connection_id, .. }
            | ServerEvent::ScaleSubscription { connection_id, .. } => connection_id,
        }
    }

    /// Print and template work for the orchestrator
    pub fn is_job(&self) -> bool {
        matches!(
            self,
            ServerEvent::PrintRequested { .. } | ServerEvent::TemplateUpdateRequested { .. }
        )
    }

    /// Events that change per-connection scale interest
    pub fn is_scale_interest(&self) -> bool {
        matches!(
            self,
            ServerEvent::ScaleSubscription { .. } | ServerEvent::Disconnected { .. }
        )
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Disconnected { .. } => "disconnected",
            ServerEvent::PrintRequested { .. } => "print_requested",
            ServerEvent::TemplateUpdateRequested { .. } => "template_update_requested",
            ServerEvent::ScaleSubscription { .. } => "scale_subscription",
        }
    }
}
