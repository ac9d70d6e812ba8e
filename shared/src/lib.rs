//! Shared types for the print bridge
//!
//! Template, rendered-document, printer and scale models plus the wire
//! messages exchanged with the protocol client.

pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{InboundMessage, OutboundMessage};
