//! Client protocol: WebSocket server and the events it publishes

mod events;
mod server;

pub use events::ServerEvent;
pub use server::{HealthStatus, ProtocolServer, ServerOptions, ServerPhase};
