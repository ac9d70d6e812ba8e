//! Scale readings to the protocol client
//!
//! Tracks which scales each connection subscribed to so a dropped
//! connection releases its listener interest.

use shared::message::ScaleReadingMessage;
use shared::models::normalize_scale_id;
use std::collections::HashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::manager::{ScaleEvent, ScaleManager};
use crate::message::{ProtocolServer, ServerEvent};

/// 秤读数转发器
pub struct ScaleForwarder {
    manager: ScaleManager,
    server: ProtocolServer,
    station_id: String,
    /// connection id -> scale id -> subscription count
    subscriptions: HashMap<String, HashMap<String, usize>>,
}

impl ScaleForwarder {
    pub fn new(manager: ScaleManager, server: ProtocolServer, station_id: impl Into<String>) -> Self {
        Self {
            manager,
            server,
            station_id: station_id.into(),
            subscriptions: HashMap::new(),
        }
    }

    pub fn handle_server_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::ScaleSubscription {
                connection_id,
                scale_id,
                subscribe: true,
            } => {
                let key = normalize_scale_id(scale_id);
                *self
                    .subscriptions
                    .entry(connection_id.clone())
                    .or_default()
                    .entry(key)
                    .or_insert(0) += 1;
                let count = self.manager.add_listener(scale_id);
                info!(scale_id = %scale_id, listeners = count, "Scale listener added");
            }
            ServerEvent::ScaleSubscription {
                connection_id,
                scale_id,
                subscribe: false,
            } => {
                let key = normalize_scale_id(scale_id);
                let Some(scales) = self.subscriptions.get_mut(connection_id) else {
                    return;
                };
                let Some(count) = scales.get_mut(&key) else {
                    return;
                };
                *count -= 1;
                if *count == 0 {
                    scales.remove(&key);
                }
                let remaining = self.manager.remove_listener(scale_id);
                info!(scale_id = %scale_id, listeners = remaining, "Scale listener removed");
            }
            ServerEvent::Disconnected { connection_id } => {
                if let Some(scales) = self.subscriptions.remove(connection_id) {
                    for (scale_id, count) in scales {
                        for _ in 0..count {
                            self.manager.remove_listener(&scale_id);
                        }
                    }
                    debug!(connection_id = %connection_id, "Released scale listeners");
                }
            }
            _ => {}
        }
    }

    /// Push one reading to the connected client; dropped when nobody is connected
    pub fn forward(&self, event: &ScaleEvent) -> bool {
        let message = ScaleReadingMessage::new(
            &self.station_id,
            &event.scale_id,
            event.weight,
            &event.unit,
            event.stable,
            event.timestamp,
        );
        self.server.broadcast(message)
    }

    pub async fn run(
        mut self,
        mut server_events: mpsc::Receiver<ServerEvent>,
        mut scale_events: broadcast::Receiver<ScaleEvent>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = server_events.recv() => match event {
                    Some(event) => self.handle_server_event(&event),
                    None => break,
                },
                event = scale_events.recv() => match event {
                    Ok(event) => {
                        self.forward(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Scale readings skipped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("Scale forwarder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ServerOptions;
    use crate::scale::backend::SystemSerial;
    use std::sync::Arc;

    fn forwarder() -> ScaleForwarder {
        let manager = ScaleManager::new(Arc::new(SystemSerial));
        let server = ProtocolServer::new(ServerOptions {
            addr: "127.0.0.1:0".parse().unwrap(),
            path: "/ws".into(),
            queue_capacity: 8,
        });
        ScaleForwarder::new(manager, server, "station-1")
    }

    fn subscription(connection_id: &str, scale_id: &str, subscribe: bool) -> ServerEvent {
        ServerEvent::ScaleSubscription {
            connection_id: connection_id.into(),
            scale_id: scale_id.into(),
            subscribe,
        }
    }

    #[test]
    fn test_disconnect_releases_listeners() {
        let mut fwd = forwarder();
        fwd.handle_server_event(&subscription("c1", "Scale-A", true));
        fwd.handle_server_event(&subscription("c1", "scale-a", true));
        fwd.handle_server_event(&subscription("c1", "B", true));
        assert_eq!(fwd.manager.listener_count("scale-a"), 2);

        fwd.handle_server_event(&subscription("c1", "SCALE-A", false));
        assert_eq!(fwd.manager.listener_count("scale-a"), 1);

        fwd.handle_server_event(&ServerEvent::Disconnected {
            connection_id: "c1".into(),
        });
        assert_eq!(fwd.manager.listener_count("scale-a"), 0);
        assert_eq!(fwd.manager.listener_count("b"), 0);
    }

    #[test]
    fn test_unsubscribe_without_subscription_is_ignored() {
        let mut fwd = forwarder();
        fwd.manager.add_listener("a");
        fwd.handle_server_event(&subscription("c2", "a", false));
        assert_eq!(fwd.manager.listener_count("a"), 1);
    }

    #[test]
    fn test_forward_without_connection() {
        let fwd = forwarder();
        let event = ScaleEvent {
            scale_id: "a".into(),
            weight: 1.5,
            unit: "kg".into(),
            stable: true,
            timestamp: 0,
        };
        assert!(!fwd.forward(&event));
    }
}
