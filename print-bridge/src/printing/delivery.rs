//! Raw byte delivery to printers

use async_trait::async_trait;
use shared::models::PrinterSettings;
use std::time::Duration;
use ticket_printer::{PrintResult, Printer, PrinterTarget};
use tracing::{debug, instrument};

/// Sends generated command bytes to the printer a settings record points at
#[async_trait]
pub trait PrintDelivery: Send + Sync {
    async fn send(&self, settings: &PrinterSettings, bytes: &[u8]) -> PrintResult<()>;
}

/// Delivery over the transport named by `connectionTarget`
/// (TCP 9100, IPP / HTTP POST, local spooler queue)
#[derive(Debug, Clone)]
pub struct TransportDelivery {
    timeout: Duration,
}

impl TransportDelivery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PrintDelivery for TransportDelivery {
    #[instrument(skip(self, settings, bytes), fields(printer_id = %settings.printer_id, bytes = bytes.len()))]
    async fn send(&self, settings: &PrinterSettings, bytes: &[u8]) -> PrintResult<()> {
        let target = PrinterTarget::parse(&settings.connection_target, self.timeout)?;
        debug!(target = ?target, "Delivering print data");
        target.print(bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_delivers_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let settings = PrinterSettings::new("P1", &addr.to_string());
        TransportDelivery::new(Duration::from_secs(1))
            .send(&settings, b"\x1B@hello")
            .await
            .unwrap();
        assert_eq!(server.await.unwrap(), b"\x1B@hello");
    }

    #[tokio::test]
    async fn test_empty_target_is_error() {
        let settings = PrinterSettings::new("P1", "  ");
        let result = TransportDelivery::new(Duration::from_millis(100))
            .send(&settings, b"x")
            .await;
        assert!(result.is_err());
    }
}
