//! Printer adapters for sending raw command data
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - IPP printers (`ipp://`, `ipps://`) and raw HTTP POST endpoints
//! - Local spooler queues (`lp -d NAME -o raw`)

use crate::error::{PrintError, PrintResult};
use crate::ipp;
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Trait for printer adapters
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw command data to the printer
    async fn print(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

// ============================================================================
// Network (TCP 9100)
// ============================================================================

/// Network printer (TCP port 9100)
///
/// Most receipt printers support raw TCP printing on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
    timeout: Duration,
    retries: u32,
}

impl NetworkPrinter {
    pub const DEFAULT_PORT: u16 = 9100;

    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(PrintError::InvalidConfig("Empty printer host".to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            timeout: Duration::from_secs(5),
            retries: 2,
        })
    }

    /// Create from `ip[:port]` (port defaults to 9100)
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr = addr.trim();
        if let Ok(sock) = addr.parse::<SocketAddr>() {
            return Self::new(&sock.ip().to_string(), sock.port());
        }
        if let Ok(ip) = addr.parse::<IpAddr>() {
            return Self::new(&ip.to_string(), Self::DEFAULT_PORT);
        }
        match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;
                Self::new(host, port)
            }
            None => Self::new(addr, Self::DEFAULT_PORT),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Additional attempts after a failed connect
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> PrintResult<TcpStream> {
        tokio::time::timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr())))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr(), e)))
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(self, data), fields(addr = %self.addr(), data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let mut attempt = 0;
        let mut stream = loop {
            match self.connect().await {
                Ok(stream) => break stream,
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "Connect failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        };

        debug!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.addr())))??;

        info!("Print job sent");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr()))]
    async fn is_online(&self) -> bool {
        let check_timeout = Duration::from_millis(500);

        match tokio::time::timeout(check_timeout, TcpStream::connect((self.host.as_str(), self.port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

// ============================================================================
// IPP / HTTP
// ============================================================================

static IPP_REQUEST_ID: AtomicU32 = AtomicU32::new(1);

/// Printer reached over HTTP: IPP `Print-Job` or a raw POST endpoint
#[derive(Debug, Clone)]
pub struct HttpPrinter {
    /// Target as configured (`ipp://...` or `http(s)://...`)
    uri: String,
    /// URL the body is POSTed to
    url: String,
    ipp: bool,
    client: reqwest::Client,
}

impl HttpPrinter {
    pub fn new(uri: &str, timeout: Duration) -> PrintResult<Self> {
        let uri = uri.trim();
        let lower = uri.to_ascii_lowercase();
        let ipp = lower.starts_with("ipp://") || lower.starts_with("ipps://");
        let url = if ipp {
            ipp::http_url(uri)?
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            uri.to_string()
        } else {
            return Err(PrintError::InvalidConfig(format!("Unsupported URI: {}", uri)));
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| PrintError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            uri: uri.to_string(),
            url,
            ipp,
            client,
        })
    }

    pub fn is_ipp(&self) -> bool {
        self.ipp
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Printer for HttpPrinter {
    #[instrument(skip(self, data), fields(url = %self.url, ipp = self.ipp, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let (content_type, body) = if self.ipp {
            let request_id = IPP_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
            let job_name = format!("print-bridge-{}", request_id);
            (
                ipp::CONTENT_TYPE,
                ipp::encode_print_job(&self.uri, &job_name, request_id, data),
            )
        } else {
            ("application/octet-stream", data.to_vec())
        };

        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PrintError::Http(format!("{} returned {}", self.url, status)));
        }

        if self.ipp {
            let bytes = resp.bytes().await?;
            ipp::check_response(&bytes)?;
        }

        info!("Print job sent");
        Ok(())
    }

    async fn is_online(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Printer offline");
                false
            }
        }
    }
}

// ============================================================================
// Local spooler
// ============================================================================

/// Local print queue, fed through `lp -d NAME -o raw`
#[derive(Debug, Clone)]
pub struct SpoolerPrinter {
    queue: String,
    timeout: Duration,
}

impl SpoolerPrinter {
    pub fn new(queue: &str) -> PrintResult<Self> {
        let queue = queue.trim();
        if queue.is_empty() {
            return Err(PrintError::InvalidConfig("Empty queue name".to_string()));
        }
        Ok(Self {
            queue: queue.to_string(),
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl Printer for SpoolerPrinter {
    #[instrument(skip(self, data), fields(queue = %self.queue, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let mut child = Command::new("lp")
            .args(["-d", &self.queue, "-o", "raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PrintError::Spooler(format!("Failed to run lp: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).await?;
            stdin.shutdown().await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PrintError::Timeout(format!("lp did not finish for {}", self.queue)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PrintError::Spooler(format!(
                "lp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        info!("Print job queued");
        Ok(())
    }

    async fn is_online(&self) -> bool {
        Command::new("lpstat")
            .args(["-p", &self.queue])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

// ============================================================================
// Target dispatch
// ============================================================================

/// Printer selected from a connection target string
#[derive(Debug, Clone)]
pub enum PrinterTarget {
    Network(NetworkPrinter),
    Http(HttpPrinter),
    Spooler(SpoolerPrinter),
}

impl PrinterTarget {
    /// Pick the adapter for a connection target:
    /// `ipp(s)://` and `http(s)://` URIs, `ip[:port]`, else a spooler queue
    pub fn parse(target: &str, timeout: Duration) -> PrintResult<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(PrintError::InvalidConfig("Empty connection target".to_string()));
        }

        let lower = target.to_ascii_lowercase();
        if ["ipp://", "ipps://", "http://", "https://"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            return Ok(PrinterTarget::Http(HttpPrinter::new(target, timeout)?));
        }

        if looks_like_address(target) {
            let printer = NetworkPrinter::from_addr(target)?.with_timeout(timeout);
            return Ok(PrinterTarget::Network(printer));
        }

        Ok(PrinterTarget::Spooler(
            SpoolerPrinter::new(target)?.with_timeout(timeout),
        ))
    }
}

/// IP literal, socket address, or `host:port` with a numeric port
fn looks_like_address(target: &str) -> bool {
    if target.parse::<SocketAddr>().is_ok() || target.parse::<IpAddr>().is_ok() {
        return true;
    }
    match target.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && host
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        }
        None => false,
    }
}

impl Printer for PrinterTarget {
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        match self {
            PrinterTarget::Network(p) => p.print(data).await,
            PrinterTarget::Http(p) => p.print(data).await,
            PrinterTarget::Spooler(p) => p.print(data).await,
        }
    }

    async fn is_online(&self) -> bool {
        match self {
            PrinterTarget::Network(p) => p.is_online().await,
            PrinterTarget::Http(p) => p.is_online().await,
            PrinterTarget::Spooler(p) => p.is_online().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const T: Duration = Duration::from_secs(1);

    #[test]
    fn test_target_parse() {
        match PrinterTarget::parse("192.168.1.50", T).unwrap() {
            PrinterTarget::Network(p) => assert_eq!(p.addr(), "192.168.1.50:9100"),
            other => panic!("unexpected {:?}", other),
        }
        match PrinterTarget::parse("10.0.0.2:9101", T).unwrap() {
            PrinterTarget::Network(p) => assert_eq!(p.addr(), "10.0.0.2:9101"),
            other => panic!("unexpected {:?}", other),
        }
        match PrinterTarget::parse("ipp://printer.local/ipp/print", T).unwrap() {
            PrinterTarget::Http(p) => {
                assert!(p.is_ipp());
                assert_eq!(p.url(), "http://printer.local:631/ipp/print");
            }
            other => panic!("unexpected {:?}", other),
        }
        match PrinterTarget::parse("https://print.example/raw", T).unwrap() {
            PrinterTarget::Http(p) => assert!(!p.is_ipp()),
            other => panic!("unexpected {:?}", other),
        }
        match PrinterTarget::parse("Kitchen_Epson", T).unwrap() {
            PrinterTarget::Spooler(p) => assert_eq!(p.queue(), "Kitchen_Epson"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(PrinterTarget::parse("  ", T).is_err());
    }

    #[tokio::test]
    async fn test_network_print_delivers_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        printer.print(&[0x1B, 0x40, b'h', b'i']).await.unwrap();

        assert_eq!(server.await.unwrap(), vec![0x1B, 0x40, b'h', b'i']);
    }

    #[tokio::test]
    async fn test_network_print_unreachable_is_error() {
        // bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let printer = NetworkPrinter::from_addr(&addr.to_string())
            .unwrap()
            .with_retries(0)
            .with_timeout(Duration::from_millis(300));
        assert!(printer.print(b"x").await.is_err());
        assert!(!printer.is_online().await);
    }
}
