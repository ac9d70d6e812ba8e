//! Scale acquisition
//!
//! One reader worker per open port, a monitor pass that opens, heals and
//! closes ports against the configured scales, and reference-counted
//! listener interest that gates parsing.

use parking_lot::Mutex;
use shared::models::{ScaleConfig, ScaleRuntimeState, ScaleStatus, normalize_scale_id};
use shared::util::now_millis;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::backend::{SerialBackend, SerialLink, is_idle};
use super::cache::ScaleConfigCache;
use super::parser::{ScaleReading, parse_reading};

const EVENT_CAPACITY: usize = 256;
const READ_BUFFER: usize = 256;
/// Unterminated input beyond this is dropped
const MAX_PENDING: usize = 1024;

/// Weight change on one scale
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleEvent {
    /// Normalized scale id
    pub scale_id: String,
    pub weight: f64,
    pub unit: String,
    pub stable: bool,
    /// Unix millis
    pub timestamp: i64,
}

/// A port owned by one scale
struct OpenPort {
    config: ScaleConfig,
    port_name: String,
    /// Second handle used by the health check
    probe: Box<dyn SerialLink>,
    generation: u64,
    stop: Arc<AtomicBool>,
}

impl OpenPort {
    fn close(self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

struct Inner {
    backend: Arc<dyn SerialBackend>,
    ports: Mutex<HashMap<String, OpenPort>>,
    statuses: Mutex<HashMap<String, ScaleRuntimeState>>,
    listeners: Mutex<HashMap<String, usize>>,
    events: broadcast::Sender<ScaleEvent>,
    readers: TaskTracker,
    next_generation: AtomicU64,
}

impl Inner {
    fn set_status(&self, key: &str, status: ScaleStatus, port: Option<&str>, error: Option<String>) {
        let mut statuses = self.statuses.lock();
        let state = statuses.entry(key.to_string()).or_default();
        state.status = status;
        state.port_name = port.map(str::to_string);
        state.last_error = error;
    }

    fn listener_count(&self, key: &str) -> usize {
        self.listeners.lock().get(key).copied().unwrap_or(0)
    }

    fn emit(&self, key: &str, reading: &ScaleReading) {
        debug!(scale_id = %key, weight = reading.weight, stable = reading.stable, "Scale reading");
        // No receivers is not an error
        let _ = self.events.send(ScaleEvent {
            scale_id: key.to_string(),
            weight: reading.weight,
            unit: reading.unit.clone(),
            stable: reading.stable,
            timestamp: now_millis(),
        });
    }

    /// Reader hit a hard I/O error; drop its port if it still owns it
    fn reader_failed(&self, key: &str, generation: u64, e: &io::Error) {
        let removed = {
            let mut ports = self.ports.lock();
            match ports.get(key) {
                Some(port) if port.generation == generation => ports.remove(key),
                _ => None,
            }
        };
        if let Some(port) = removed {
            warn!(scale_id = %key, port = %port.port_name, error = %e, "Scale port read failed");
            port.close();
            self.set_status(key, ScaleStatus::Error, None, Some(e.to_string()));
        }
    }
}

/// 电子秤采集管理器
///
/// 职责:
/// - 按配置打开串口，失败时探测未占用的串口
/// - 周期性健康检查，故障端口关闭并标记 `Error`，下次自动重连
/// - 无监听者时只排空数据不解析
#[derive(Clone)]
pub struct ScaleManager {
    inner: Arc<Inner>,
}

impl ScaleManager {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend,
                ports: Mutex::new(HashMap::new()),
                statuses: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                events,
                readers: TaskTracker::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScaleEvent> {
        self.inner.events.subscribe()
    }

    // ==================== Listeners ====================

    /// Register interest in a scale; returns the new count
    pub fn add_listener(&self, scale_id: &str) -> usize {
        let key = normalize_scale_id(scale_id);
        let mut listeners = self.inner.listeners.lock();
        let count = listeners.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one registration; returns the remaining count
    pub fn remove_listener(&self, scale_id: &str) -> usize {
        let key = normalize_scale_id(scale_id);
        let mut listeners = self.inner.listeners.lock();
        match listeners.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            Some(_) => {
                listeners.remove(&key);
                0
            }
            None => 0,
        }
    }

    pub fn listener_count(&self, scale_id: &str) -> usize {
        self.inner.listener_count(&normalize_scale_id(scale_id))
    }

    // ==================== Status ====================

    pub fn status(&self, scale_id: &str) -> ScaleRuntimeState {
        let key = normalize_scale_id(scale_id);
        let mut state = self
            .inner
            .statuses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_default();
        state.listener_count = self.inner.listener_count(&key);
        state
    }

    pub fn statuses(&self) -> HashMap<String, ScaleRuntimeState> {
        let mut all = self.inner.statuses.lock().clone();
        for (key, state) in all.iter_mut() {
            state.listener_count = self.inner.listener_count(key);
        }
        all
    }

    pub fn open_count(&self) -> usize {
        self.inner.ports.lock().len()
    }

    // ==================== Monitor ====================

    /// One discovery and health pass against the configured scales
    ///
    /// Blocking: opens and probes serial ports. Run it off the async
    /// workers.
    pub fn sync(&self, configs: &[ScaleConfig]) {
        let active: HashMap<String, &ScaleConfig> = configs
            .iter()
            .filter(|c| c.is_active && !c.key().is_empty())
            .map(|c| (c.key(), c))
            .collect();

        self.close_stale(&active);
        self.check_health();
        self.open_missing(&active);
    }

    /// Close ports whose scale was removed, deactivated or reconfigured
    fn close_stale(&self, active: &HashMap<String, &ScaleConfig>) {
        let stale: Vec<(String, OpenPort)> = {
            let mut ports = self.inner.ports.lock();
            let keys: Vec<String> = ports
                .iter()
                .filter(|(key, port)| active.get(*key).is_none_or(|c| **c != port.config))
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| ports.remove(&key).map(|p| (key, p)))
                .collect()
        };

        for (key, port) in stale {
            info!(scale_id = %key, port = %port.port_name, "Closing scale port");
            port.close();
            self.inner.set_status(&key, ScaleStatus::Disconnected, None, None);
        }

        let mut statuses = self.inner.statuses.lock();
        for (key, state) in statuses.iter_mut() {
            if !active.contains_key(key) && state.status != ScaleStatus::Disconnected {
                state.status = ScaleStatus::Disconnected;
                state.port_name = None;
            }
        }
    }

    fn check_health(&self) {
        let keys: Vec<String> = self.inner.ports.lock().keys().cloned().collect();
        for key in keys {
            let failed = {
                let mut ports = self.inner.ports.lock();
                let probe = ports.get(&key).map(|p| p.probe.probe());
                match probe {
                    Some(Err(e)) => ports.remove(&key).map(|p| (p, e)),
                    _ => None,
                }
            };
            if let Some((port, e)) = failed {
                warn!(scale_id = %key, port = %port.port_name, error = %e, "Scale port health check failed");
                port.close();
                self.inner
                    .set_status(&key, ScaleStatus::Error, None, Some(e.to_string()));
            }
        }
    }

    /// Configured ports first for every missing scale, then discovered
    /// ports no other scale holds
    fn open_missing(&self, active: &HashMap<String, &ScaleConfig>) {
        let missing: Vec<&ScaleConfig> = {
            let ports = self.inner.ports.lock();
            active
                .iter()
                .filter(|(key, _)| !ports.contains_key(*key))
                .map(|(_, c)| *c)
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        let mut unresolved = Vec::new();
        for config in missing {
            let port_name = config.port_name.trim();
            if port_name.is_empty() || self.is_claimed(port_name) {
                unresolved.push((config, None));
                continue;
            }
            match self.inner.backend.open(config, port_name) {
                Ok(link) => self.attach(config, port_name.to_string(), link),
                Err(e) => unresolved.push((config, Some(e))),
            }
        }
        if unresolved.is_empty() {
            return;
        }

        let discovered = match self.inner.backend.available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!(error = %e, "Serial port discovery failed");
                Vec::new()
            }
        };

        for (config, open_error) in unresolved {
            let key = config.key();
            let found = discovered
                .iter()
                .filter(|name| !name.eq_ignore_ascii_case(config.port_name.trim()))
                .filter(|name| !self.is_claimed(name))
                .find_map(|name| {
                    self.inner
                        .backend
                        .open(config, name)
                        .ok()
                        .map(|link| (name.clone(), link))
                });

            match found {
                Some((port_name, link)) => {
                    info!(scale_id = %key, port = %port_name, "Scale found on discovered port");
                    self.attach(config, port_name, link);
                }
                None => {
                    let reason = open_error.map(|e| e.to_string()).unwrap_or_else(|| {
                        format!("No serial port available for scale {}", config.id)
                    });
                    debug!(scale_id = %key, error = %reason, "Scale not available");
                    self.inner
                        .set_status(&key, ScaleStatus::Error, None, Some(reason));
                }
            }
        }
    }

    fn is_claimed(&self, port_name: &str) -> bool {
        self.inner
            .ports
            .lock()
            .values()
            .any(|p| p.port_name.eq_ignore_ascii_case(port_name))
    }

    fn attach(&self, config: &ScaleConfig, port_name: String, link: Box<dyn SerialLink>) {
        let key = config.key();
        let probe = match link.try_clone() {
            Ok(probe) => probe,
            Err(e) => {
                warn!(scale_id = %key, port = %port_name, error = %e, "Failed to clone scale port");
                self.inner
                    .set_status(&key, ScaleStatus::Error, None, Some(e.to_string()));
                return;
            }
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(AtomicBool::new(false));
        self.inner.ports.lock().insert(
            key.clone(),
            OpenPort {
                config: config.clone(),
                port_name: port_name.clone(),
                probe,
                generation,
                stop: stop.clone(),
            },
        );
        self.inner
            .set_status(&key, ScaleStatus::Connected, Some(port_name.as_str()), None);
        info!(scale_id = %key, port = %port_name, "Scale connected");

        let inner = self.inner.clone();
        self.inner
            .readers
            .spawn_blocking(move || read_port(inner, key, generation, link, stop));
    }

    /// Monitor loop: every tick, sync against the latest cached config
    pub async fn run_monitor(
        self,
        cache: ScaleConfigCache,
        interval: Duration,
        token: CancellationToken,
    ) {
        self.inner.readers.reopen();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let configs = cache.snapshot().await;
            let manager = self.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || manager.sync(&configs)).await {
                error!(error = %e, "Scale monitor pass failed");
            }
        }

        self.shutdown().await;
        info!("Scale monitor stopped");
    }

    /// Close every port and wait for the readers to exit
    pub async fn shutdown(&self) {
        let ports: Vec<(String, OpenPort)> = self.inner.ports.lock().drain().collect();
        for (key, port) in ports {
            port.close();
            self.inner.set_status(&key, ScaleStatus::Disconnected, None, None);
        }
        self.inner.readers.close();
        self.inner.readers.wait().await;
    }
}

/// Reader worker for one open port
fn read_port(
    inner: Arc<Inner>,
    key: String,
    generation: u64,
    mut link: Box<dyn SerialLink>,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; READ_BUFFER];
    let mut pending = LineBuffer::default();
    let mut last: Option<ScaleReading> = None;

    while !stop.load(Ordering::SeqCst) {
        let n = match link.read(&mut buf) {
            Ok(0) => {
                std::thread::sleep(Duration::from_millis(20));
                continue;
            }
            Ok(n) => n,
            Err(e) if is_idle(&e) => continue,
            Err(e) => {
                inner.reader_failed(&key, generation, &e);
                break;
            }
        };

        // Nobody listening: drain only
        if inner.listener_count(&key) == 0 {
            pending.clear();
            last = None;
            continue;
        }

        pending.push(&buf[..n]);
        while let Some(line) = pending.next_line() {
            if let Some(reading) = parse_reading(&line)
                && last.as_ref() != Some(&reading)
            {
                inner.emit(&key, &reading);
                last = Some(reading);
            }
        }
        pending.drop_overflow();
    }
    debug!(scale_id = %key, generation, "Scale reader stopped");
}

/// Raw serial bytes split into `\r` / `\n` terminated lines
///
/// Lines are decoded only once complete, so a multi-byte character split
/// across two reads survives.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| matches!(b, b'\r' | b'\n'))?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn clear(&mut self) {
        self.pending.clear();
    }

    fn drop_overflow(&mut self) {
        if self.pending.len() > MAX_PENDING {
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory serial line shared by every handle opened on it
    #[derive(Clone, Default)]
    struct FakeLine {
        queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
        broken: Arc<AtomicBool>,
    }

    impl FakeLine {
        fn feed(&self, data: &[u8]) {
            self.queue.lock().push_back(data.to_vec());
        }

        fn set_broken(&self, broken: bool) {
            self.broken.store(broken, Ordering::SeqCst);
        }
    }

    struct FakeLink(FakeLine);

    impl SerialLink for FakeLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.broken.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            match self.0.queue.lock().pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
                }
            }
        }

        fn probe(&self) -> io::Result<()> {
            if self.0.broken.load(Ordering::SeqCst) {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
            } else {
                Ok(())
            }
        }

        fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
            Ok(Box::new(FakeLink(self.0.clone())))
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        lines: Mutex<HashMap<String, FakeLine>>,
    }

    impl FakeBackend {
        fn add_port(&self, name: &str) -> FakeLine {
            let line = FakeLine::default();
            self.lines.lock().insert(name.to_string(), line.clone());
            line
        }
    }

    impl SerialBackend for FakeBackend {
        fn available_ports(&self) -> io::Result<Vec<String>> {
            let mut names: Vec<String> = self.lines.lock().keys().cloned().collect();
            names.sort();
            Ok(names)
        }

        fn open(&self, _config: &ScaleConfig, port_name: &str) -> io::Result<Box<dyn SerialLink>> {
            match self.lines.lock().get(port_name) {
                Some(line) if !line.broken.load(Ordering::SeqCst) => {
                    Ok(Box::new(FakeLink(line.clone())))
                }
                Some(_) => Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy")),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "no such port")),
            }
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<ScaleEvent>) -> Option<ScaleEvent> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .and_then(Result::ok)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[test]
    fn test_line_buffer_keeps_split_characters() {
        let mut lines = LineBuffer::default();
        lines.push(b"ST,GS,+ 2.50kg Caf\xC3");
        assert_eq!(lines.next_line(), None);
        lines.push(b"\xA9\r\nUS,");
        assert_eq!(lines.next_line().as_deref(), Some("ST,GS,+ 2.50kg Caf\u{e9}\r"));
        assert_eq!(lines.next_line().as_deref(), Some("\n"));
        assert_eq!(lines.next_line(), None);

        lines.push(&[b'9'; MAX_PENDING + 1]);
        lines.drop_overflow();
        lines.push(b"1.00kg\n");
        assert_eq!(lines.next_line().as_deref(), Some("1.00kg\n"));
    }

    #[test]
    fn test_listener_ref_counting() {
        let manager = ScaleManager::new(Arc::new(FakeBackend::default()));
        assert_eq!(manager.add_listener("Scale-A"), 1);
        assert_eq!(manager.add_listener("scale-a "), 2);
        assert_eq!(manager.listener_count("SCALE-A"), 2);
        assert_eq!(manager.remove_listener("scale-A"), 1);
        assert_eq!(manager.remove_listener("scale-a"), 0);
        assert_eq!(manager.remove_listener("scale-a"), 0);
        assert_eq!(manager.listener_count("scale-a"), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_only_with_listeners_and_on_change() {
        let backend = Arc::new(FakeBackend::default());
        let line = backend.add_port("/dev/ttyS0");
        let manager = ScaleManager::new(backend);
        let mut rx = manager.subscribe();

        manager.sync(&[ScaleConfig::new("Scale-A", "/dev/ttyS0")]);
        assert_eq!(manager.status("scale-a").status, ScaleStatus::Connected);

        line.feed(b"ST,GS,+  9.99kg\r\n");
        settle().await;
        assert!(rx.try_recv().is_err());

        manager.add_listener("SCALE-A");
        line.feed(b"ST,GS,+  15.50kg\r\n");
        line.feed(b"ST,GS,+  15,50kg\r\n");
        line.feed(b"noise\r\nUS,GS,+  15.60kg\r\n");

        let first = next_event(&mut rx).await.unwrap();
        assert_eq!(first.scale_id, "scale-a");
        assert_eq!(first.weight, 15.50);
        assert!(first.stable);
        let second = next_event(&mut rx).await.unwrap();
        assert_eq!(second.weight, 15.60);
        assert!(!second.stable);

        manager.shutdown().await;
        assert_eq!(manager.status("scale-a").status, ScaleStatus::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_discovery_skips_claimed_ports() {
        let backend = Arc::new(FakeBackend::default());
        backend.add_port("/dev/ttyS0");
        backend.add_port("/dev/ttyS1");
        let manager = ScaleManager::new(backend);

        manager.sync(&[
            ScaleConfig::new("a", "/dev/ttyS0"),
            ScaleConfig::new("b", "/dev/missing"),
        ]);

        assert_eq!(manager.status("a").port_name.as_deref(), Some("/dev/ttyS0"));
        let b = manager.status("b");
        assert_eq!(b.status, ScaleStatus::Connected);
        assert_eq!(b.port_name.as_deref(), Some("/dev/ttyS1"));
        assert_eq!(manager.open_count(), 2);
        manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_port_is_marked_and_retried() {
        let backend = Arc::new(FakeBackend::default());
        let line = backend.add_port("COM3");
        let manager = ScaleManager::new(backend);
        let configs = [ScaleConfig::new("s1", "COM3")];

        manager.sync(&configs);
        assert_eq!(manager.status("s1").status, ScaleStatus::Connected);

        line.set_broken(true);
        settle().await;
        manager.sync(&configs);
        let state = manager.status("s1");
        assert_eq!(state.status, ScaleStatus::Error);
        assert!(state.last_error.is_some());
        assert_eq!(manager.open_count(), 0);

        line.set_broken(false);
        manager.sync(&configs);
        assert_eq!(manager.status("s1").status, ScaleStatus::Connected);
        manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deactivated_scale_is_closed() {
        let backend = Arc::new(FakeBackend::default());
        backend.add_port("COM1");
        let manager = ScaleManager::new(backend);
        let mut config = ScaleConfig::new("s1", "COM1");

        manager.sync(std::slice::from_ref(&config));
        assert_eq!(manager.open_count(), 1);

        config.is_active = false;
        manager.sync(&[config]);
        assert_eq!(manager.open_count(), 0);
        assert_eq!(manager.status("s1").status, ScaleStatus::Disconnected);
        manager.shutdown().await;
    }
}
