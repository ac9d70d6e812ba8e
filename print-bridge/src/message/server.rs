//! 单连接 WebSocket 协议服务器
//!
//! # 架构
//!
//! ```text
//! client ──ws──▶ reader ──▶ inbound queue (bounded) ──▶ consumer ──▶ classify
//!                                                                      │
//!                             mpsc queues (orchestrator, forwarder) + broadcast
//!                                                                      │
//! client ◀──ws── writer ◀── outbound (per connection) ◀── broadcast / send_to
//! ```
//!
//! 打印任务与秤订阅经有界 mpsc 队列送达消费者，队列满时反压入站队列，
//! 不会丢失；broadcast 只供观察者使用。
//!
//! 同一时间只允许一个客户端；第二个升级请求返回 409 并保持现有连接不变。
//! 服务器可以 `stop()` 后再次 `start()`。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use shared::message::{InboundMessage, OutboundMessage};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::events::ServerEvent;
use crate::core::Config;
use crate::utils::{AppError, AppResult};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 服务器生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerPhase {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

/// 服务器监听配置
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub addr: SocketAddr,
    /// WebSocket 路径 (以 `/` 开头)
    pub path: String,
    /// 入站消息队列容量
    pub queue_capacity: usize,
}

impl ServerOptions {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let addr = config
            .ws_addr()
            .map_err(|e| AppError::invalid(format!("Invalid listen address: {}", e)))?;
        Ok(Self {
            addr,
            path: config.ws_path.clone(),
            queue_capacity: config.queue_capacity,
        })
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub phase: ServerPhase,
    pub connected: bool,
    pub connection_id: Option<String>,
}

// ==================== 内部状态 ====================

enum Outgoing {
    Text(String),
    Close,
}

struct ActiveConnection {
    id: String,
    outbound: mpsc::UnboundedSender<Outgoing>,
}

struct InboundFrame {
    connection_id: String,
    text: String,
}

/// 单个消费者的无损事件队列
struct EventQueue {
    tx: mpsc::Sender<ServerEvent>,
    accepts: fn(&ServerEvent) -> bool,
}

struct Running {
    token: CancellationToken,
    serve: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

struct Inner {
    options: ServerOptions,
    phase: Mutex<ServerPhase>,
    local_addr: Mutex<Option<SocketAddr>>,
    /// 连接槽 (最多一个连接)
    slot: Mutex<Option<ActiveConnection>>,
    events: broadcast::Sender<ServerEvent>,
    queues: Mutex<Vec<EventQueue>>,
    /// 串行化 start / stop
    lifecycle: tokio::sync::Mutex<Option<Running>>,
    /// 连接读写任务
    connections: TaskTracker,
}

impl Inner {
    fn set_phase(&self, phase: ServerPhase) {
        *self.phase.lock() = phase;
        debug!(?phase, "Protocol server phase");
    }

    /// 先送入匹配的队列 (队列满时等待)，再广播给观察者
    async fn publish(&self, event: ServerEvent) {
        let kind = event.kind();
        let targets: Vec<mpsc::Sender<ServerEvent>> = self
            .queues
            .lock()
            .iter()
            .filter(|q| (q.accepts)(&event))
            .map(|q| q.tx.clone())
            .collect();

        let mut closed = false;
        for tx in targets {
            if tx.send(event.clone()).await.is_err() {
                debug!(event = kind, "Event queue consumer is gone");
                closed = true;
            }
        }
        if closed {
            self.queues.lock().retain(|q| !q.tx.is_closed());
        }

        if self.events.send(event).is_err() {
            debug!(event = kind, "No event subscribers");
        }
    }

    async fn dispatch(&self, frame: InboundFrame) {
        let InboundFrame {
            connection_id,
            text,
        } = frame;

        let event = match InboundMessage::classify(&text) {
            Ok(InboundMessage::PrintJob(request)) => ServerEvent::PrintRequested {
                connection_id,
                request: Arc::from(request),
            },
            Ok(InboundMessage::TemplateUpdate(request)) => ServerEvent::TemplateUpdateRequested {
                connection_id,
                request: Arc::from(request),
            },
            Ok(InboundMessage::ScaleSubscription {
                scale_id,
                subscribe,
            }) => ServerEvent::ScaleSubscription {
                connection_id,
                scale_id,
                subscribe,
            },
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Dropping inbound message");
                return;
            }
        };
        self.publish(event).await;
    }

    /// 通过连接的写任务发送；没有匹配的连接时返回 false
    fn enqueue(&self, connection_id: Option<&str>, msg: OutboundMessage) -> bool {
        let text = match msg.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                return false;
            }
        };

        let slot = self.slot.lock();
        match slot.as_ref() {
            Some(conn) if connection_id.is_none_or(|id| id == conn.id) => {
                conn.outbound.send(Outgoing::Text(text)).is_ok()
            }
            Some(conn) => {
                debug!(target_id = ?connection_id, active_id = %conn.id, "Connection is gone, dropping message");
                false
            }
            None => {
                debug!("No open connection, dropping message");
                false
            }
        }
    }
}

/// 释放连接槽 (升级失败、连接结束时)
struct SlotGuard {
    inner: Arc<Inner>,
    id: String,
    peer: SocketAddr,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = self.inner.slot.lock();
        if slot.as_ref().is_some_and(|c| c.id == self.id) {
            *slot = None;
        }
    }
}

#[derive(Clone)]
struct WsState {
    inner: Arc<Inner>,
    inbound: mpsc::Sender<InboundFrame>,
    token: CancellationToken,
}

// ==================== ProtocolServer ====================

/// 协议服务器
///
/// # 职责
///
/// - 单连接准入 (409 冲突响应)
/// - 入站消息排队、分类并作为 [`ServerEvent`] 发布
/// - 出站消息 ([`broadcast`](Self::broadcast), [`send_to`](Self::send_to))
/// - 可重复的 start / stop
#[derive(Clone)]
pub struct ProtocolServer {
    inner: Arc<Inner>,
}

impl ProtocolServer {
    pub fn new(options: ServerOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                options,
                phase: Mutex::new(ServerPhase::Stopped),
                local_addr: Mutex::new(None),
                slot: Mutex::new(None),
                events,
                queues: Mutex::new(Vec::new()),
                lifecycle: tokio::sync::Mutex::new(None),
                connections: TaskTracker::new(),
            }),
        }
    }

    /// 订阅服务器事件 (观察用，落后时会丢事件)
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    /// 注册一个无损事件队列，只接收 `accepts` 返回 true 的事件
    ///
    /// 队列满时入站消费者等待，压力沿入站队列传回客户端连接。
    /// 接收端被丢弃后队列自动注销。
    pub fn queue(
        &self,
        capacity: usize,
        accepts: fn(&ServerEvent) -> bool,
    ) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.inner.queues.lock().push(EventQueue { tx, accepts });
        rx
    }

    pub fn phase(&self) -> ServerPhase {
        *self.inner.phase.lock()
    }

    /// 实际监听地址 (端口 0 时由系统分配)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    pub fn connection_id(&self) -> Option<String> {
        self.inner.slot.lock().as_ref().map(|c| c.id.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.slot.lock().is_some()
    }

    /// 启动监听；已在运行时返回当前地址
    ///
    /// 绑定失败是唯一的致命错误。
    pub async fn start(&self) -> AppResult<SocketAddr> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if lifecycle.is_some()
            && let Some(addr) = self.local_addr()
        {
            return Ok(addr);
        }

        self.inner.set_phase(ServerPhase::Starting);
        let bound = async {
            let listener = TcpListener::bind(self.inner.options.addr).await?;
            let addr = listener.local_addr()?;
            Ok::<_, std::io::Error>((listener, addr))
        }
        .await;
        let (listener, addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.inner.set_phase(ServerPhase::Stopped);
                error!(addr = %self.inner.options.addr, error = %e, "Failed to bind protocol server");
                return Err(AppError::internal(format!(
                    "Failed to bind {}: {}",
                    self.inner.options.addr, e
                )));
            }
        };

        let token = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(self.inner.options.queue_capacity.max(1));
        self.inner.connections.reopen();

        let app = router(
            &self.inner.options.path,
            WsState {
                inner: self.inner.clone(),
                inbound: inbound_tx,
                token: token.clone(),
            },
        );

        let serve_token = token.clone();
        let serve = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(serve_token.cancelled_owned())
            .await;
            if let Err(e) = result {
                error!(error = %e, "Accept loop failed");
            }
        });
        let consumer = tokio::spawn(consume_inbound(
            self.inner.clone(),
            inbound_rx,
            token.clone(),
        ));

        *lifecycle = Some(Running {
            token,
            serve,
            consumer,
        });
        *self.inner.local_addr.lock() = Some(addr);
        self.inner.set_phase(ServerPhase::Listening);
        info!(%addr, path = %self.inner.options.path, "Protocol server listening");
        Ok(addr)
    }

    /// 停止服务器 (幂等)
    ///
    /// 以 1000 关闭码关闭当前连接，排空入站队列，等待所有任务结束。
    pub async fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            debug!("Protocol server already stopped");
            return;
        };

        self.inner.set_phase(ServerPhase::Stopping);
        if let Some(conn) = self.inner.slot.lock().take() {
            info!(connection_id = %conn.id, "Closing client connection");
            let _ = conn.outbound.send(Outgoing::Close);
        }

        running.token.cancel();
        if let Err(e) = running.serve.await {
            warn!(error = %e, "Accept loop task failed");
        }
        if let Err(e) = running.consumer.await {
            warn!(error = %e, "Inbound consumer task failed");
        }
        self.inner.connections.close();
        self.inner.connections.wait().await;

        *self.inner.local_addr.lock() = None;
        self.inner.set_phase(ServerPhase::Stopped);
        info!("Protocol server stopped");
    }

    /// 发送给当前连接；无连接时记录日志并返回 false
    pub fn broadcast(&self, msg: impl Into<OutboundMessage>) -> bool {
        self.inner.enqueue(None, msg.into())
    }

    /// 发送给指定连接；连接已不存在时记录日志并返回 false
    pub fn send_to(&self, connection_id: &str, msg: impl Into<OutboundMessage>) -> bool {
        self.inner.enqueue(Some(connection_id), msg.into())
    }
}

fn router(path: &str, state: WsState) -> Router {
    Router::new()
        .route(path, get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Handlers ====================

async fn health(State(state): State<WsState>) -> Json<HealthStatus> {
    let connection_id = state.inner.slot.lock().as_ref().map(|c| c.id.clone());
    Json(HealthStatus {
        status: "ok",
        phase: *state.inner.phase.lock(),
        connected: connection_id.is_some(),
        connection_id,
    })
}

async fn ws_handler(
    State(state): State<WsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let connection_id = shared::util::new_id();

    {
        let mut slot = state.inner.slot.lock();
        if let Some(active) = slot.as_ref() {
            warn!(%peer, active_id = %active.id, "Rejecting second connection");
            return AppError::conflict("Another client is already connected").into_response();
        }
        *slot = Some(ActiveConnection {
            id: connection_id.clone(),
            outbound: outbound_tx,
        });
    }

    let guard = SlotGuard {
        inner: state.inner.clone(),
        id: connection_id,
        peer,
    };
    let tracker = state.inner.connections.clone();
    ws.on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| {
            tracker.track_future(run_connection(state, socket, guard, outbound_rx))
        })
}

async fn run_connection(
    state: WsState,
    socket: WebSocket,
    guard: SlotGuard,
    mut outbound: mpsc::UnboundedReceiver<Outgoing>,
) {
    let connection_id = guard.id.clone();
    let (mut sink, mut stream) = socket.split();

    info!(connection_id = %connection_id, peer = %guard.peer, "Client connected");
    state
        .inner
        .publish(ServerEvent::Connected {
            connection_id: connection_id.clone(),
            peer: guard.peer,
        })
        .await;

    // 单一写任务
    let writer_id = connection_id.clone();
    let writer = state.inner.connections.spawn(async move {
        while let Some(out) = outbound.recv().await {
            match out {
                Outgoing::Text(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        debug!(connection_id = %writer_id, error = %e, "Write failed");
                        return;
                    }
                }
                Outgoing::Close => {
                    let frame = CloseFrame {
                        code: close_code::NORMAL,
                        reason: "Server stopping".into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return;
                }
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = state.token.cancelled() => break,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let frame = InboundFrame {
                        connection_id: connection_id.clone(),
                        text: text.as_str().to_owned(),
                    };
                    if state.inbound.send(frame).await.is_err() {
                        debug!(connection_id = %connection_id, "Inbound queue closed");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                    break;
                }
                // Binary, Ping, Pong
                Some(Ok(_)) => {}
            }
        }
    }

    drop(guard);
    if let Err(e) = writer.await {
        warn!(connection_id = %connection_id, error = %e, "Writer task failed");
    }
    state
        .inner
        .publish(ServerEvent::Disconnected {
            connection_id: connection_id.clone(),
        })
        .await;
    info!(connection_id = %connection_id, "Client disconnected");
}

/// 单一消费者：分类并发布；停止时排空队列
async fn consume_inbound(
    inner: Arc<Inner>,
    mut rx: mpsc::Receiver<InboundFrame>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => inner.dispatch(frame).await,
                None => break,
            }
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(frame) = rx.recv().await {
        inner.dispatch(frame).await;
        drained += 1;
    }
    debug!(drained, "Inbound consumer stopped");
}
