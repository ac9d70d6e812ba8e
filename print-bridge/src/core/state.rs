//! 应用状态与启动编排

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::config::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::message::{ProtocolServer, ServerEvent, ServerOptions};
use crate::printing::{PrintDelivery, PrintOrchestrator, TransportDelivery};
use crate::scale::{ScaleConfigCache, ScaleForwarder, ScaleManager, SerialBackend, SystemSerial};
use crate::storage::Stores;
use crate::template::TemplateService;
use crate::utils::{AppError, AppResult, logger};

/// 后台任务关闭宽限期
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const LOG_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// 应用状态 - 持有所有服务的共享引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | stores | 打印机 / 模板 / 秤配置存储 |
/// | templates | 模板查找 (内置模板回退) |
/// | server | WebSocket 协议服务器 |
/// | orchestrator | 打印编排器 |
/// | scales | 电子秤采集管理器 |
/// | scale_configs | 秤配置缓存 |
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub templates: TemplateService,
    pub server: ProtocolServer,
    pub orchestrator: Arc<PrintOrchestrator>,
    pub scales: ScaleManager,
    pub scale_configs: ScaleConfigCache,
}

impl AppState {
    /// 初始化应用状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录下的 JSON 存储
    /// 2. 内置模板写入
    /// 3. 各服务 (打印、协议服务器、秤)
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let stores = Stores::open(config.work_path())?;
        let delivery = Arc::new(TransportDelivery::new(config.print_timeout()));
        Self::with_parts(config, stores, delivery, Arc::new(SystemSerial)).await
    }

    /// 使用给定的存储、打印投递与串口后端构造 (测试可替换)
    pub async fn with_parts(
        config: &Config,
        stores: Stores,
        delivery: Arc<dyn PrintDelivery>,
        serial: Arc<dyn SerialBackend>,
    ) -> AppResult<Self> {
        let templates = TemplateService::new(stores.templates.clone());
        match templates.ensure_defaults().await {
            Ok(0) => {}
            Ok(added) => info!(added, "Built-in templates stored"),
            Err(e) => warn!(error = %e, "Failed to store built-in templates"),
        }

        let server = ProtocolServer::new(ServerOptions::from_config(config)?);
        let orchestrator = Arc::new(PrintOrchestrator::new(
            stores.settings.clone(),
            templates.clone(),
            delivery,
        ));

        Ok(Self {
            config: config.clone(),
            scale_configs: ScaleConfigCache::new(stores.scales.clone()),
            scales: ScaleManager::new(serial),
            stores,
            templates,
            server,
            orchestrator,
        })
    }

    /// 启动后台任务与协议服务器
    ///
    /// 事件订阅在服务器启动前完成，不会丢失第一条消息。
    pub async fn start(&self) -> AppResult<(SocketAddr, BackgroundTasks)> {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();

        if let Err(e) = self.scale_configs.refresh().await {
            warn!(error = %e, "Initial scale config load failed");
        }

        tasks.spawn(
            "print_orchestrator",
            TaskKind::Worker,
            self.orchestrator.clone().run(
                self.server.queue(self.config.queue_capacity, ServerEvent::is_job),
                self.server.clone(),
                token.clone(),
            ),
        );

        let forwarder = ScaleForwarder::new(
            self.scales.clone(),
            self.server.clone(),
            self.config.station_id.clone(),
        );
        tasks.spawn(
            "scale_forwarder",
            TaskKind::Listener,
            forwarder.run(
                self.server
                    .queue(self.config.queue_capacity, ServerEvent::is_scale_interest),
                self.scales.subscribe(),
                token.clone(),
            ),
        );

        tasks.spawn(
            "scale_monitor",
            TaskKind::Periodic,
            self.scales.clone().run_monitor(
                self.scale_configs.clone(),
                self.config.scale_monitor_interval(),
                token.clone(),
            ),
        );

        tasks.spawn(
            "scale_config_refresh",
            TaskKind::Periodic,
            self.scale_configs
                .clone()
                .run_refresh(self.config.scale_config_refresh(), token.clone()),
        );

        if self.config.log_to_file {
            let logs_dir = self.config.logs_dir();
            let cleanup_token = token.clone();
            tasks.spawn("log_cleanup", TaskKind::Periodic, async move {
                logger::periodic_cleanup(logs_dir, LOG_CLEANUP_INTERVAL, cleanup_token).await;
            });
        }

        let addr = match self.server.start().await {
            Ok(addr) => addr,
            Err(e) => {
                tasks.shutdown(SHUTDOWN_GRACE).await;
                return Err(e);
            }
        };
        tasks.log_summary();
        Ok((addr, tasks))
    }

    /// 停止顺序: 协议服务器 (不再接收新任务) -> 后台任务
    pub async fn shutdown(&self, tasks: BackgroundTasks) {
        self.server.stop().await;
        tasks.shutdown(SHUTDOWN_GRACE).await;
    }

    /// 运行直到 Ctrl+C
    pub async fn run(&self) -> AppResult<()> {
        let (addr, tasks) = self.start().await?;
        info!(%addr, path = %self.config.ws_path, "Print bridge ready");

        let signal = tokio::signal::ctrl_c().await;
        if let Err(e) = signal {
            self.shutdown(tasks).await;
            return Err(AppError::internal(format!("Failed to listen for shutdown signal: {}", e)));
        }

        info!("Shutting down...");
        self.shutdown(tasks).await;
        Ok(())
    }
}
