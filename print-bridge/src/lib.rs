//! Print Bridge
//!
//! Local print-job bridge: accepts JSON print jobs from one WebSocket
//! client, renders them through document templates into ESC/POS (thermal)
//! or ESC/P (dot-matrix) command bytes, delivers them to printers and
//! streams live weighing-scale readings back over the same connection.
//!
//! # 模块结构
//!
//! ```text
//! print-bridge/
//! ├── core/       # 配置、应用状态、后台任务
//! ├── message/    # WebSocket 协议服务器与事件
//! ├── printing/   # 指令生成、打印编排、投递
//! ├── scale/      # 电子秤采集
//! ├── storage/    # 打印机 / 模板 / 秤配置存储
//! ├── template/   # 路径解析、模板渲染、内置模板
//! └── utils/      # 错误类型、日志
//! ```

pub mod core;
pub mod message;
pub mod printing;
pub mod scale;
pub mod storage;
pub mod template;
pub mod utils;

// Re-exports
pub use core::{AppState, BackgroundTasks, Config, TaskKind};
pub use message::{ProtocolServer, ServerEvent, ServerOptions, ServerPhase};
pub use printing::{PrintDelivery, PrintOrchestrator};
pub use scale::{ScaleManager, SerialBackend};
pub use storage::{RecordStore, Stores};
pub use utils::{AppError, AppResult};

/// 按配置初始化日志 (控制台，可选文件)
pub fn setup_environment(config: &Config) -> anyhow::Result<()> {
    let log_dir = config.logs_dir().to_string_lossy().into_owned();
    utils::logger::init_logger_with_file(
        &config.log_level,
        config.log_json,
        config.log_to_file.then_some(log_dir.as_str()),
    )
}
