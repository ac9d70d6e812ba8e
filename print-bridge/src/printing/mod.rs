//! 打印模块
//!
//! - [`thermal`] ESC/POS 热敏小票
//! - [`matrix`] ESC/P 针式打印页面
//! - [`delivery`] 原始字节发送
//! - [`orchestrator`] 打印任务编排

pub mod delivery;
pub mod matrix;
mod orchestrator;
pub mod thermal;

pub use delivery::{PrintDelivery, TransportDelivery};
pub use matrix::MatrixRenderer;
pub use orchestrator::{PrintOrchestrator, generate};
pub use thermal::ThermalRenderer;
