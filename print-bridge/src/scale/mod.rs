//! 电子秤采集
//!
//! - [`backend`]: 串口访问抽象 (便于测试替换)
//! - [`parser`]: 读数行解析
//! - [`ScaleManager`]: 端口发现、健康检查、读数事件
//! - [`ScaleConfigCache`]: 秤配置内存快照
//! - [`ScaleForwarder`]: 读数推送到客户端

pub mod backend;
mod cache;
mod forwarder;
mod manager;
pub mod parser;

pub use backend::{SerialBackend, SerialLink, SystemSerial};
pub use cache::ScaleConfigCache;
pub use forwarder::ScaleForwarder;
pub use manager::{ScaleEvent, ScaleManager};
