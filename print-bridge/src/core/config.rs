use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// 桥接服务配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (模板、打印机、秤配置、日志) |
/// | WS_HOST | 127.0.0.1 | WebSocket 监听地址 |
/// | WS_PORT | 9310 | WebSocket 端口 |
/// | WS_PATH | /ws | WebSocket 路径 |
/// | STATION_ID | station-1 | 站点标识 (写入秤读数消息) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | LOG_TO_FILE | false | 写入 `<WORK_DIR>/logs` |
/// | SCALE_MONITOR_INTERVAL_MS | 2000 | 秤发现与健康检查间隔 |
/// | SCALE_CONFIG_REFRESH_MS | 5000 | 秤配置缓存刷新间隔 |
/// | PRINT_TIMEOUT_MS | 5000 | 打印机连接/发送超时 |
/// | QUEUE_CAPACITY | 256 | 入站消息队列容量 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/var/lib/print-bridge WS_PORT=9400 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    pub ws_host: String,
    pub ws_port: u16,
    pub ws_path: String,
    /// 站点标识
    pub station_id: String,
    pub log_level: String,
    pub log_json: bool,
    pub log_to_file: bool,
    pub scale_monitor_interval_ms: u64,
    pub scale_config_refresh_ms: u64,
    pub print_timeout_ms: u64,
    pub queue_capacity: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let ws_path = std::env::var("WS_PATH").unwrap_or_else(|_| "/ws".into());
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            ws_host: std::env::var("WS_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            ws_port: env_or("WS_PORT", 9310),
            ws_path: normalize_path(&ws_path),
            station_id: std::env::var("STATION_ID").unwrap_or_else(|_| "station-1".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            log_to_file: env_or("LOG_TO_FILE", false),
            scale_monitor_interval_ms: env_or("SCALE_MONITOR_INTERVAL_MS", 2000),
            scale_config_refresh_ms: env_or("SCALE_CONFIG_REFRESH_MS", 5000),
            print_timeout_ms: env_or("PRINT_TIMEOUT_MS", 5000),
            queue_capacity: env_or("QUEUE_CAPACITY", 256usize).max(1),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景 (端口 0 = 随机端口)
    pub fn with_overrides(work_dir: impl Into<String>, ws_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.ws_host = "127.0.0.1".into();
        config.ws_port = ws_port;
        config
    }

    /// WebSocket 监听地址
    pub fn ws_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.ws_host, self.ws_port).parse()
    }

    pub fn work_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.work_path().join("logs")
    }

    pub fn scale_monitor_interval(&self) -> Duration {
        Duration::from_millis(self.scale_monitor_interval_ms.max(100))
    }

    pub fn scale_config_refresh(&self) -> Duration {
        Duration::from_millis(self.scale_config_refresh_ms.max(100))
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_millis(self.print_timeout_ms.max(100))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("ws"), "/ws");
        assert_eq!(normalize_path("/bridge/"), "/bridge");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_overrides() {
        let config = Config::with_overrides("/tmp/pb", 0);
        assert_eq!(config.work_dir, "/tmp/pb");
        assert_eq!(config.ws_addr().unwrap().port(), 0);
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/pb/logs"));
    }
}
