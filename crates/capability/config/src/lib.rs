//! 逆变器连接配置加载。

use std::env;
use std::fmt;
use std::str::FromStr;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 线路传输方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Modbus TCP 帧
    #[default]
    Tcp,
    /// HTTP/WebSocket 隧道
    Http,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Http => "http",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" | "modbus" => Ok(TransportKind::Tcp),
            "http" | "web" => Ok(TransportKind::Http),
            _ => Err(()),
        }
    }
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub transport: TransportKind,
    pub tcp_port: u16,
    pub http_port: u16,
    pub ws_port: u16,
    pub slave_id: u8,
    pub timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("INVERTER_HOST")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("INVERTER_HOST".to_string()))?;
        let transport = read_transport("INVERTER_TRANSPORT")?;
        let tcp_port = read_u16_with_default("INVERTER_TCP_PORT", 502)?;
        let http_port = read_u16_with_default("INVERTER_HTTP_PORT", 80)?;
        let ws_port = read_u16_with_default("INVERTER_WS_PORT", 8082)?;
        let slave_id = read_u8_with_default("INVERTER_SLAVE_ID", 1)?;
        let timeout_ms = read_u64_with_default("INVERTER_TIMEOUT_MS", 10_000)?;
        let idle_timeout_ms = read_u64_with_default("INVERTER_IDLE_TIMEOUT_MS", 60_000)?;

        Ok(Self {
            host,
            transport,
            tcp_port,
            http_port,
            ws_port,
            slave_id,
            timeout_ms,
            idle_timeout_ms,
        })
    }
}

fn read_transport(key: &str) -> Result<TransportKind, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(TransportKind::default()),
        Ok(value) => value
            .parse::<TransportKind>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(TransportKind::default()),
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
