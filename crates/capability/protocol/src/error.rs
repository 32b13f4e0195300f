//! 协议错误类型定义

use domain::ModbusException;
use std::io;

/// 协议通信错误
///
/// 分两类：
/// - [`ProtocolError::Exception`]：设备显式拒绝请求，调用方可继续读取下一个寄存器
/// - 其余变体：传输故障，整个读取周期应中止
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 设备返回的 Modbus 异常
    #[error("modbus {0}")]
    Exception(#[from] ModbusException),

    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 帧格式错误
    #[error("frame error: {0}")]
    Frame(String),

    /// HTTP 错误
    #[error("http error: {0}")]
    Http(String),

    /// WebSocket 错误
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// JSON 解析错误
    #[error("json error: {0}")]
    Json(String),

    /// 十六进制载荷解析错误
    #[error("hex error: {0}")]
    Hex(String),

    /// 隧道接口返回非成功结果码
    #[error("{message} ({code})")]
    Vendor { code: i64, message: String },

    /// 认证失败（未取得会话令牌）
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

impl ProtocolError {
    /// 是否为设备异常（非致命）。
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_))
    }

    /// 是否为认证失败（需要重新建立会话）。
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

impl ProtocolError {
    /// 还原经 IO 错误转交的协议错误；普通 IO 错误保持为 [`ProtocolError::Io`]。
    pub(crate) fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<ProtocolError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(protocol) = inner.downcast::<ProtocolError>() {
                    return *protocol;
                }
            }
            return Self::Frame("lost transport error".to_string());
        }
        Self::Io(err)
    }

    /// Modbus 客户端库错误 → 协议错误
    pub(crate) fn from_modbus(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(err) => Self::from_io(err),
            other => Self::Frame(other.to_string()),
        }
    }
}

/// 线路传输在 `Client::call` 中产生的故障，经 IO 错误交给客户端库，
/// 由 [`ProtocolError::from_modbus`] 原样取回。
impl From<ProtocolError> for tokio_modbus::Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(err) => tokio_modbus::Error::Transport(err),
            other => tokio_modbus::Error::Transport(io::Error::other(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_survives_modbus_error() {
        let err: tokio_modbus::Error = ProtocolError::Timeout("read".to_string()).into();
        assert!(matches!(
            ProtocolError::from_modbus(err),
            ProtocolError::Timeout(message) if message == "read"
        ));

        let err: tokio_modbus::Error = ProtocolError::Vendor {
            code: 106,
            message: "token invalid".to_string(),
        }
        .into();
        assert!(matches!(
            ProtocolError::from_modbus(err),
            ProtocolError::Vendor { code: 106, .. }
        ));
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let err: tokio_modbus::Error =
            ProtocolError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
        match ProtocolError::from_modbus(err) {
            ProtocolError::Io(err) => assert_eq!(err.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other}"),
        }
    }
}
