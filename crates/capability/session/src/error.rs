use domain::DecodeError;
use inverter_protocol::ProtocolError;

/// 读取周期错误：均会中止本轮读取。
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("register {address} ({name}) has no wire address")]
    Address { address: u32, name: String },
    #[error("failed to read register {address} ({name}): {source}")]
    Transport {
        address: u32,
        name: String,
        #[source]
        source: ProtocolError,
    },
    #[error("failed to decode register {address} ({name}) from {raw:?}: {source}")]
    Decode {
        address: u32,
        name: String,
        raw: Vec<u8>,
        #[source]
        source: DecodeError,
    },
    #[error("failed to build transport: {0}")]
    Setup(#[from] ProtocolError),
}

impl SessionError {
    /// 出错的目录地址（构建传输失败时为 None）。
    pub fn address(&self) -> Option<u32> {
        match self {
            SessionError::Address { address, .. }
            | SessionError::Transport { address, .. }
            | SessionError::Decode { address, .. } => Some(*address),
            SessionError::Setup(_) => None,
        }
    }
}
