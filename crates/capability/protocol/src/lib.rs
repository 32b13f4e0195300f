//! # 传输能力模块
//!
//! 把"在地址 A 读 N 个字"转换为两种线路协议并转换回来：
//! - **TCP**：Modbus TCP 帧，容忍设备异常帧长度少算一个字节
//! - **HTTP/WebSocket 隧道**：WebSocket 握手取令牌与设备，HTTP GET 读取十六进制载荷
//!
//! ## 架构设计
//!
//! ```text
//! RegisterTransport (read_input_registers / read_holding_registers)
//!       │
//!       ▼
//! ModbusClient ── tokio_modbus::client::Context (Reader)
//!       │
//!       ▼  tokio_modbus::client::Client::call
//!       ├── QuirkyTcpTransport   (MBAP 帧 + 持久连接)
//!       └── HttpTunnelTransport  (param_type 帧 + 令牌会话)
//! ```
//!
//! ## 错误分类
//!
//! `ProtocolError::Exception` 是设备对单个请求的拒绝，调用方继续下一个寄存器；
//! 其余变体均为传输故障，调用方应中止本轮读取。
//!
//! ## 配置格式
//!
//! ### TCP
//! ```json
//! { "host": "192.168.1.100", "port": 502, "unit_id": 1, "timeout_ms": 10000, "idle_timeout_ms": 60000 }
//! ```
//!
//! ### HTTP/WebSocket 隧道
//! ```json
//! { "host": "192.168.1.100", "http_port": 80, "ws_port": 8082, "slave_id": 1, "timeout_ms": 10000 }
//! ```

mod client;
mod error;
mod frame;
mod http;
mod messages;
mod tcp;
mod transport;

pub use client::ModbusClient;
pub use error::ProtocolError;
pub use frame::{
    EXCEPTION_BIT, FUNCTION_READ_HOLDING_REGISTERS, FUNCTION_READ_INPUT_REGISTERS,
    MAX_READ_REGISTERS, ReadRequest, now_epoch_ms, words_to_bytes,
};
pub use http::{
    DeviceIdentity, GET_PARAM_PATH, HttpTunnelConfig, HttpTunnelTransport,
    PARAM_TYPE_HOLDING_REGISTER, PARAM_TYPE_INPUT_REGISTER, TunnelSessionHandle, WEBSOCKET_PATH,
};
pub use messages::{CONNECT_MESSAGE, device_list_message};
pub use tcp::{QuirkyTcpTransport, TCP_HEADER_SIZE, TCP_MAX_LENGTH, TcpTransportConfig};
pub use transport::RegisterTransport;
