//! TCP 传输（容忍设备异常帧长度缺陷）
//!
//! 帧格式与 Modbus TCP 相同（MBAP 头 + PDU）。部分设备在异常响应中
//! 把长度字段少算一个字节，例如声明长度 2 却带了 `0x84 0x03` 两个字节的 PDU。
//! 读取时检测到异常标志位且帧恰好缺一个字节，就再读一个字节并修正长度字段。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let config = TcpTransportConfig::from_json(r#"{"host": "192.168.1.100"}"#)?;
//! let client = ModbusClient::new(QuirkyTcpTransport::new(config));
//! let data = client.read_input_registers(4999, 1).await?;
//! ```

use crate::error::ProtocolError;
use crate::frame::{EXCEPTION_BIT, ReadRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::Client;
use tokio_modbus::slave::{Slave, SlaveContext};
use tokio_modbus::{ExceptionCode, Request, Response};
use tracing::{debug, info};

/// MBAP 头长度（含单元标识）
pub const TCP_HEADER_SIZE: usize = 7;
/// ADU 最大长度
pub const TCP_MAX_LENGTH: usize = 260;
/// 完整异常帧的长度字段值：单元标识 + 功能码 + 异常码
const EXCEPTION_FRAME_LENGTH: usize = 3;

/// TCP 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// 设备主机地址
    pub host: String,
    /// 端口（默认 502）
    #[serde(default = "default_tcp_port")]
    pub port: u16,
    /// 单元标识（从站 ID）
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// 连接与单次往返超时（毫秒）
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// 空闲超时（毫秒），超过后下次使用时重连
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

fn default_tcp_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout() -> u64 {
    10_000
}

fn default_idle_timeout() -> u64 {
    60_000
}

impl TcpTransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_tcp_port(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout(),
            idle_timeout_ms: default_idle_timeout(),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))
    }
}

#[derive(Debug)]
struct TcpConnection {
    stream: TcpStream,
    last_activity: Instant,
}

/// TCP 线路传输
///
/// 持有一条持久连接；由 [`crate::ModbusClient`] 保证同一时刻只有一个请求在途。
#[derive(Debug)]
pub struct QuirkyTcpTransport {
    config: TcpTransportConfig,
    transaction_id: u16,
    connection: Option<TcpConnection>,
}

impl QuirkyTcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            transaction_id: 0,
            connection: None,
        }
    }

    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }

    /// 显式建立连接（已连接时不做任何事）。
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.connection.is_none() {
            self.connection = Some(self.dial().await?);
        }
        Ok(())
    }

    /// 关闭当前连接，下次使用时重连。
    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!(host = %self.config.host, "modbus tcp connection closed");
        }
    }

    /// 发送一个请求帧并返回完整响应帧。
    ///
    /// 空闲超时后先重连；往返失败或超时则丢弃连接。
    pub async fn exchange(&mut self, adu: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let idle_timeout = self.idle_timeout();
        let idle = self
            .connection
            .as_ref()
            .is_some_and(|conn| conn.last_activity.elapsed() >= idle_timeout);
        if idle {
            debug!(host = %self.config.host, "idle timeout elapsed, reconnecting");
            self.connection = None;
        }
        self.connect().await?;

        let round_trip_timeout = self.timeout();
        let Some(conn) = self.connection.as_mut() else {
            return Err(ProtocolError::Connection("not connected".to_string()));
        };

        debug!(adu = ?adu, "modbus tcp sending");

        let result = timeout(round_trip_timeout, round_trip(&mut conn.stream, adu)).await;
        match result {
            Ok(Ok(response)) => {
                conn.last_activity = Instant::now();
                debug!(adu = ?response, "modbus tcp received");
                Ok(response)
            }
            Ok(Err(e)) => {
                self.connection = None;
                Err(e)
            }
            Err(_) => {
                self.connection = None;
                Err(ProtocolError::Timeout(format!(
                    "no response within {}ms",
                    self.config.timeout_ms
                )))
            }
        }
    }

    async fn dial(&self) -> Result<TcpConnection, ProtocolError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let stream = timeout(self.timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| ProtocolError::Timeout(format!("connect to {}", addr)))?
            .map_err(|e| ProtocolError::Connection(format!("{}: {}", addr, e)))?;

        info!("connected to modbus server at {}", addr);

        Ok(TcpConnection {
            stream,
            last_activity: Instant::now(),
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.config.idle_timeout_ms)
    }

    /// MBAP 头 + PDU，事务标识每次递增
    fn encode(&mut self, pdu: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let length = pdu.len() + 1;
        if TCP_HEADER_SIZE - 1 + length > TCP_MAX_LENGTH {
            return Err(ProtocolError::Frame(format!(
                "length of pdu '{}' must not be bigger than '{}'",
                pdu.len(),
                TCP_MAX_LENGTH - TCP_HEADER_SIZE
            )));
        }

        self.transaction_id = self.transaction_id.wrapping_add(1);

        let mut adu = Vec::with_capacity(TCP_HEADER_SIZE + pdu.len());
        adu.extend_from_slice(&self.transaction_id.to_be_bytes());
        adu.extend_from_slice(&0u16.to_be_bytes()); // protocol_id
        adu.extend_from_slice(&(length as u16).to_be_bytes());
        adu.push(self.config.unit_id);
        adu.extend_from_slice(pdu);
        Ok(adu)
    }
}

/// 写请求并读取一个完整响应帧。
async fn round_trip(stream: &mut TcpStream, request: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    stream.write_all(request).await?;

    let mut header = [0u8; TCP_HEADER_SIZE];
    stream.read_exact(&mut header).await?;

    let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
    if length == 0 {
        return Err(ProtocolError::Frame(
            "length in response header must not be zero".to_string(),
        ));
    }
    if length > TCP_MAX_LENGTH - (TCP_HEADER_SIZE - 1) {
        return Err(ProtocolError::Frame(format!(
            "length in response header '{}' must not be greater than '{}'",
            length,
            TCP_MAX_LENGTH - TCP_HEADER_SIZE + 1
        )));
    }

    // 长度字段包含单元标识，头部已读过
    let mut adu = vec![0u8; TCP_HEADER_SIZE - 1 + length];
    adu[..TCP_HEADER_SIZE].copy_from_slice(&header);
    stream.read_exact(&mut adu[TCP_HEADER_SIZE..]).await?;

    let short_exception = length == EXCEPTION_FRAME_LENGTH - 1
        && adu
            .get(TCP_HEADER_SIZE)
            .is_some_and(|function_code| function_code & EXCEPTION_BIT != 0);
    if short_exception {
        let mut exception_code = [0u8; 1];
        stream.read_exact(&mut exception_code).await?;
        adu.push(exception_code[0]);
        adu[4..6].copy_from_slice(&(EXCEPTION_FRAME_LENGTH as u16).to_be_bytes());
        debug!(adu = ?adu, "recovered under-declared exception frame");
    }

    Ok(adu)
}

/// 校验事务标识、协议标识与单元标识。
fn verify(request: &[u8], response: &[u8]) -> Result<(), ProtocolError> {
    if request.len() < TCP_HEADER_SIZE || response.len() < TCP_HEADER_SIZE {
        return Err(ProtocolError::Frame(format!(
            "frame shorter than header: request {} bytes, response {} bytes",
            request.len(),
            response.len()
        )));
    }

    let request_id = u16::from_be_bytes([request[0], request[1]]);
    let response_id = u16::from_be_bytes([response[0], response[1]]);
    if response_id != request_id {
        return Err(ProtocolError::Frame(format!(
            "response transaction id '{}' does not match request '{}'",
            response_id, request_id
        )));
    }

    let protocol_id = u16::from_be_bytes([response[2], response[3]]);
    if protocol_id != 0 {
        return Err(ProtocolError::Frame(format!(
            "response protocol id '{}' does not match request '0'",
            protocol_id
        )));
    }

    if response[6] != request[6] {
        return Err(ProtocolError::Frame(format!(
            "response unit id '{}' does not match request '{}'",
            response[6], request[6]
        )));
    }

    Ok(())
}

/// 取出响应帧中的 PDU，长度字段须与实际一致。
fn response_pdu(adu: &[u8]) -> Result<&[u8], ProtocolError> {
    if adu.len() <= TCP_HEADER_SIZE {
        return Err(ProtocolError::Frame(format!(
            "response length '{}' leaves no pdu",
            adu.len()
        )));
    }

    let length = usize::from(u16::from_be_bytes([adu[4], adu[5]]));
    let pdu_length = adu.len() - TCP_HEADER_SIZE;
    if pdu_length != length.saturating_sub(1) {
        return Err(ProtocolError::Frame(format!(
            "length in response '{}' does not match pdu data length '{}'",
            length.saturating_sub(1),
            pdu_length
        )));
    }

    Ok(&adu[TCP_HEADER_SIZE..])
}

impl SlaveContext for QuirkyTcpTransport {
    fn set_slave(&mut self, slave: Slave) {
        self.config.unit_id = slave.0;
    }
}

#[async_trait]
impl Client for QuirkyTcpTransport {
    async fn call(
        &mut self,
        request: Request<'_>,
    ) -> Result<Result<Response, ExceptionCode>, tokio_modbus::Error> {
        let read = ReadRequest::from_request(&request)?;
        let adu = self.encode(&read.to_pdu())?;
        let response = self.exchange(&adu).await?;

        // 校验失败时连接上可能残留未读字节
        let pdu = match verify(&adu, &response).and_then(|()| response_pdu(&response)) {
            Ok(pdu) => pdu,
            Err(e) => {
                self.close();
                return Err(e.into());
            }
        };

        Ok(read.parse_response(pdu)?)
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> QuirkyTcpTransport {
        QuirkyTcpTransport::new(TcpTransportConfig::new("127.0.0.1"))
    }

    #[test]
    fn test_parse_config() {
        let json = r#"{"host": "192.168.1.100", "unit_id": 3}"#;
        let config = TcpTransportConfig::from_json(json).unwrap();
        assert_eq!(config.host, "192.168.1.100");
        assert_eq!(config.port, 502);
        assert_eq!(config.unit_id, 3);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.idle_timeout_ms, 60_000);
    }

    #[test]
    fn test_encode_increments_transaction_id() {
        let mut transport = transport();
        let pdu = [4, 0x13, 0x87, 0x00, 0x01];

        let first = transport.encode(&pdu).unwrap();
        assert_eq!(first, vec![0, 1, 0, 0, 0, 6, 1, 4, 0x13, 0x87, 0x00, 0x01]);

        let second = transport.encode(&pdu).unwrap();
        assert_eq!(&second[..2], &[0, 2]);
    }

    #[test]
    fn test_set_slave_changes_unit_id() {
        let mut transport = transport();
        transport.set_slave(Slave(7));
        let adu = transport.encode(&[4, 0, 0, 0, 1]).unwrap();
        assert_eq!(adu[6], 7);
    }

    #[test]
    fn test_verify_transaction_id_mismatch() {
        let request = [0, 1, 0, 0, 0, 6, 1, 4, 0, 0, 0, 1];
        let response = [0, 2, 0, 0, 0, 5, 1, 4, 2, 0, 0];
        assert!(verify(&request, &response).is_err());

        let response = [0, 1, 0, 0, 0, 5, 1, 4, 2, 0, 0];
        assert!(verify(&request, &response).is_ok());
    }

    #[test]
    fn test_verify_unit_id_mismatch() {
        let request = [0, 1, 0, 0, 0, 6, 1, 4, 0, 0, 0, 1];
        let response = [0, 1, 0, 0, 0, 5, 2, 4, 2, 0, 0];
        assert!(verify(&request, &response).is_err());
    }

    #[test]
    fn test_response_pdu() {
        let pdu = response_pdu(&[0, 1, 0, 0, 0, 3, 1, 0x84, 2]).unwrap();
        assert_eq!(pdu, &[0x84, 2]);

        assert!(response_pdu(&[0, 1, 0, 0, 0, 4, 1, 0x84, 2]).is_err());
        assert!(response_pdu(&[0, 1, 0, 0, 0, 1, 1]).is_err());
    }
}
