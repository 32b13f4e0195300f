//! HTTP/WebSocket 隧道传输
//!
//! 设备的 Web 接口可以代理寄存器读取：
//!
//! ```text
//! 1. ws://host:8082/ws/home/overview   connect     → token
//! 2. 同一 WebSocket                    devicelist  → dev_code / dev_type（取第一个设备）
//! 3. http://host:80/device/getParam?token=..&param_addr=..&param_num=..&param_type=..
//!                                                  → {"param_value": "00 11 22 33"}
//! ```
//!
//! 前两步只在第一次读取（或 [`HttpTunnelTransport::close`] 之后）执行，
//! 结果缓存在 [`TunnelSessionHandle`] 内。`param_type` 代替功能码：0 为输入寄存器，
//! 1 为保持寄存器。响应被转换回 `{param_type, 字节数, 数据..}`，再还原为读寄存器响应 PDU。

use crate::error::ProtocolError;
use crate::frame::{ReadRequest, now_epoch_ms};
use crate::messages::{
    CONNECT_MESSAGE, ConnectData, DeviceListData, Envelope, LANG, ParamValueData,
    decode_param_value, device_list_message,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::Client;
use tokio_modbus::slave::{Slave, SlaveContext};
use tokio_modbus::{ExceptionCode, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

/// 输入寄存器参数类型
pub const PARAM_TYPE_INPUT_REGISTER: u8 = 0;
/// 保持寄存器参数类型
pub const PARAM_TYPE_HOLDING_REGISTER: u8 = 1;

/// 获取令牌与设备列表的 WebSocket 路径
pub const WEBSOCKET_PATH: &str = "/ws/home/overview";
/// 读取参数的 HTTP 路径
pub const GET_PARAM_PATH: &str = "/device/getParam";

/// 响应体长度上限
const JSON_MAX_LENGTH: usize = 4096;
/// getParam 固定请求类型
const REQUEST_TYPE: &str = "3";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 隧道传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTunnelConfig {
    /// 设备主机地址
    pub host: String,
    /// HTTP 端口（默认 80）
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// WebSocket 端口（默认 8082）
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// 从站 ID，作为 dev_id 传给接口
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    /// WebSocket 拨号、单条消息、HTTP 往返超时（毫秒）
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_http_port() -> u16 {
    80
}

fn default_ws_port() -> u16 {
    8082
}

fn default_slave_id() -> u8 {
    1
}

fn default_timeout() -> u64 {
    10_000
}

impl HttpTunnelConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            slave_id: default_slave_id(),
            timeout_ms: default_timeout(),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))
    }
}

/// 会话识别出的设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub dev_code: i64,
    pub dev_type: i64,
}

#[derive(Debug)]
struct TunnelSession {
    token: String,
    identity: DeviceIdentity,
}

/// 隧道会话（令牌 + 设备）的共享句柄
///
/// 传输交给 [`crate::ModbusClient`] 之后，仍可通过句柄查看设备标识或使会话失效。
#[derive(Debug, Clone, Default)]
pub struct TunnelSessionHandle {
    inner: Arc<Mutex<Option<TunnelSession>>>,
}

impl TunnelSessionHandle {
    /// 当前会话的设备标识。
    pub async fn identity(&self) -> Option<DeviceIdentity> {
        self.inner.lock().await.as_ref().map(|s| s.identity)
    }

    /// 丢弃缓存的令牌和设备，下次读取时重新握手。
    pub async fn close(&self) {
        if self.inner.lock().await.take().is_some() {
            debug!("tunnel session invalidated");
        }
    }
}

/// 隧道线路传输
#[derive(Debug)]
pub struct HttpTunnelTransport {
    config: HttpTunnelConfig,
    client: reqwest::Client,
    session: TunnelSessionHandle,
}

impl HttpTunnelTransport {
    pub fn new(config: HttpTunnelConfig) -> Result<Self, ProtocolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProtocolError::Http(e.to_string()))?;

        Ok(Self {
            config,
            client,
            session: TunnelSessionHandle::default(),
        })
    }

    pub fn config(&self) -> &HttpTunnelConfig {
        &self.config
    }

    pub fn session(&self) -> TunnelSessionHandle {
        self.session.clone()
    }

    /// 显式建立会话（已有会话时不做任何事）。
    pub async fn connect(&self) -> Result<(), ProtocolError> {
        let mut session = self.session.inner.lock().await;
        if session.is_none() {
            *session = Some(self.establish().await?);
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.session.close().await;
    }

    pub async fn identity(&self) -> Option<DeviceIdentity> {
        self.session.identity().await
    }

    /// 隧道帧往返：`{param_type, slave_id, 地址(2), 数量(2)}` → `{param_type, 字节数, 数据..}`
    ///
    /// 没有会话时先握手。
    pub async fn exchange(&self, adu: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if adu.len() < 6 {
            return Err(ProtocolError::Frame(format!(
                "tunnel request of {} bytes is too short",
                adu.len()
            )));
        }

        let mut session = self.session.inner.lock().await;
        if session.is_none() {
            *session = Some(self.establish().await?);
        }
        let Some(active) = session.as_ref() else {
            return Err(ProtocolError::Authentication("no session".to_string()));
        };

        let param_type = adu[0];
        let slave_id = adu[1];
        let address = u16::from_be_bytes([adu[2], adu[3]]);
        let quantity = u16::from_be_bytes([adu[4], adu[5]]);

        let payload = self
            .get_param(active, param_type, slave_id, address, quantity)
            .await?;
        let byte_len = u8::try_from(payload.len()).map_err(|_| {
            ProtocolError::Frame(format!("payload of {} bytes is too long", payload.len()))
        })?;

        let mut response = Vec::with_capacity(payload.len() + 2);
        response.push(param_type);
        response.push(byte_len);
        response.extend_from_slice(&payload);

        debug!(adu = ?response, "tunnel transcoded");

        Ok(response)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    async fn establish(&self) -> Result<TunnelSession, ProtocolError> {
        let url = format!(
            "ws://{}:{}{}",
            self.config.host, self.config.ws_port, WEBSOCKET_PATH
        );

        let (mut socket, _) = timeout(self.timeout(), connect_async(url.as_str()))
            .await
            .map_err(|_| ProtocolError::Timeout(format!("websocket dial {}", url)))?
            .map_err(|e| {
                ProtocolError::WebSocket(format!(
                    "failed to connect to websocket to get token: {}",
                    e
                ))
            })?;

        let result = self.handshake(&mut socket).await;
        // 握手套接字不用于数据传输
        if let Err(e) = socket.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
        result
    }

    async fn handshake(&self, socket: &mut WsStream) -> Result<TunnelSession, ProtocolError> {
        self.send_text(socket, CONNECT_MESSAGE.to_string()).await?;
        let connect: ConnectData = self.read_envelope(socket).await?.into_data()?;
        if connect.token.is_empty() {
            return Err(ProtocolError::Authentication(
                "failed to find token in connect message from websocket".to_string(),
            ));
        }

        self.send_text(socket, device_list_message(&connect.token))
            .await?;
        let devices: DeviceListData = self.read_envelope(socket).await?.into_data()?;
        let device = devices.list.first().ok_or_else(|| {
            ProtocolError::Json("device list from websocket is empty".to_string())
        })?;

        let identity = DeviceIdentity {
            dev_code: device.dev_code,
            dev_type: device.dev_type,
        };
        info!(
            host = %self.config.host,
            dev_code = identity.dev_code,
            dev_type = identity.dev_type,
            model = %device.dev_model,
            "tunnel session established"
        );

        Ok(TunnelSession {
            token: connect.token,
            identity,
        })
    }

    async fn send_text(&self, socket: &mut WsStream, text: String) -> Result<(), ProtocolError> {
        timeout(self.timeout(), socket.send(Message::Text(text)))
            .await
            .map_err(|_| ProtocolError::Timeout("websocket send".to_string()))?
            .map_err(|e| ProtocolError::WebSocket(format!("failed to send message: {}", e)))
    }

    async fn read_envelope(&self, socket: &mut WsStream) -> Result<Envelope, ProtocolError> {
        loop {
            let message = timeout(self.timeout(), socket.next())
                .await
                .map_err(|_| ProtocolError::Timeout("websocket receive".to_string()))?;

            match message {
                Some(Ok(Message::Text(text))) => return Envelope::from_slice(text.as_bytes()),
                Some(Ok(Message::Binary(data))) => return Envelope::from_slice(&data),
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ProtocolError::WebSocket(
                        "websocket closed during handshake".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(ProtocolError::WebSocket(format!(
                        "failed to read message: {}",
                        e
                    )));
                }
            }
        }
    }

    async fn get_param(
        &self,
        session: &TunnelSession,
        param_type: u8,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        let url = format!(
            "http://{}:{}{}",
            self.config.host, self.config.http_port, GET_PARAM_PATH
        );
        let query = [
            ("token", session.token.clone()),
            ("lang", LANG.to_string()),
            ("time123456", now_epoch_ms().to_string()),
            ("dev_id", slave_id.to_string()),
            ("dev_type", session.identity.dev_type.to_string()),
            ("dev_code", session.identity.dev_code.to_string()),
            ("type", REQUEST_TYPE.to_string()),
            ("param_addr", (u32::from(address) + 1).to_string()),
            ("param_num", quantity.to_string()),
            ("param_type", param_type.to_string()),
        ];

        debug!(url = %url, query = ?query, "tunnel sending");

        let mut response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::Http(format!("unexpected status {}", status)));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if body.len() + chunk.len() > JSON_MAX_LENGTH {
                return Err(ProtocolError::Json(format!(
                    "response body exceeds {} bytes",
                    JSON_MAX_LENGTH
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let envelope = Envelope::from_slice(&body)?;
        debug!(
            result_code = envelope.result_code,
            result_msg = %envelope.result_msg,
            "tunnel received"
        );

        let data: ParamValueData = envelope.into_data()?;
        decode_param_value(&data.param_value)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProtocolError {
    if e.is_timeout() {
        ProtocolError::Timeout(e.to_string())
    } else {
        ProtocolError::Http(e.to_string())
    }
}

/// 读请求 → 隧道请求帧
fn encode(read: &ReadRequest, slave_id: u8) -> Vec<u8> {
    let param_type = if read.is_holding() {
        PARAM_TYPE_HOLDING_REGISTER
    } else {
        PARAM_TYPE_INPUT_REGISTER
    };

    let mut adu = Vec::with_capacity(6);
    adu.push(param_type);
    adu.push(slave_id);
    adu.extend_from_slice(&read.address.to_be_bytes());
    adu.extend_from_slice(&read.quantity.to_be_bytes());
    adu
}

/// 隧道响应帧 `{param_type, 字节数, 数据..}` → 读寄存器响应 PDU
fn response_pdu(read: &ReadRequest, adu: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if adu.len() < 2 {
        return Err(ProtocolError::Frame("invalid data length".to_string()));
    }

    let mut pdu = Vec::with_capacity(adu.len());
    pdu.push(read.function_code);
    pdu.extend_from_slice(&adu[1..]);
    Ok(pdu)
}

impl SlaveContext for HttpTunnelTransport {
    fn set_slave(&mut self, slave: Slave) {
        self.config.slave_id = slave.0;
    }
}

#[async_trait]
impl Client for HttpTunnelTransport {
    async fn call(
        &mut self,
        request: Request<'_>,
    ) -> Result<Result<Response, ExceptionCode>, tokio_modbus::Error> {
        let read = ReadRequest::from_request(&request)?;
        let response = self.exchange(&encode(&read, self.config.slave_id)).await?;
        let pdu = response_pdu(&read, &response)?;
        Ok(read.parse_response(&pdu)?)
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.close().await;
        Ok(())
    }
}
