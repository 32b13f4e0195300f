//! 读寄存器请求/响应的 PDU 编解码，两种传输共用。
//!
//! 请求来自 [`tokio_modbus::client::Context`]，只支持读输入/保持寄存器；
//! 响应 PDU 解析为 [`Response`]，异常 PDU 解析为 [`ExceptionCode`]。

use crate::error::ProtocolError;
use domain::exception_code_from_wire;
use tokio_modbus::{ExceptionCode, Request, Response};

/// 读保持寄存器功能码
pub const FUNCTION_READ_HOLDING_REGISTERS: u8 = 0x03;
/// 读输入寄存器功能码
pub const FUNCTION_READ_INPUT_REGISTERS: u8 = 0x04;

/// 异常响应中功能码的标志位
pub const EXCEPTION_BIT: u8 = 0x80;

/// 单次最多读取的寄存器数
pub const MAX_READ_REGISTERS: u16 = 125;

/// 一次读寄存器请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub function_code: u8,
    pub address: u16,
    pub quantity: u16,
}

impl ReadRequest {
    pub fn from_request(request: &Request<'_>) -> Result<Self, ProtocolError> {
        let (function_code, address, quantity) = match request {
            Request::ReadInputRegisters(address, quantity) => {
                (FUNCTION_READ_INPUT_REGISTERS, *address, *quantity)
            }
            Request::ReadHoldingRegisters(address, quantity) => {
                (FUNCTION_READ_HOLDING_REGISTERS, *address, *quantity)
            }
            other => {
                return Err(ProtocolError::Frame(format!(
                    "unsupported request: {:?}",
                    other
                )));
            }
        };

        if quantity == 0 || quantity > MAX_READ_REGISTERS {
            return Err(ProtocolError::Frame(format!(
                "quantity '{}' must be between '1' and '{}'",
                quantity, MAX_READ_REGISTERS
            )));
        }

        Ok(Self {
            function_code,
            address,
            quantity,
        })
    }

    pub fn is_holding(&self) -> bool {
        self.function_code == FUNCTION_READ_HOLDING_REGISTERS
    }

    /// 功能码 + 起始地址 + 数量（均为大端）
    pub fn to_pdu(&self) -> Vec<u8> {
        let mut pdu = Vec::with_capacity(5);
        pdu.push(self.function_code);
        pdu.extend_from_slice(&self.address.to_be_bytes());
        pdu.extend_from_slice(&self.quantity.to_be_bytes());
        pdu
    }

    /// 解析响应 PDU。
    ///
    /// 功能码 | 0x80 为设备异常；其余不匹配（功能码、字节数、数量）均为帧错误。
    pub fn parse_response(
        &self,
        pdu: &[u8],
    ) -> Result<Result<Response, ExceptionCode>, ProtocolError> {
        let Some((&function_code, data)) = pdu.split_first() else {
            return Err(ProtocolError::Frame("response pdu is empty".to_string()));
        };

        if function_code == self.function_code | EXCEPTION_BIT {
            let code = data.first().copied().ok_or_else(|| {
                ProtocolError::Frame("exception response carries no code".to_string())
            })?;
            return Ok(Err(exception_code_from_wire(code)));
        }

        if function_code != self.function_code {
            return Err(ProtocolError::Frame(format!(
                "response function code '{}' does not match request '{}'",
                function_code, self.function_code
            )));
        }

        let Some((&count, payload)) = data.split_first() else {
            return Err(ProtocolError::Frame("response data is empty".to_string()));
        };
        if usize::from(count) != payload.len() {
            return Err(ProtocolError::Frame(format!(
                "response data size '{}' does not match count '{}'",
                payload.len(),
                count
            )));
        }
        if payload.len() != usize::from(self.quantity) * 2 {
            return Err(ProtocolError::Frame(format!(
                "response data size '{}' does not match quantity '{}'",
                payload.len(),
                self.quantity
            )));
        }

        let words = payload
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]))
            .collect();

        Ok(Ok(if self.is_holding() {
            Response::ReadHoldingRegisters(words)
        } else {
            Response::ReadInputRegisters(words)
        }))
    }
}

/// 寄存器字 → 线路字节（大端）
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
