//! Modbus 异常响应。

use tokio_modbus::ExceptionCode;

/// 设备对读请求的显式拒绝（功能码 | 0x80 + 异常码）。
///
/// 与传输故障不同，异常只记录在对应寄存器上，不会中断读取周期。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusException {
    /// 响应中的功能码（已带 0x80 标志位）
    pub function_code: u8,
    pub code: ExceptionCode,
}

impl ModbusException {
    pub fn new(function_code: u8, code: ExceptionCode) -> Self {
        Self {
            function_code,
            code,
        }
    }

    /// 由线路上的异常码字节构造。
    pub fn from_wire(function_code: u8, exception_code: u8) -> Self {
        Self::new(function_code, exception_code_from_wire(exception_code))
    }

    /// 线路上的异常码字节。
    pub fn exception_code(&self) -> u8 {
        u8::from(self.code)
    }
}

/// 异常码字节 → [`ExceptionCode`]，非标准值保留为 `Custom`。
pub fn exception_code_from_wire(value: u8) -> ExceptionCode {
    match value {
        0x01 => ExceptionCode::IllegalFunction,
        0x02 => ExceptionCode::IllegalDataAddress,
        0x03 => ExceptionCode::IllegalDataValue,
        0x04 => ExceptionCode::ServerDeviceFailure,
        0x05 => ExceptionCode::Acknowledge,
        0x06 => ExceptionCode::ServerDeviceBusy,
        0x08 => ExceptionCode::MemoryParityError,
        0x0A => ExceptionCode::GatewayPathUnavailable,
        0x0B => ExceptionCode::GatewayTargetDevice,
        other => ExceptionCode::Custom(other),
    }
}

impl std::fmt::Display for ModbusException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "exception '{}' ({}), function '{}'",
            self.exception_code(),
            self.code,
            self.function_code
        )
    }
}

impl std::error::Error for ModbusException {}
