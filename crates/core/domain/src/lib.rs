//! 逆变器寄存器领域模型。
//!
//! - [`register`]：寄存器目录（只读定义）与每个读取周期的结果
//! - [`decode`]：定义 + 原始字节 → 类型化的值（纯函数）
//! - [`exception`]：设备显式拒绝请求时的 Modbus 异常

pub mod decode;
pub mod exception;
pub mod register;

pub use decode::{DecodeError, decode};
pub use exception::{ModbusException, exception_code_from_wire};
pub use tokio_modbus::ExceptionCode;
pub use register::{
    DecodedRegister, MODEL_IDENTITY_ADDRESS, Models, RegisterCatalogue, RegisterDefinition,
    RegisterSet, RegisterType, RegisterValue,
};
