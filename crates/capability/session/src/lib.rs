//! # 逆变器会话
//!
//! 在选定的传输上按目录顺序读取输入、保持两组寄存器：
//!
//! ```text
//! Inverter::read
//!   ├── 清除上一轮结果与型号
//!   ├── input 组 ──► read_input_registers
//!   │     └── 地址 5000 解码出型号后，后续寄存器按型号门控
//!   └── holding 组 ──► read_holding_registers
//! ```
//!
//! 设备异常记录在寄存器上不中止；传输故障与解码失败中止本轮并返回 [`SessionError`]。

mod compare;
mod connect;
mod error;
mod inverter;

pub use compare::{Outcome, RegisterComparison, compare};
pub use connect::{connect_transport, tcp_config, tunnel_config};
pub use error::SessionError;
pub use inverter::{Inverter, RegisterGroup};
