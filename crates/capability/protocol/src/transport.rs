//! 寄存器读取能力接口

use crate::error::ProtocolError;
use async_trait::async_trait;

/// 读取输入/保持寄存器。
///
/// `address` 为 0 基线路地址，`quantity` 为 16 位字数；
/// 成功时返回 `2 * quantity` 个寄存器字节。
#[async_trait]
pub trait RegisterTransport: Send + Sync {
    async fn read_input_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError>;

    async fn read_holding_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError>;
}

#[async_trait]
impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    async fn read_input_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        (**self).read_input_registers(address, quantity).await
    }

    async fn read_holding_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        (**self).read_holding_registers(address, quantity).await
    }
}
