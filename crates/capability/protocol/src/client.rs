//! 读寄存器请求分派
//!
//! 线路传输实现 [`tokio_modbus::client::Client`]，由 [`Context`] 发起读请求，
//! 本模块把结果转换为寄存器字节并区分异常与故障：
//!
//! ```text
//! ModbusClient::read_input_registers
//!       │
//!       ▼
//! Reader::read_input_registers ──► Client::call (TCP / 隧道)
//!       │
//!       ├── Ok(Ok(words))  ──► 大端字节
//!       ├── Ok(Err(code))  ──► ProtocolError::Exception
//!       └── Err(error)     ──► 传输故障
//! ```

use crate::error::ProtocolError;
use crate::frame::{
    EXCEPTION_BIT, FUNCTION_READ_HOLDING_REGISTERS, FUNCTION_READ_INPUT_REGISTERS,
    words_to_bytes,
};
use crate::transport::RegisterTransport;
use async_trait::async_trait;
use domain::ModbusException;
use tokio::sync::Mutex;
use tokio_modbus::ExceptionCode;
use tokio_modbus::client::{Client, Context, Reader};
use tracing::debug;

/// 寄存器读取客户端
///
/// 同一连接上的请求串行执行，可在多个任务间共享。
pub struct ModbusClient {
    context: Mutex<Context>,
}

impl ModbusClient {
    pub fn new<C>(client: C) -> Self
    where
        C: Client + 'static,
    {
        let client: Box<dyn Client> = Box::new(client);
        Self::from_context(Context::from(client))
    }

    pub fn from_context(context: Context) -> Self {
        Self {
            context: Mutex::new(context),
        }
    }

    /// 断开底层连接；下一次读取会重新建立。
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        let mut context = self.context.lock().await;
        Client::disconnect(&mut *context)
            .await
            .map_err(ProtocolError::from_io)
    }
}

fn into_bytes(
    function_code: u8,
    result: Result<Result<Vec<u16>, ExceptionCode>, tokio_modbus::Error>,
) -> Result<Vec<u8>, ProtocolError> {
    match result {
        Ok(Ok(words)) => Ok(words_to_bytes(&words)),
        Ok(Err(code)) => {
            debug!(
                function = function_code | EXCEPTION_BIT,
                code = u8::from(code),
                "device rejected request"
            );
            Err(ModbusException::new(function_code | EXCEPTION_BIT, code).into())
        }
        Err(err) => Err(ProtocolError::from_modbus(err)),
    }
}

#[async_trait]
impl RegisterTransport for ModbusClient {
    async fn read_input_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut context = self.context.lock().await;
        let result = context.read_input_registers(address, quantity).await;
        into_bytes(FUNCTION_READ_INPUT_REGISTERS, result)
    }

    async fn read_holding_registers(
        &self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut context = self.context.lock().await;
        let result = context.read_holding_registers(address, quantity).await;
        into_bytes(FUNCTION_READ_HOLDING_REGISTERS, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ReadRequest;
    use std::io;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio_modbus::slave::{Slave, SlaveContext};
    use tokio_modbus::{Request, Response};

    #[derive(Debug, Clone)]
    enum Reply {
        Pdu(Vec<u8>),
        Fault,
    }

    /// 按预置响应 PDU 应答的客户端
    #[derive(Debug)]
    struct CannedClient {
        reply: Reply,
        sent: Arc<StdMutex<Vec<Vec<u8>>>>,
    }

    impl CannedClient {
        fn new(reply: Reply) -> (Self, Arc<StdMutex<Vec<Vec<u8>>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            (
                Self {
                    reply,
                    sent: sent.clone(),
                },
                sent,
            )
        }
    }

    impl SlaveContext for CannedClient {
        fn set_slave(&mut self, _slave: Slave) {}
    }

    #[async_trait]
    impl Client for CannedClient {
        async fn call(
            &mut self,
            request: Request<'_>,
        ) -> Result<Result<Response, ExceptionCode>, tokio_modbus::Error> {
            let read = ReadRequest::from_request(&request)?;
            self.sent.lock().unwrap().push(read.to_pdu());
            match &self.reply {
                Reply::Pdu(pdu) => Ok(read.parse_response(pdu)?),
                Reply::Fault => Err(ProtocolError::Timeout("canned".to_string()).into()),
            }
        }

        async fn disconnect(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_read_input_registers() {
        let (canned, sent) = CannedClient::new(Reply::Pdu(vec![4, 4, 0x00, 0x11, 0x22, 0x33]));
        let client = ModbusClient::new(canned);
        let data = client.read_input_registers(4999, 2).await.unwrap();
        assert_eq!(data, vec![0x00, 0x11, 0x22, 0x33]);
        assert_eq!(sent.lock().unwrap()[0], vec![4, 0x13, 0x87, 0x00, 0x02]);
    }

    #[tokio::test]
    async fn test_exception_response() {
        let (canned, _) = CannedClient::new(Reply::Pdu(vec![0x83, 2]));
        let client = ModbusClient::new(canned);
        let err = client.read_holding_registers(0, 1).await.unwrap_err();
        assert!(err.is_exception());
        match err {
            ProtocolError::Exception(exception) => {
                assert_eq!(exception.function_code, 0x83);
                assert_eq!(exception.code, ExceptionCode::IllegalDataAddress);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_fault() {
        let (canned, _) = CannedClient::new(Reply::Pdu(vec![4, 3, 0x00, 0x11]));
        let client = ModbusClient::new(canned);
        let err = client.read_input_registers(0, 1).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Frame(_)));
    }

    #[tokio::test]
    async fn test_unexpected_function_code_is_fault() {
        let (canned, _) = CannedClient::new(Reply::Pdu(vec![3, 2, 0x00, 0x11]));
        let client = ModbusClient::new(canned);
        let err = client.read_input_registers(0, 1).await.unwrap_err();
        assert!(!err.is_exception());
    }

    #[tokio::test]
    async fn test_transport_fault_keeps_its_kind() {
        let (canned, _) = CannedClient::new(Reply::Fault);
        let client = ModbusClient::new(canned);
        let err = client.read_input_registers(0, 1).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_quantity_out_of_range() {
        let (canned, sent) = CannedClient::new(Reply::Pdu(vec![]));
        let client = ModbusClient::new(canned);
        assert!(client.read_input_registers(0, 0).await.is_err());
        assert!(client.read_input_registers(0, 126).await.is_err());
        assert!(sent.lock().unwrap().is_empty());
    }
}
