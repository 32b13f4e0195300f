//! 一轮读取：按目录顺序逐个读寄存器，识别型号后跳过不适用的寄存器。

use crate::error::SessionError;
use domain::{DecodedRegister, MODEL_IDENTITY_ADDRESS, RegisterCatalogue, RegisterSet};
use inverter_protocol::{ProtocolError, RegisterTransport};
use inverter_telemetry::{
    new_cycle_id, record_cycle_aborted, record_cycle_completed, record_cycle_started,
    record_register_exception, record_register_read, record_register_skipped,
};
use std::fmt;
use tracing::{Instrument, debug, info, info_span, warn};

/// 寄存器分组，决定使用哪个读功能。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterGroup {
    Input,
    Holding,
}

impl RegisterGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterGroup::Input => "input",
            RegisterGroup::Holding => "holding",
        }
    }
}

impl fmt::Display for RegisterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逆变器：寄存器目录 + 最近一轮的读取结果。
#[derive(Debug, Clone, Default)]
pub struct Inverter {
    registers: RegisterSet,
    model: Option<String>,
}

impl Inverter {
    pub fn new(registers: RegisterSet) -> Self {
        Self {
            registers,
            model: None,
        }
    }

    pub fn from_catalogue(catalogue: RegisterCatalogue) -> Self {
        Self::new(catalogue.into())
    }

    /// 本轮识别出的型号。
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn registers(&self) -> &RegisterSet {
        &self.registers
    }

    /// 执行一轮读取。
    ///
    /// 设备异常记录在对应寄存器上并继续；传输故障或解码失败中止本轮，
    /// 已读取的结果保留。
    pub async fn read(&mut self, transport: &dyn RegisterTransport) -> Result<(), SessionError> {
        let cycle_id = new_cycle_id();
        let span = info_span!("read_cycle", cycle_id = %cycle_id);
        self.read_cycle(transport).instrument(span).await
    }

    async fn read_cycle(&mut self, transport: &dyn RegisterTransport) -> Result<(), SessionError> {
        record_cycle_started();
        self.registers.clear_outcomes();
        self.model = None;

        let result = async {
            read_group(
                RegisterGroup::Input,
                &mut self.registers.input,
                &mut self.model,
                transport,
            )
            .await?;
            read_group(
                RegisterGroup::Holding,
                &mut self.registers.holding,
                &mut self.model,
                transport,
            )
            .await
        }
        .await;

        match &result {
            Ok(()) => {
                record_cycle_completed();
                info!(
                    target: "inverter.session",
                    model = self.model.as_deref().unwrap_or(""),
                    registers = self.registers.len(),
                    "read_cycle_completed"
                );
            }
            Err(err) => {
                record_cycle_aborted();
                warn!(target: "inverter.session", error = %err, "read_cycle_aborted");
            }
        }
        result
    }
}

async fn read_group(
    group: RegisterGroup,
    registers: &mut [DecodedRegister],
    model: &mut Option<String>,
    transport: &dyn RegisterTransport,
) -> Result<(), SessionError> {
    for register in registers.iter_mut() {
        if model
            .as_deref()
            .is_some_and(|model| register.definition.excluded_for(model))
        {
            record_register_skipped();
            debug!(
                target: "inverter.session",
                group = %group,
                address = register.definition.address,
                name = %register.definition.name,
                "register_skipped"
            );
            continue;
        }

        register.supported = true;

        let address = register.definition.address;
        let wire_address = register
            .definition
            .wire_address()
            .ok_or_else(|| SessionError::Address {
                address,
                name: register.definition.name.clone(),
            })?;
        let quantity = register.definition.word_count();

        let result = match group {
            RegisterGroup::Input => transport.read_input_registers(wire_address, quantity).await,
            RegisterGroup::Holding => {
                transport
                    .read_holding_registers(wire_address, quantity)
                    .await
            }
        };

        let raw = match result {
            Ok(raw) => raw,
            Err(ProtocolError::Exception(exception)) => {
                record_register_exception();
                warn!(
                    target: "inverter.session",
                    group = %group,
                    address,
                    name = %register.definition.name,
                    error = %exception,
                    "register_exception"
                );
                register.record_exception(exception);
                continue;
            }
            Err(source) => {
                return Err(SessionError::Transport {
                    address,
                    name: register.definition.name.clone(),
                    source,
                });
            }
        };

        register
            .record_read(raw)
            .map_err(|source| SessionError::Decode {
                address,
                name: register.definition.name.clone(),
                raw: register.raw.clone(),
                source,
            })?;
        record_register_read();

        if model.is_none() && address == MODEL_IDENTITY_ADDRESS {
            detect_model(register, model);
        }
    }

    Ok(())
}

fn detect_model(register: &DecodedRegister, model: &mut Option<String>) {
    match register.value.as_ref().and_then(|value| value.model_name()) {
        Some(name) => {
            info!(target: "inverter.session", model = %name, "model_detected");
            *model = Some(name.to_string());
        }
        None => {
            warn!(
                target: "inverter.session",
                value = ?register.value,
                raw = ?register.raw,
                "model_not_detected"
            );
        }
    }
}
