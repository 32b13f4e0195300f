//! 寄存器目录与读取结果。
//!
//! 目录由外部解析（通常是 YAML 文件），这里只定义其结构与默认值：
//!
//! ```yaml
//! input:
//!   - address: 5000
//!     name: "Device type code"
//!     values:
//!       3587: { name: "SH10RT" }
//!   - address: 5017
//!     name: "Total DC power"
//!     type: "uint32"
//!     unit: "W"
//!     models: ["SH10RT"]
//! holding:
//!   - address: 13000
//!     name: "System clock"
//!     count: 6
//! ```

use crate::decode::{DecodeError, decode};
use crate::exception::ModbusException;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 型号识别寄存器地址（1 基）。
pub const MODEL_IDENTITY_ADDRESS: u32 = 5000;

/// 寄存器数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    /// 16位有符号整数（大端）
    Int16,
    /// 16位无符号整数（大端）
    Uint16,
    /// 32位有符号整数（2个寄存器，小端）
    Int32,
    /// 32位无符号整数（2个寄存器，小端）
    Uint32,
    /// NUL 结尾的 ASCII 字符串
    String,
}

impl Default for RegisterType {
    fn default() -> Self {
        Self::Uint16
    }
}

impl RegisterType {
    /// 单个元素占用的 16 位字数。
    pub fn words_per_item(self) -> u16 {
        match self {
            Self::Int32 | Self::Uint32 => 2,
            Self::Int16 | Self::Uint16 | Self::String => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::String => "string",
        }
    }
}

impl std::fmt::Display for RegisterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 寄存器适用的型号列表（空表示全部型号）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Models(pub Vec<String>);

impl Models {
    pub fn contains(&self, model: &str) -> bool {
        self.0.iter().any(|m| m == model)
    }

    /// 列表为空或包含该型号。
    pub fn contains_or_all(&self, model: &str) -> bool {
        self.0.is_empty() || self.contains(model)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 寄存器定义（加载后不可变）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterDefinition {
    /// 1 基字地址
    pub address: u32,
    #[serde(default)]
    pub name: String,
    /// 单位
    #[serde(default)]
    pub unit: Option<String>,
    /// 缩放系数
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// 枚举表：整数值 → 任意记录
    #[serde(default)]
    pub values: Option<BTreeMap<i64, serde_json::Value>>,
    /// 数据类型
    #[serde(default, rename = "type")]
    pub data_type: RegisterType,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// 元素个数
    #[serde(default = "default_count")]
    pub count: u16,
    #[serde(default)]
    pub models: Models,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default, alias = "availibility")]
    pub availability: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

fn default_count() -> u16 {
    1
}

impl RegisterDefinition {
    /// 使用默认值构造定义（uint16、scale 1.0、count 1）。
    pub fn new(address: u32, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            unit: None,
            scale: default_scale(),
            values: None,
            data_type: RegisterType::default(),
            min: None,
            max: None,
            count: default_count(),
            models: Models::default(),
            validity: None,
            availability: None,
        }
    }

    /// 线路地址（0 基）；地址 0 或超出 16 位范围时为 None。
    pub fn wire_address(&self) -> Option<u16> {
        self.address
            .checked_sub(1)
            .and_then(|address| u16::try_from(address).ok())
    }

    /// 读取占用的 16 位字数。
    pub fn word_count(&self) -> u16 {
        self.count.saturating_mul(self.data_type.words_per_item())
    }

    /// 读取返回的字节数。
    pub fn byte_len(&self) -> usize {
        usize::from(self.word_count()) * 2
    }

    pub fn unit_label(&self) -> &str {
        self.unit.as_deref().unwrap_or("")
    }

    /// 已识别出型号时，该寄存器是否应跳过。
    pub fn excluded_for(&self, model: &str) -> bool {
        !self.models.is_empty() && !self.models.contains(model)
    }
}

/// 解码后的寄存器值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegisterValue {
    /// 缩放后的数值
    Numeric(f64),
    /// 字符串寄存器
    Text(String),
    /// 枚举表中映射到的记录（可能是嵌套结构）
    Enumerated(serde_json::Value),
}

impl RegisterValue {
    /// 从型号识别寄存器的值中提取型号名：
    /// 字符串本身，或嵌套记录的 `name` 字段。空名视为未识别。
    pub fn model_name(&self) -> Option<&str> {
        let name = match self {
            Self::Text(name) => Some(name.as_str()),
            Self::Enumerated(serde_json::Value::String(name)) => Some(name.as_str()),
            Self::Enumerated(serde_json::Value::Object(record)) => {
                record.get("name").and_then(|name| name.as_str())
            }
            _ => None,
        };
        name.filter(|name| !name.is_empty())
    }
}

impl std::fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
            Self::Enumerated(serde_json::Value::String(value)) => f.write_str(value),
            Self::Enumerated(value) => write!(f, "{}", value),
        }
    }
}

/// 一个寄存器定义及其本周期的读取结果。
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRegister {
    pub definition: RegisterDefinition,
    /// 原始字节（解码失败时同样保留）
    pub raw: Vec<u8>,
    /// 解码值；枚举表未命中时为 None
    pub value: Option<RegisterValue>,
    /// 设备返回的异常
    pub error: Option<ModbusException>,
    /// 本周期是否尝试读取
    pub supported: bool,
}

impl DecodedRegister {
    pub fn new(definition: RegisterDefinition) -> Self {
        Self {
            definition,
            raw: Vec::new(),
            value: None,
            error: None,
            supported: false,
        }
    }

    /// 恢复为加载时的状态。
    pub fn reset(&mut self) {
        self.raw.clear();
        self.value = None;
        self.error = None;
        self.supported = false;
    }

    /// 记录读取到的字节并解码。
    pub fn record_read(&mut self, raw: Vec<u8>) -> Result<(), DecodeError> {
        self.raw = raw;
        self.value = decode(&self.definition, &self.raw)?;
        Ok(())
    }

    pub fn record_exception(&mut self, exception: ModbusException) {
        self.error = Some(exception);
    }
}

/// 已解析的寄存器目录。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegisterCatalogue {
    #[serde(default)]
    pub input: Vec<RegisterDefinition>,
    #[serde(default)]
    pub holding: Vec<RegisterDefinition>,
}

/// 输入/保持两组寄存器，顺序即读取顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterSet {
    pub input: Vec<DecodedRegister>,
    pub holding: Vec<DecodedRegister>,
}

impl RegisterSet {
    pub fn from_definitions(
        input: impl IntoIterator<Item = RegisterDefinition>,
        holding: impl IntoIterator<Item = RegisterDefinition>,
    ) -> Self {
        Self {
            input: input.into_iter().map(DecodedRegister::new).collect(),
            holding: holding.into_iter().map(DecodedRegister::new).collect(),
        }
    }

    /// 清除上一周期的读取结果。
    pub fn clear_outcomes(&mut self) {
        self.input
            .iter_mut()
            .chain(self.holding.iter_mut())
            .for_each(DecodedRegister::reset);
    }

    pub fn len(&self) -> usize {
        self.input.len() + self.holding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.holding.is_empty()
    }
}

impl From<RegisterCatalogue> for RegisterSet {
    fn from(catalogue: RegisterCatalogue) -> Self {
        Self::from_definitions(catalogue.input, catalogue.holding)
    }
}
