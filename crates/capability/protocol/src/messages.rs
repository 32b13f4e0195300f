//! 隧道接口的 JSON 报文

use crate::error::ProtocolError;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// 成功结果码
pub const RESULT_CODE_SUCCESS: i64 = 1;

/// 语言标记
pub const LANG: &str = "en_us";

/// WebSocket connect 请求（固定内容）
pub const CONNECT_MESSAGE: &str = r#"{"lang":"en_us","token":"","service":"connect"}"#;

/// WebSocket devicelist 请求
pub fn device_list_message(token: &str) -> String {
    serde_json::json!({
        "lang": LANG,
        "token": token,
        "service": "devicelist",
        "type": "0",
        "is_check_token": "0",
    })
    .to_string()
}

/// 通用响应信封 `{result_code, result_msg, result_data}`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub result_code: i64,
    #[serde(default)]
    pub result_msg: String,
    #[serde(default)]
    pub result_data: Option<serde_json::Value>,
}

impl Envelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body)
            .map_err(|e| ProtocolError::Json(format!("failed to decode json envelope: {}", e)))
    }

    /// 校验结果码并解析 `result_data`。
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ProtocolError> {
        if self.result_code != RESULT_CODE_SUCCESS {
            return Err(ProtocolError::Vendor {
                code: self.result_code,
                message: self.result_msg,
            });
        }

        let data = self
            .result_data
            .ok_or_else(|| ProtocolError::Json("envelope has no result_data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| ProtocolError::Json(format!("failed to decode result_data: {}", e)))
    }
}

/// connect 响应数据
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectData {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub uid: i64,
    #[serde(default)]
    pub tips_disable: i64,
}

/// devicelist 响应数据
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceListData {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub list: Vec<DeviceEntry>,
    #[serde(default)]
    pub count: i64,
}

/// 设备列表中的一项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceEntry {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub dev_id: i64,
    #[serde(default)]
    pub dev_code: i64,
    #[serde(default)]
    pub dev_type: i64,
    #[serde(default)]
    pub dev_sn: String,
    #[serde(default)]
    pub dev_name: String,
    #[serde(default)]
    pub dev_model: String,
}

/// getParam 响应数据
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamValueData {
    /// 空白分隔的十六进制字节串
    #[serde(default)]
    pub param_value: String,
}

/// 去掉所有空白后按十六进制解码。
pub fn decode_param_value(param_value: &str) -> Result<Vec<u8>, ProtocolError> {
    let compact: String = param_value.split_whitespace().collect();
    hex::decode(&compact).map_err(|e| {
        ProtocolError::Hex(format!(
            "failed to parse hex string in response {:?}: {}",
            param_value, e
        ))
    })
}
