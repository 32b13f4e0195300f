//! 寄存器解码：定义 + 原始字节 → 类型化的值。
//!
//! 字节序规则来自设备本身：16 位类型按大端读取，32 位类型按小端读取。

use crate::register::{RegisterDefinition, RegisterType, RegisterValue};

/// 解码错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected} bytes for {data_type} register, got {actual}")]
    Length {
        data_type: RegisterType,
        expected: usize,
        actual: usize,
    },
}

/// 解码一个寄存器。
///
/// 返回 `Ok(None)` 表示枚举表存在但未命中（值被丢弃，不视为错误）。
pub fn decode(
    definition: &RegisterDefinition,
    raw: &[u8],
) -> Result<Option<RegisterValue>, DecodeError> {
    let data_type = definition.data_type;
    let expected = definition.byte_len();
    let item_len = match data_type {
        RegisterType::Int16 | RegisterType::Uint16 => 2,
        RegisterType::Int32 | RegisterType::Uint32 => 4,
        RegisterType::String => 0,
    };

    if raw.len() != expected || raw.len() < item_len {
        return Err(DecodeError::Length {
            data_type,
            expected: expected.max(item_len),
            actual: raw.len(),
        });
    }

    let value = match data_type {
        RegisterType::Int16 => f64::from(i16::from_be_bytes([raw[0], raw[1]])),
        RegisterType::Uint16 => f64::from(u16::from_be_bytes([raw[0], raw[1]])),
        RegisterType::Int32 => f64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        RegisterType::Uint32 => f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        RegisterType::String => return Ok(Some(RegisterValue::Text(decode_text(raw)))),
    } * definition.scale;

    // 枚举替换：未命中时值消失
    match &definition.values {
        Some(table) => Ok(table
            .get(&(value as i64))
            .cloned()
            .map(RegisterValue::Enumerated)),
        None => Ok(Some(RegisterValue::Numeric(value))),
    }
}

/// 取第一个 NUL 之前的内容；没有 NUL 时取整个缓冲区。
fn decode_text(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(data_type: RegisterType) -> RegisterDefinition {
        let mut definition = RegisterDefinition::new(1, "test");
        definition.data_type = data_type;
        definition
    }

    #[test]
    fn test_decode_int16_negative() {
        let value = decode(&definition(RegisterType::Int16), &[0xFF, 0x9C]).unwrap();
        assert_eq!(value, Some(RegisterValue::Numeric(-100.0)));
    }

    #[test]
    fn test_decode_uint32_is_little_endian() {
        let value = decode(&definition(RegisterType::Uint32), &[0x01, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(value, Some(RegisterValue::Numeric(131_073.0)));
    }

    #[test]
    fn test_decode_text_without_nul() {
        let mut definition = definition(RegisterType::String);
        definition.count = 2;
        let value = decode(&definition, b"SH10").unwrap();
        assert_eq!(value, Some(RegisterValue::Text("SH10".to_string())));
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = decode(&definition(RegisterType::Int32), &[0x01, 0x00]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Length {
                data_type: RegisterType::Int32,
                expected: 4,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_decode_zero_count_numeric() {
        let mut definition = definition(RegisterType::Uint16);
        definition.count = 0;
        assert!(decode(&definition, &[]).is_err());
    }
}
