use domain::{DecodeError, RegisterDefinition, RegisterType, RegisterValue, decode};
use std::collections::BTreeMap;

fn definition(data_type: RegisterType, scale: f64) -> RegisterDefinition {
    let mut definition = RegisterDefinition::new(5001, "sample");
    definition.data_type = data_type;
    definition.scale = scale;
    definition
}

#[test]
fn sixteen_bit_registers_are_big_endian_and_scaled() {
    let value = decode(&definition(RegisterType::Uint16, 0.1), &[0x01, 0x02]).expect("decode");
    assert_eq!(value, Some(RegisterValue::Numeric(f64::from(0x0102_u16) * 0.1)));

    let value = decode(&definition(RegisterType::Int16, 1.0), &[0x80, 0x00]).expect("decode");
    assert_eq!(value, Some(RegisterValue::Numeric(-32768.0)));
}

#[test]
fn thirty_two_bit_registers_are_little_endian_and_scaled() {
    let raw = [0x10, 0x27, 0x00, 0x00];
    let value = decode(&definition(RegisterType::Uint32, 0.01), &raw).expect("decode");
    assert_eq!(value, Some(RegisterValue::Numeric(10_000.0 * 0.01)));

    let raw = (-5_i32).to_le_bytes();
    let value = decode(&definition(RegisterType::Int32, 2.0), &raw).expect("decode");
    assert_eq!(value, Some(RegisterValue::Numeric(-10.0)));
}

#[test]
fn string_register_stops_at_first_nul() {
    let mut definition = definition(RegisterType::String, 1.0);
    definition.count = 2;
    let value = decode(&definition, &[b'a', b'b', 0, b'c']).expect("decode");
    assert_eq!(value, Some(RegisterValue::Text("ab".to_string())));
}

#[test]
fn string_register_ignores_scale_and_enumeration() {
    let mut definition = definition(RegisterType::String, 10.0);
    definition.values = Some(BTreeMap::from([(0, serde_json::json!("zero"))]));
    let value = decode(&definition, &[b'4', b'2']).expect("decode");
    assert_eq!(value, Some(RegisterValue::Text("42".to_string())));
}

#[test]
fn enumeration_substitutes_or_drops_value() {
    let mut definition = definition(RegisterType::Uint16, 1.0);
    definition.values = Some(BTreeMap::from([(2, serde_json::json!("Bad"))]));

    let value = decode(&definition, &[0x00, 0x02]).expect("decode");
    assert_eq!(value, Some(RegisterValue::Enumerated(serde_json::json!("Bad"))));

    let value = decode(&definition, &[0x00, 0x05]).expect("decode");
    assert_eq!(value, None);
}

#[test]
fn enumeration_can_map_to_nested_record() {
    let mut definition = definition(RegisterType::Uint16, 1.0);
    definition.values = Some(BTreeMap::from([(
        0x0E03,
        serde_json::json!({"name": "SH10RT", "phases": 3}),
    )]));

    let value = decode(&definition, &[0x0E, 0x03])
        .expect("decode")
        .expect("value");
    assert_eq!(value.model_name(), Some("SH10RT"));
}

#[test]
fn malformed_buffer_faults_before_enumeration() {
    let mut definition = definition(RegisterType::Uint16, 1.0);
    definition.values = Some(BTreeMap::from([(0, serde_json::json!("Zero"))]));

    let err = decode(&definition, &[0x00]).expect_err("short buffer");
    assert!(matches!(err, DecodeError::Length { actual: 1, .. }));
}

#[test]
fn decoding_is_pure() {
    let definition = definition(RegisterType::Int32, 0.5);
    let raw = [0xAA, 0xBB, 0xCC, 0x0D];
    let first = decode(&definition, &raw).expect("decode");
    let second = decode(&definition, &raw).expect("decode");
    assert_eq!(first, second);
}
