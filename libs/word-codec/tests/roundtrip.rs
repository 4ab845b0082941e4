//! Round-trip behaviour across data types and word orders

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use word_codec::{decode, encode, size_of, DataType, RegisterFormat, RegisterValue, WordOrder};

const ORDERS: [WordOrder; 2] = [WordOrder::Big, WordOrder::Little];

fn round_trip(format: RegisterFormat, value: RegisterValue) -> RegisterValue {
    let words = encode(&format, &value).unwrap();
    assert_eq!(words.len(), size_of(&format), "{:?}", format);
    decode(&format, &words).unwrap()
}

#[test]
fn boundary_values_survive_round_trip() {
    let cases: Vec<(DataType, RegisterValue)> = vec![
        (DataType::Uint16, RegisterValue::UInt(0)),
        (DataType::Uint16, RegisterValue::UInt(65535)),
        (DataType::Int32, RegisterValue::Int(i64::from(i32::MIN))),
        (DataType::Int32, RegisterValue::Int(i64::from(i32::MAX))),
        (DataType::Uint32, RegisterValue::UInt(u64::from(u32::MAX))),
        (DataType::Int64, RegisterValue::Int(i64::MIN)),
        (DataType::Int64, RegisterValue::Int(i64::MAX)),
        (DataType::Uint64, RegisterValue::UInt(u64::MAX)),
        (DataType::Float32, RegisterValue::Float(-1234.5)),
        (DataType::Float32, RegisterValue::Float(f64::from(f32::MAX))),
        (DataType::Double64, RegisterValue::Float(std::f64::consts::PI)),
        (DataType::Double64, RegisterValue::Float(f64::MIN_POSITIVE)),
        (DataType::Bool, RegisterValue::Bool(true)),
        (DataType::Bool, RegisterValue::Bool(false)),
    ];

    for order in ORDERS {
        for (data_type, value) in &cases {
            let format = RegisterFormat::new(*data_type, order);
            assert_eq!(
                round_trip(format, value.clone()),
                *value,
                "{} {}",
                data_type,
                order
            );
        }
    }
}

#[test]
fn inexact_float32_decodes_to_its_canonical_form() {
    for order in ORDERS {
        let format = RegisterFormat::new(DataType::Float32, order);
        for input in [0.1, -273.15, 1e-7] {
            let canonical = RegisterValue::Float(input).coerce(DataType::Float32).unwrap();
            assert_eq!(round_trip(format, canonical.clone()), canonical, "{} {}", input, order);
            assert_eq!(round_trip(format, RegisterValue::Float(input)), canonical);
        }
    }
}

#[test]
fn strings_are_truncated_to_window() {
    for order in ORDERS {
        let format = RegisterFormat::new(DataType::String, order).with_string_length(3);
        assert_eq!(
            round_trip(format, RegisterValue::from("abcdefgh")),
            RegisterValue::from("abcdef")
        );
        assert_eq!(round_trip(format, RegisterValue::from("ab")), RegisterValue::from("ab"));
        assert_eq!(round_trip(format, RegisterValue::from("")), RegisterValue::from(""));
    }
}

#[test]
fn word_order_changes_layout_but_not_value() {
    let value = RegisterValue::Float(12.75);
    let big = RegisterFormat::new(DataType::Double64, WordOrder::Big);
    let little = RegisterFormat::new(DataType::Double64, WordOrder::Little);

    let mut big_words = encode(&big, &value).unwrap();
    let little_words = encode(&little, &value).unwrap();
    big_words.reverse();
    assert_eq!(big_words, little_words);

    // Decoding with the wrong order yields a different value
    assert_ne!(decode(&big, &little_words).unwrap(), value);
}

#[test]
fn loosely_typed_input_is_canonicalised() {
    let format = RegisterFormat::new(DataType::Int32, WordOrder::Little);
    assert_eq!(round_trip(format, RegisterValue::UInt(5)), RegisterValue::Int(5));
    assert_eq!(round_trip(format, RegisterValue::from("-9")), RegisterValue::Int(-9));

    let format = RegisterFormat::new(DataType::Float32, WordOrder::Big);
    assert_eq!(round_trip(format, RegisterValue::Int(3)), RegisterValue::Float(3.0));
}
