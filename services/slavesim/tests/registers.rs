//! Store and facade behaviour seen from outside the crate

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use slavesim::register::validate_layout;
use slavesim::{RegisterClass, RegisterDef, RegisterFacade, RegisterStore, SlaveSimError};
use word_codec::{DataType, RegisterValue, WordOrder};

#[test]
fn test_fresh_store_reads_zeros() {
    let store = RegisterStore::new("HR", 0);
    assert_eq!(store.read(0, 5).unwrap(), vec![0, 0, 0, 0, 0]);
}

#[test]
fn test_write_past_end_grows_with_zero_fill() {
    let store = RegisterStore::new("HR", 0);
    store.write(100, &[7, 8, 9]).unwrap();

    let words = store.read(0, 103).unwrap();
    assert_eq!(words.len(), 103);
    assert!(words[..100].iter().all(|&w| w == 0));
    assert_eq!(&words[100..], &[7, 8, 9]);
}

#[test]
fn test_address_below_base() {
    let store = RegisterStore::new("IR", 40);
    assert_eq!(
        store.read(39, 1),
        Err(SlaveSimError::AddressBelowBase {
            class: "IR".into(),
            address: 39,
            base: 40,
        })
    );
    assert!(store.write(0, &[1]).is_err());
    store.write(40, &[1]).unwrap();
    assert_eq!(store.read(40, 1).unwrap(), vec![1]);
}

#[test]
fn test_overlap_rejected() {
    let layout = vec![
        RegisterDef::new(RegisterClass::Holding, 10, DataType::Uint16),
        RegisterDef::new(RegisterClass::Holding, 9, DataType::Int32),
    ];
    let err = validate_layout(&layout).unwrap_err();
    assert!(matches!(err, SlaveSimError::Overlap { .. }));
    assert!(err.to_string().contains("HR:10"));

    // Same addresses in different classes do not collide
    let layout = vec![
        RegisterDef::new(RegisterClass::Holding, 10, DataType::Uint16),
        RegisterDef::new(RegisterClass::Input, 9, DataType::Int32),
    ];
    assert!(validate_layout(&layout).is_ok());
}

#[test]
fn test_unknown_class_tag() {
    let facade = RegisterFacade::default();
    assert_eq!(
        facade.get("qq", 0),
        Err(SlaveSimError::UnknownClass("qq".into()))
    );
}

#[test]
fn test_string_register_layout() {
    let facade = RegisterFacade::default();
    let reg = RegisterDef::new(RegisterClass::Holding, 0, DataType::String)
        .with_string_length(3)
        .with_value("ABCD");
    facade.write_value(&reg, &reg.value).unwrap();
    assert_eq!(
        facade.read_words(RegisterClass::Holding, 0, 3).unwrap(),
        vec![0x4142, 0x4344, 0x0000]
    );
    assert_eq!(facade.read_value(&reg).unwrap(), RegisterValue::Text("ABCD".into()));

    let little = reg.clone().with_endian(WordOrder::Little);
    facade.write_value(&little, &little.value).unwrap();
    assert_eq!(facade.get("hr", 0).unwrap(), 0x4241);
}

#[test]
fn test_concurrent_multi_word_writes_never_tear() {
    let facade = Arc::new(RegisterFacade::default());
    let reg = RegisterDef::new(RegisterClass::Holding, 0, DataType::Uint32);
    let values = [0x0000_0000u64, 0xFFFF_FFFF];

    let writers: Vec<_> = values
        .iter()
        .map(|&v| {
            let facade = Arc::clone(&facade);
            let reg = reg.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    facade.write_value(&reg, &RegisterValue::UInt(v)).unwrap();
                }
            })
        })
        .collect();

    for _ in 0..1000 {
        let words = facade.read_words(RegisterClass::Holding, 0, 2).unwrap();
        assert_eq!(words[0], words[1], "torn read {:04X?}", words);
    }
    for w in writers {
        w.join().unwrap();
    }
}
