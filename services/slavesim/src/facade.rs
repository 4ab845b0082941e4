//! Register facade
//!
//! Maps the four class tags onto their stores and layers typed value access
//! on top of raw word access.

use tracing::debug;
use word_codec::{decode, encode, RegisterValue};

use crate::error::{Result, SlaveSimError};
use crate::register::{RegisterClass, RegisterDef};
use crate::store::RegisterStore;

/// The four stores of one slave
#[derive(Debug)]
pub struct RegisterFacade {
    coils: RegisterStore,
    discrete_inputs: RegisterStore,
    holding: RegisterStore,
    input: RegisterStore,
}

impl Default for RegisterFacade {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl RegisterFacade {
    /// Stores addressed from `base`, each pre-sized to `initial_block` cells
    pub fn new(base: u32, initial_block: usize) -> Self {
        let store = |class: RegisterClass| {
            RegisterStore::with_capacity(class.to_string(), base, initial_block)
        };
        Self {
            coils: store(RegisterClass::Coil),
            discrete_inputs: store(RegisterClass::DiscreteInput),
            holding: store(RegisterClass::Holding),
            input: store(RegisterClass::Input),
        }
    }

    pub fn store(&self, class: RegisterClass) -> &RegisterStore {
        match class {
            RegisterClass::Coil => &self.coils,
            RegisterClass::DiscreteInput => &self.discrete_inputs,
            RegisterClass::Holding => &self.holding,
            RegisterClass::Input => &self.input,
        }
    }

    /// Single-cell read by class tag
    ///
    /// Unknown tags fail with `UnknownClass`; never-written cells read as 0.
    pub fn get(&self, tag: &str, address: u32) -> Result<u16> {
        let class = RegisterClass::from_tag(tag)?;
        Ok(self.read_words(class, address, 1)?[0])
    }

    /// Single-cell write by class tag
    ///
    /// Bit tables store any non-zero value as 1.
    pub fn set(&self, tag: &str, address: u32, value: impl Into<u16>) -> Result<()> {
        let class = RegisterClass::from_tag(tag)?;
        let mut word = value.into();
        if class.is_bit() {
            word = u16::from(word != 0);
        }
        self.write_words(class, address, &[word])
    }

    pub fn read_words(&self, class: RegisterClass, address: u32, count: usize) -> Result<Vec<u16>> {
        self.store(class).read(address, count)
    }

    pub fn write_words(&self, class: RegisterClass, address: u32, values: &[u16]) -> Result<()> {
        self.store(class).write(address, values)
    }

    pub fn read_bits(&self, class: RegisterClass, address: u32, count: usize) -> Result<Vec<bool>> {
        Ok(self
            .read_words(class, address, count)?
            .into_iter()
            .map(|w| w != 0)
            .collect())
    }

    pub fn write_bits(&self, class: RegisterClass, address: u32, bits: &[bool]) -> Result<()> {
        let words: Vec<u16> = bits.iter().map(|&b| u16::from(b)).collect();
        self.write_words(class, address, &words)
    }

    /// Decode the current value of a configured register
    pub fn read_value(&self, reg: &RegisterDef) -> Result<RegisterValue> {
        let format = reg.format();
        let words = self.read_words(reg.table, reg.address, format.word_count())?;
        decode(&format, &words).map_err(|e| SlaveSimError::codec(e, reg.location()))
    }

    /// Encode `value` for a configured register and store all its words
    ///
    /// The full word span lands in one store write, so protocol reads never
    /// observe half of a multi-word value.
    pub fn write_value(&self, reg: &RegisterDef, value: &RegisterValue) -> Result<()> {
        let format = reg.format();
        let words = encode(&format, value).map_err(|e| SlaveSimError::codec(e, reg.location()))?;
        debug!(
            class = %reg.table,
            address = reg.address,
            data_type = %reg.data_type,
            "write {} -> {:04X?}",
            value,
            words
        );
        self.write_words(reg.table, reg.address, &words)
    }

    /// Zero all four stores
    pub fn clear(&self) {
        for class in RegisterClass::ALL {
            self.store(class).clear();
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use word_codec::{DataType, WordOrder};

    #[test]
    fn test_unknown_class_fails() {
        let facade = RegisterFacade::default();
        assert_eq!(
            facade.get("zz", 0),
            Err(SlaveSimError::UnknownClass("zz".into()))
        );
        assert!(matches!(
            facade.set("holdings!", 0, 1u16),
            Err(SlaveSimError::UnknownClass(_))
        ));
    }

    #[test]
    fn test_get_set_by_tag() {
        let facade = RegisterFacade::default();
        facade.set("hr", 7, 1234u16).unwrap();
        assert_eq!(facade.get("holding", 7).unwrap(), 1234);
        assert_eq!(facade.get("ir", 7).unwrap(), 0);

        facade.set("co", 3, true).unwrap();
        facade.set("coil", 4, 5u16).unwrap();
        assert_eq!(facade.read_bits(RegisterClass::Coil, 3, 3).unwrap(), vec![true, true, false]);
    }

    #[test]
    fn test_multi_word_value_lands_at_consecutive_addresses() {
        let facade = RegisterFacade::default();
        let reg = RegisterDef::new(RegisterClass::Holding, 20, DataType::Uint32)
            .with_endian(WordOrder::Little);
        facade
            .write_value(&reg, &RegisterValue::UInt(0x0001_0002))
            .unwrap();
        assert_eq!(facade.get("hr", 20).unwrap(), 0x0002);
        assert_eq!(facade.get("hr", 21).unwrap(), 0x0001);
        assert_eq!(facade.read_value(&reg).unwrap(), RegisterValue::UInt(0x0001_0002));
    }

    #[test]
    fn test_write_value_range_error_has_context() {
        let facade = RegisterFacade::default();
        let reg = RegisterDef::new(RegisterClass::Input, 2, DataType::Int32);
        let err = facade
            .write_value(&reg, &RegisterValue::Int(i64::MAX))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("IR:2") && msg.contains("int32"), "{}", msg);
        // Nothing was written
        assert_eq!(facade.read_words(RegisterClass::Input, 2, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_classes_are_independent() {
        let facade = RegisterFacade::new(0, 16);
        facade.set("hr", 0, 1u16).unwrap();
        facade.set("ir", 0, 2u16).unwrap();
        assert_eq!(facade.get("hr", 0).unwrap(), 1);
        assert_eq!(facade.get("ir", 0).unwrap(), 2);
        facade.clear();
        assert_eq!(facade.get("hr", 0).unwrap(), 0);
    }
}
