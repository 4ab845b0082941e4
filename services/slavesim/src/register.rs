//! Register classes and operator-defined register entries

use std::ops::Range;

use serde::{Deserialize, Serialize};
use word_codec::{DataType, RegisterFormat, RegisterValue, WordOrder};

use crate::autogen::AutoGenSpec;
use crate::error::{Result, SlaveSimError};

/// One of the four addressable Modbus tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegisterClass {
    #[serde(rename = "co", alias = "coil", alias = "coils")]
    Coil,
    #[serde(rename = "di", alias = "discrete-input", alias = "discrete_input")]
    DiscreteInput,
    #[serde(rename = "hr", alias = "holding", alias = "holding-register")]
    Holding,
    #[serde(rename = "ir", alias = "input", alias = "input-register")]
    Input,
}

impl RegisterClass {
    pub const ALL: [RegisterClass; 4] = [
        Self::Coil,
        Self::DiscreteInput,
        Self::Holding,
        Self::Input,
    ];

    /// Parse a class tag, failing for anything but the four tables
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim().to_lowercase().replace('_', "-").as_str() {
            "co" | "coil" | "coils" => Ok(Self::Coil),
            "di" | "discrete-input" | "discrete-inputs" => Ok(Self::DiscreteInput),
            "hr" | "holding" | "holding-register" | "holding-registers" => Ok(Self::Holding),
            "ir" | "input" | "input-register" | "input-registers" => Ok(Self::Input),
            _ => Err(SlaveSimError::UnknownClass(tag.to_string())),
        }
    }

    /// Configuration tag (`co`, `di`, `hr`, `ir`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coil => "co",
            Self::DiscreteInput => "di",
            Self::Holding => "hr",
            Self::Input => "ir",
        }
    }

    /// Single-bit tables
    pub fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }
}

impl std::fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl std::str::FromStr for RegisterClass {
    type Err = SlaveSimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s)
    }
}

fn default_writable() -> bool {
    false
}

/// Operator-configured register
///
/// Serialized in the simulator document as
/// `{address, table, data_type, endian, name, value, writable, string_length?, auto_gen?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDef {
    pub address: u32,
    pub table: RegisterClass,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub endian: WordOrder,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: RegisterValue,
    #[serde(default = "default_writable")]
    pub writable: bool,
    /// String window in words; derived from the initial value when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_gen: Option<AutoGenSpec>,
}

impl RegisterDef {
    pub fn new(table: RegisterClass, address: u32, data_type: DataType) -> Self {
        Self {
            address,
            table,
            data_type,
            endian: WordOrder::Big,
            name: String::new(),
            value: RegisterValue::zero(data_type),
            writable: false,
            string_length: None,
            auto_gen: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<RegisterValue>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_endian(mut self, endian: WordOrder) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_string_length(mut self, words: usize) -> Self {
        self.string_length = Some(words);
        self
    }

    pub fn with_auto_gen(mut self, spec: AutoGenSpec) -> Self {
        self.auto_gen = Some(spec);
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// `CLASS:address`, used in every message about this register
    pub fn location(&self) -> String {
        format!("{}:{}", self.table, self.address)
    }

    /// Effective string window in words
    ///
    /// Without an explicit length the window fits the configured value,
    /// two bytes per word, at least one word.
    pub fn effective_string_length(&self) -> usize {
        self.string_length.unwrap_or_else(|| match &self.value {
            RegisterValue::Text(s) => s.len().div_ceil(2).max(1),
            other => other.to_string().len().div_ceil(2).max(1),
        })
    }

    pub fn format(&self) -> RegisterFormat {
        RegisterFormat::new(self.data_type, self.endian)
            .with_string_length(self.effective_string_length())
    }

    /// Words occupied in the class's address space
    pub fn word_count(&self) -> usize {
        self.format().word_count()
    }

    /// Half-open address span `[address, address + size)`
    pub fn span(&self) -> Range<u64> {
        let start = u64::from(self.address);
        start..start + self.word_count() as u64
    }

    pub fn overlaps(&self, other: &RegisterDef) -> bool {
        if self.table != other.table {
            return false;
        }
        let (a, b) = (self.span(), other.span());
        a.start < b.end && b.start < a.end
    }

    /// Bring the entry into canonical form
    ///
    /// Coils and discrete inputs are single bits, so their type is forced to
    /// `bool`. String windows are pinned and the value is coerced into the
    /// data type, failing with a range error that names this register.
    pub fn normalize(&mut self) -> Result<()> {
        if self.table.is_bit() {
            self.data_type = DataType::Bool;
        }
        if self.data_type == DataType::String {
            let words = self.effective_string_length();
            if words == 0 {
                return Err(SlaveSimError::validation(format!(
                    "{}: string_length must be at least 1",
                    self.location()
                )));
            }
            self.string_length = Some(words);
        } else {
            self.string_length = None;
        }
        self.value = self
            .value
            .coerce(self.data_type)
            .map_err(|e| SlaveSimError::codec(e, self.location()))?;
        Ok(())
    }
}

/// Reject `candidate` if it overlaps any entry of `existing` in its class
///
/// `skip` excludes one index, used when editing an entry in place.
pub fn check_overlap(
    existing: &[RegisterDef],
    candidate: &RegisterDef,
    skip: Option<usize>,
) -> Result<()> {
    for (index, reg) in existing.iter().enumerate() {
        if Some(index) == skip {
            continue;
        }
        if candidate.overlaps(reg) {
            return Err(SlaveSimError::Overlap {
                candidate: format!("{} ({})", candidate.location(), candidate.data_type),
                existing: reg.location(),
            });
        }
    }
    Ok(())
}

/// Validate a whole register list, pairwise
pub fn validate_layout(registers: &[RegisterDef]) -> Result<()> {
    for (index, reg) in registers.iter().enumerate() {
        check_overlap(&registers[..index], reg, None)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_class_tags() {
        assert_eq!(RegisterClass::from_tag("hr").unwrap(), RegisterClass::Holding);
        assert_eq!(
            RegisterClass::from_tag("Discrete_Input").unwrap(),
            RegisterClass::DiscreteInput
        );
        assert_eq!(RegisterClass::from_tag("coil").unwrap(), RegisterClass::Coil);
        assert_eq!(
            RegisterClass::from_tag("xx"),
            Err(SlaveSimError::UnknownClass("xx".into()))
        );
        assert_eq!(RegisterClass::Input.to_string(), "IR");
    }

    #[test]
    fn test_overlap_detected() {
        let a = RegisterDef::new(RegisterClass::Holding, 10, DataType::Uint16);
        let b = RegisterDef::new(RegisterClass::Holding, 9, DataType::Int32);
        assert!(a.overlaps(&b));

        let err = check_overlap(&[a], &b, None).unwrap_err();
        assert!(err.to_string().contains("HR:10"), "{}", err);
    }

    #[test]
    fn test_adjacent_and_other_class_do_not_overlap() {
        let a = RegisterDef::new(RegisterClass::Holding, 10, DataType::Uint16);
        let b = RegisterDef::new(RegisterClass::Holding, 8, DataType::Int32);
        let c = RegisterDef::new(RegisterClass::Input, 10, DataType::Uint16);
        assert!(!a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(validate_layout(&[a, b, c]).is_ok());
    }

    #[test]
    fn test_edit_skips_own_index() {
        let regs = vec![RegisterDef::new(RegisterClass::Holding, 0, DataType::Int64)];
        let edited = RegisterDef::new(RegisterClass::Holding, 0, DataType::Int32);
        assert!(check_overlap(&regs, &edited, Some(0)).is_ok());
        assert!(check_overlap(&regs, &edited, None).is_err());
    }

    #[test]
    fn test_normalize_forces_bool_for_bit_tables() {
        let mut reg = RegisterDef::new(RegisterClass::Coil, 3, DataType::Float32).with_value(1u16);
        reg.normalize().unwrap();
        assert_eq!(reg.data_type, DataType::Bool);
        assert_eq!(reg.value, RegisterValue::Bool(true));
        assert_eq!(reg.word_count(), 1);
    }

    #[test]
    fn test_string_length_from_value() {
        let mut reg =
            RegisterDef::new(RegisterClass::Holding, 0, DataType::String).with_value("hello");
        reg.normalize().unwrap();
        assert_eq!(reg.string_length, Some(3));
        assert_eq!(reg.span(), 0..3);
    }

    #[test]
    fn test_normalize_reports_location() {
        let mut reg =
            RegisterDef::new(RegisterClass::Holding, 42, DataType::Uint16).with_value(70000u32);
        let err = reg.normalize().unwrap_err();
        assert!(matches!(err, SlaveSimError::Range { .. }));
        assert!(err.to_string().contains("HR:42"));
    }

    #[test]
    fn test_document_layout() {
        let json = r#"{"address": 5, "table": "hr", "data_type": "float32",
                       "endian": "little", "name": "temp", "value": 21.5, "writable": true}"#;
        let reg: RegisterDef = serde_json::from_str(json).unwrap();
        assert_eq!(reg.table, RegisterClass::Holding);
        assert_eq!(reg.endian, WordOrder::Little);
        assert_eq!(reg.value, RegisterValue::Float(21.5));
        assert!(reg.writable);

        let back = serde_json::to_value(&reg).unwrap();
        assert_eq!(back["table"], "hr");
        assert!(back.get("string_length").is_none());
    }
}
