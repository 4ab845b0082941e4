//! Typed register values

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::DataType;

/// Application-level value carried by a register
///
/// Values are normalised by [`RegisterValue::coerce`] into the canonical
/// variant for a data type before encoding:
///
/// | Data type                       | Canonical variant |
/// |---------------------------------|-------------------|
/// | `uint16`, `uint32`, `uint64`    | `UInt`            |
/// | `int32`, `int64`                | `Int`             |
/// | `float32`, `double64`           | `Float`           |
/// | `string`                        | `Text`            |
/// | `bool`                          | `Bool`            |
///
/// Decoding always yields the canonical variant, so round trips compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Default for RegisterValue {
    fn default() -> Self {
        RegisterValue::UInt(0)
    }
}

impl RegisterValue {
    /// Zero value in canonical form for a data type
    pub fn zero(data_type: DataType) -> Self {
        match data_type {
            DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => RegisterValue::UInt(0),
            DataType::Int32 | DataType::Int64 => RegisterValue::Int(0),
            DataType::Float32 | DataType::Double64 => RegisterValue::Float(0.0),
            DataType::String => RegisterValue::Text(String::new()),
            DataType::Bool => RegisterValue::Bool(false),
        }
    }

    /// Parse operator input for a data type
    pub fn parse(data_type: DataType, text: &str) -> Result<Self> {
        RegisterValue::Text(text.to_string()).coerce(data_type)
    }

    /// Convert into the canonical variant for `data_type`, checking range
    ///
    /// Out-of-range numbers fail with [`CodecError::OutOfRange`]; they are
    /// never saturated or truncated.
    pub fn coerce(&self, data_type: DataType) -> Result<Self> {
        match data_type {
            DataType::Uint16 => self.to_integer(data_type, 0, i128::from(u16::MAX)).map(|v| {
                RegisterValue::UInt(v as u64)
            }),
            DataType::Uint32 => self.to_integer(data_type, 0, i128::from(u32::MAX)).map(|v| {
                RegisterValue::UInt(v as u64)
            }),
            DataType::Uint64 => self.to_integer(data_type, 0, i128::from(u64::MAX)).map(|v| {
                RegisterValue::UInt(v as u64)
            }),
            DataType::Int32 => self
                .to_integer(data_type, i128::from(i32::MIN), i128::from(i32::MAX))
                .map(|v| RegisterValue::Int(v as i64)),
            DataType::Int64 => self
                .to_integer(data_type, i128::from(i64::MIN), i128::from(i64::MAX))
                .map(|v| RegisterValue::Int(v as i64)),
            DataType::Float32 => {
                let v = self.to_float(data_type)?;
                // Infinities and NaN have an f32 representation, large finite values do not
                if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                    return Err(CodecError::out_of_range(v, data_type));
                }
                // Canonical form is the nearest f32, which is what decode yields
                Ok(RegisterValue::Float(f64::from(v as f32)))
            },
            DataType::Double64 => self.to_float(data_type).map(RegisterValue::Float),
            DataType::String => Ok(RegisterValue::Text(match self {
                RegisterValue::Text(s) => s.clone(),
                other => other.to_string(),
            })),
            DataType::Bool => self.to_bool(data_type).map(RegisterValue::Bool),
        }
    }

    /// Numeric view used by value generators
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RegisterValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            RegisterValue::UInt(v) => Some(*v as f64),
            RegisterValue::Int(v) => Some(*v as f64),
            RegisterValue::Float(v) => Some(*v),
            RegisterValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn to_integer(&self, data_type: DataType, min: i128, max: i128) -> Result<i128> {
        let value = match self {
            RegisterValue::Bool(b) => i128::from(*b),
            RegisterValue::UInt(v) => i128::from(*v),
            RegisterValue::Int(v) => i128::from(*v),
            RegisterValue::Float(v) => float_to_integer(*v, data_type)?,
            RegisterValue::Text(s) => {
                let s = s.trim();
                match s.parse::<i128>() {
                    Ok(v) => v,
                    Err(_) => {
                        let v: f64 = s.parse().map_err(|_| CodecError::mismatch(s, data_type))?;
                        float_to_integer(v, data_type)?
                    },
                }
            },
        };

        if value < min || value > max {
            return Err(CodecError::out_of_range(value, data_type));
        }
        Ok(value)
    }

    fn to_float(&self, data_type: DataType) -> Result<f64> {
        match self {
            RegisterValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            RegisterValue::UInt(v) => Ok(*v as f64),
            RegisterValue::Int(v) => Ok(*v as f64),
            RegisterValue::Float(v) => Ok(*v),
            RegisterValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| CodecError::mismatch(s, data_type)),
        }
    }

    fn to_bool(&self, data_type: DataType) -> Result<bool> {
        match self {
            RegisterValue::Bool(b) => Ok(*b),
            RegisterValue::UInt(0) | RegisterValue::Int(0) => Ok(false),
            RegisterValue::UInt(1) | RegisterValue::Int(1) => Ok(true),
            RegisterValue::Float(v) if *v == 0.0 => Ok(false),
            RegisterValue::Float(v) if *v == 1.0 => Ok(true),
            RegisterValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(true),
                "false" | "0" | "off" | "no" | "" => Ok(false),
                _ => Err(CodecError::mismatch(s, data_type)),
            },
            other => Err(CodecError::out_of_range(other, data_type)),
        }
    }
}

fn float_to_integer(v: f64, data_type: DataType) -> Result<i128> {
    // Anything outside [-2^63, 2^64) cannot fit any integer type
    if !v.is_finite() || v.fract() != 0.0 || v < -9.223_372_036_854_776e18 || v >= 1.844_674_407_370_955_2e19
    {
        return Err(CodecError::out_of_range(v, data_type));
    }
    Ok(v as i128)
}

impl std::fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterValue::Bool(b) => write!(f, "{}", b),
            RegisterValue::UInt(v) => write!(f, "{}", v),
            RegisterValue::Int(v) => write!(f, "{}", v),
            RegisterValue::Float(v) => write!(f, "{}", v),
            RegisterValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for RegisterValue {
    fn from(v: bool) -> Self {
        RegisterValue::Bool(v)
    }
}

impl From<u16> for RegisterValue {
    fn from(v: u16) -> Self {
        RegisterValue::UInt(u64::from(v))
    }
}

impl From<u32> for RegisterValue {
    fn from(v: u32) -> Self {
        RegisterValue::UInt(u64::from(v))
    }
}

impl From<u64> for RegisterValue {
    fn from(v: u64) -> Self {
        RegisterValue::UInt(v)
    }
}

impl From<i32> for RegisterValue {
    fn from(v: i32) -> Self {
        RegisterValue::Int(i64::from(v))
    }
}

impl From<i64> for RegisterValue {
    fn from(v: i64) -> Self {
        RegisterValue::Int(v)
    }
}

impl From<f32> for RegisterValue {
    fn from(v: f32) -> Self {
        RegisterValue::Float(f64::from(v))
    }
}

impl From<f64> for RegisterValue {
    fn from(v: f64) -> Self {
        RegisterValue::Float(v)
    }
}

impl From<&str> for RegisterValue {
    fn from(v: &str) -> Self {
        RegisterValue::Text(v.to_string())
    }
}

impl From<String> for RegisterValue {
    fn from(v: String) -> Self {
        RegisterValue::Text(v)
    }
}
