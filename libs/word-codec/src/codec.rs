//! Encode / decode entry points

use serde::{Deserialize, Serialize};

use crate::conversions::{bits_to_words, pack_string, unpack_string, words_to_bits};
use crate::error::{CodecError, Result};
use crate::{DataType, RegisterValue, WordOrder};

/// How a register's value is laid out in words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFormat {
    pub data_type: DataType,
    #[serde(default)]
    pub order: WordOrder,
    /// Window size in words, only meaningful for `string`
    #[serde(default = "default_string_length")]
    pub string_length: usize,
}

fn default_string_length() -> usize {
    1
}

impl RegisterFormat {
    pub fn new(data_type: DataType, order: WordOrder) -> Self {
        Self {
            data_type,
            order,
            string_length: default_string_length(),
        }
    }

    pub fn with_string_length(mut self, string_length: usize) -> Self {
        self.string_length = string_length;
        self
    }

    /// Words occupied by this format
    pub fn word_count(&self) -> usize {
        self.data_type.word_count(self.string_length)
    }
}

/// Number of words a value of `format` occupies
pub fn size_of(format: &RegisterFormat) -> usize {
    format.word_count()
}

/// Encode a value into exactly [`size_of`] words
///
/// The value is first coerced into the data type; values outside the
/// representable range fail with [`CodecError::OutOfRange`].
pub fn encode(format: &RegisterFormat, value: &RegisterValue) -> Result<Vec<u16>> {
    let data_type = format.data_type;
    let order = format.order;
    let canonical = value.coerce(data_type)?;

    let words = match (data_type, &canonical) {
        (DataType::Uint16, RegisterValue::UInt(v)) => vec![*v as u16],
        (DataType::Bool, RegisterValue::Bool(b)) => vec![u16::from(*b)],
        (DataType::Int32, RegisterValue::Int(v)) => {
            bits_to_words(u64::from(*v as i32 as u32), 2, order)
        },
        (DataType::Uint32, RegisterValue::UInt(v)) => bits_to_words(*v, 2, order),
        (DataType::Float32, RegisterValue::Float(v)) => {
            bits_to_words(u64::from((*v as f32).to_bits()), 2, order)
        },
        (DataType::Int64, RegisterValue::Int(v)) => bits_to_words(*v as u64, 4, order),
        (DataType::Uint64, RegisterValue::UInt(v)) => bits_to_words(*v, 4, order),
        (DataType::Double64, RegisterValue::Float(v)) => bits_to_words(v.to_bits(), 4, order),
        (DataType::String, RegisterValue::Text(s)) => pack_string(s, format.string_length, order),
        (_, other) => return Err(CodecError::mismatch(other, data_type)),
    };

    Ok(words)
}

/// Decode exactly [`size_of`] words into the canonical value
pub fn decode(format: &RegisterFormat, words: &[u16]) -> Result<RegisterValue> {
    let expected = format.word_count();
    if words.len() != expected {
        return Err(CodecError::WordCount {
            data_type: format.data_type,
            expected,
            actual: words.len(),
        });
    }

    let order = format.order;
    let value = match format.data_type {
        DataType::Uint16 => RegisterValue::UInt(u64::from(words[0])),
        DataType::Bool => RegisterValue::Bool(words[0] != 0),
        DataType::Int32 => RegisterValue::Int(i64::from(words_to_bits(words, order) as u32 as i32)),
        DataType::Uint32 => RegisterValue::UInt(words_to_bits(words, order)),
        DataType::Float32 => {
            RegisterValue::Float(f64::from(f32::from_bits(words_to_bits(words, order) as u32)))
        },
        DataType::Int64 => RegisterValue::Int(words_to_bits(words, order) as i64),
        DataType::Uint64 => RegisterValue::UInt(words_to_bits(words, order)),
        DataType::Double64 => RegisterValue::Float(f64::from_bits(words_to_bits(words, order))),
        DataType::String => RegisterValue::Text(unpack_string(words, order)),
    };

    Ok(value)
}
