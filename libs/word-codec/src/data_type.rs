//! Register data types

use serde::{Deserialize, Serialize};

/// Application-level data type stored in one or more register words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Single unsigned word
    #[default]
    Uint16,
    /// Two's complement, 2 words
    Int32,
    /// Unsigned, 2 words
    Uint32,
    /// IEEE-754 single precision, 2 words
    Float32,
    /// Two's complement, 4 words
    Int64,
    /// Unsigned, 4 words
    Uint64,
    /// IEEE-754 double precision, 4 words
    Double64,
    /// Two bytes per word, `string_length` words
    String,
    /// Single word holding 0 or 1
    Bool,
}

impl DataType {
    /// All supported data types in configuration order
    pub const ALL: [DataType; 9] = [
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Int64,
        Self::Uint64,
        Self::Double64,
        Self::String,
        Self::Bool,
    ];

    /// Convert from common string formats
    ///
    /// Accepts the configuration names plus the usual aliases
    /// ("u16", "i32", "float", "double", "f64", "str", "boolean", ...).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "uint16" | "u16" | "word" => Some(Self::Uint16),
            "int32" | "i32" => Some(Self::Int32),
            "uint32" | "u32" | "dword" => Some(Self::Uint32),
            "float32" | "f32" | "float" => Some(Self::Float32),
            "int64" | "i64" => Some(Self::Int64),
            "uint64" | "u64" | "qword" => Some(Self::Uint64),
            "double64" | "f64" | "float64" | "double" => Some(Self::Double64),
            "string" | "str" => Some(Self::String),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Get configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Double64 => "double64",
            Self::String => "string",
            Self::Bool => "bool",
        }
    }

    /// Number of words occupied by a value of this type
    ///
    /// `string_length` is only consulted for `String`.
    pub fn word_count(&self, string_length: usize) -> usize {
        match self {
            Self::Uint16 | Self::Bool => 1,
            Self::Int32 | Self::Uint32 | Self::Float32 => 2,
            Self::Int64 | Self::Uint64 | Self::Double64 => 4,
            Self::String => string_length,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
