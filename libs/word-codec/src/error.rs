//! Codec error types

use crate::DataType;
use errors::{ErrorCategory, SimError, SimErrorTrait};
use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Codec errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Value outside the representable range of the data type
    #[error("Range error: {value} does not fit {data_type}")]
    OutOfRange { value: String, data_type: DataType },

    /// Value that cannot be interpreted as the data type at all
    #[error("Type mismatch: cannot convert {value:?} to {data_type}")]
    TypeMismatch { value: String, data_type: DataType },

    /// Word slice of the wrong length for decoding
    #[error("Word count mismatch for {data_type}: expected {expected}, got {actual}")]
    WordCount {
        data_type: DataType,
        expected: usize,
        actual: usize,
    },
}

impl CodecError {
    pub(crate) fn out_of_range(value: impl std::fmt::Display, data_type: DataType) -> Self {
        CodecError::OutOfRange {
            value: value.to_string(),
            data_type,
        }
    }

    pub(crate) fn mismatch(value: impl std::fmt::Display, data_type: DataType) -> Self {
        CodecError::TypeMismatch {
            value: value.to_string(),
            data_type,
        }
    }

    /// Data type the failed conversion targeted
    pub fn data_type(&self) -> DataType {
        match self {
            Self::OutOfRange { data_type, .. }
            | Self::TypeMismatch { data_type, .. }
            | Self::WordCount { data_type, .. } => *data_type,
        }
    }
}

impl SimErrorTrait for CodecError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "CODEC_OUT_OF_RANGE",
            Self::TypeMismatch { .. } => "CODEC_TYPE_MISMATCH",
            Self::WordCount { .. } => "CODEC_WORD_COUNT",
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

impl From<CodecError> for SimError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::OutOfRange { value, data_type } => SimError::OutOfRange {
                value,
                data_type: data_type.to_string(),
            },
            other => SimError::Validation(other.to_string()),
        }
    }
}
