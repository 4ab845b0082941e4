//! Error handling for the slave simulator
//!
//! Every rejected operation carries the register class, address and data type
//! needed to find the offending configuration entry.

use errors::{ErrorCategory, SimError, SimErrorTrait};
use thiserror::Error;
use word_codec::CodecError;

/// Slave simulator error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlaveSimError {
    /// Value does not fit the register's data type
    #[error("Range error at {location} ({data_type}): {detail}")]
    Range {
        location: String,
        data_type: String,
        detail: String,
    },

    /// Access before the store's configured base
    #[error("Address {address} is below base {base} in {class}")]
    AddressBelowBase {
        class: String,
        address: u32,
        base: u32,
    },

    /// Register class tag outside co/di/hr/ir
    #[error("Unknown register class: {0:?}")]
    UnknownClass(String),

    /// Register address ranges collide in the same class
    #[error("Address range of {candidate} overlaps with existing register at {existing}")]
    Overlap { candidate: String, existing: String },

    /// Listener could not bind its transport
    #[error("Transport bind failed for {endpoint}: {reason}")]
    TransportBind { endpoint: String, reason: String },

    /// Transport already owned by another slave
    #[error("Transport {endpoint} already in use by slave {owner}")]
    ResourceConflict { endpoint: String, owner: String },

    /// Background listener did not exit within the grace window
    #[error("Teardown of {endpoint} did not finish within {waited_ms} ms")]
    TeardownTimeout { endpoint: String, waited_ms: u64 },

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Slave not found: {0}")]
    SlaveNotFound(String),

    #[error("Slave already exists: {0}")]
    SlaveExists(String),

    #[error("Register not found: {slave}[{index}]")]
    RegisterNotFound { slave: String, index: usize },

    /// Configuration document or settings problems
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input that is not a value of the register's type at all
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the slave simulator
pub type Result<T> = std::result::Result<T, SlaveSimError>;

impl SlaveSimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SlaveSimError::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SlaveSimError::ValidationError(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SlaveSimError::InvalidState(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SlaveSimError::InternalError(msg.into())
    }

    pub fn bind(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SlaveSimError::TransportBind {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach register location to a codec failure
    pub fn codec(err: CodecError, location: impl Into<String>) -> Self {
        match err {
            CodecError::OutOfRange { value, data_type } => SlaveSimError::Range {
                location: location.into(),
                data_type: data_type.to_string(),
                detail: format!("{} is outside the representable range", value),
            },
            other => SlaveSimError::ValidationError(format!("{}: {}", location.into(), other)),
        }
    }
}

impl From<std::io::Error> for SlaveSimError {
    fn from(err: std::io::Error) -> Self {
        SlaveSimError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for SlaveSimError {
    fn from(err: serde_json::Error) -> Self {
        SlaveSimError::ConfigError(format!("JSON: {err}"))
    }
}

impl From<SimError> for SlaveSimError {
    fn from(err: SimError) -> Self {
        SlaveSimError::ConfigError(err.to_string())
    }
}

impl SimErrorTrait for SlaveSimError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Range { .. } => "RANGE_ERROR",
            Self::AddressBelowBase { .. } => "ADDRESS_BELOW_BASE",
            Self::UnknownClass(_) => "UNKNOWN_CLASS",
            Self::Overlap { .. } => "REGISTER_OVERLAP",
            Self::TransportBind { .. } => "TRANSPORT_BIND_FAILED",
            Self::ResourceConflict { .. } => "RESOURCE_CONFLICT",
            Self::TeardownTimeout { .. } => "TEARDOWN_TIMEOUT",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::SlaveNotFound(_) => "SLAVE_NOT_FOUND",
            Self::SlaveExists(_) => "SLAVE_EXISTS",
            Self::RegisterNotFound { .. } => "REGISTER_NOT_FOUND",
            Self::ConfigError(_) => "CONFIGURATION_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Range { .. }
            | Self::AddressBelowBase { .. }
            | Self::UnknownClass(_)
            | Self::ValidationError(_) => ErrorCategory::Validation,
            Self::Overlap { .. } | Self::SlaveExists(_) => ErrorCategory::Conflict,
            Self::TransportBind { .. } => ErrorCategory::Transport,
            Self::ResourceConflict { .. } | Self::InvalidState(_) => ErrorCategory::ResourceBusy,
            Self::TeardownTimeout { .. } => ErrorCategory::Timeout,
            Self::SlaveNotFound(_) | Self::RegisterNotFound { .. } => ErrorCategory::NotFound,
            Self::ConfigError(_) => ErrorCategory::Configuration,
            Self::IoError(_) | Self::InternalError(_) => ErrorCategory::Internal,
        }
    }
}

impl From<SlaveSimError> for SimError {
    fn from(err: SlaveSimError) -> Self {
        match err {
            SlaveSimError::Range {
                location,
                data_type,
                detail,
            } => SimError::OutOfRange {
                value: format!("{location}: {detail}"),
                data_type,
            },
            SlaveSimError::AddressBelowBase {
                class,
                address,
                base,
            } => SimError::AddressBelowBase {
                address,
                base,
                context: class,
            },
            SlaveSimError::UnknownClass(tag) => SimError::UnknownClass(tag),
            err @ SlaveSimError::Overlap { .. } => SimError::Overlap(err.to_string()),
            SlaveSimError::TransportBind { endpoint, reason } => {
                SimError::TransportBind { endpoint, reason }
            },
            err @ SlaveSimError::ResourceConflict { .. } => SimError::ResourceBusy(err.to_string()),
            err @ SlaveSimError::TeardownTimeout { .. } => SimError::TeardownTimeout(err.to_string()),
            SlaveSimError::InvalidState(msg) => SimError::InvalidState(msg),
            SlaveSimError::SlaveNotFound(name) => SimError::NotFound {
                resource: format!("Slave: {}", name),
            },
            err @ SlaveSimError::RegisterNotFound { .. } => SimError::NotFound {
                resource: err.to_string(),
            },
            SlaveSimError::SlaveExists(name) => SimError::AlreadyExists(name),
            SlaveSimError::ConfigError(msg) => SimError::Configuration(msg),
            SlaveSimError::ValidationError(msg) => SimError::Validation(msg),
            SlaveSimError::IoError(msg) => SimError::Io(std::io::Error::other(msg)),
            SlaveSimError::InternalError(msg) => SimError::Internal(msg),
        }
    }
}
