//! Unified error handling for the slave simulator
//!
//! Provides the top-level error type used at the binary edge together with the
//! classification trait every crate-local error implements.

use thiserror::Error;

// ============================================================================
// SimError - Main error type
// ============================================================================

/// Main error type for the simulator binary and its shared libraries
#[derive(Debug, Error)]
pub enum SimError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ======================================
    // Register & Data Errors
    // ======================================
    #[error("Value out of range: {value} does not fit {data_type}")]
    OutOfRange { value: String, data_type: String },

    #[error("Address {address} is below base {base} ({context})")]
    AddressBelowBase {
        address: u32,
        base: u32,
        context: String,
    },

    #[error("Unknown register class: {0}")]
    UnknownClass(String),

    #[error("Register overlap: {0}")]
    Overlap(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ======================================
    // Transport & Lifecycle Errors
    // ======================================
    #[error("Transport bind failed: {endpoint}: {reason}")]
    TransportBind { endpoint: String, reason: String },

    #[error("Teardown timed out: {0}")]
    TeardownTimeout(String),

    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ======================================
    // Resource Errors
    // ======================================
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Runtime Errors
    // ======================================
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using SimError
pub type SimResult<T> = Result<T, SimError>;

// Settings loading goes through figment
impl From<figment::Error> for SimError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

// ============================================================================
// SimError implements SimErrorTrait
// ============================================================================

impl SimErrorTrait for SimError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",

            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::AddressBelowBase { .. } => "ADDRESS_BELOW_BASE",
            Self::UnknownClass(_) => "UNKNOWN_CLASS",
            Self::Overlap(_) => "REGISTER_OVERLAP",
            Self::Validation(_) => "VALIDATION_ERROR",

            Self::TransportBind { .. } => "TRANSPORT_BIND_FAILED",
            Self::TeardownTimeout(_) => "TEARDOWN_TIMEOUT",
            Self::ResourceBusy(_) => "RESOURCE_BUSY",
            Self::InvalidState(_) => "INVALID_STATE",

            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",

            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,

            Self::OutOfRange { .. }
            | Self::AddressBelowBase { .. }
            | Self::UnknownClass(_)
            | Self::Validation(_) => ErrorCategory::Validation,

            Self::Overlap(_) | Self::AlreadyExists(_) => ErrorCategory::Conflict,

            Self::TransportBind { .. } => ErrorCategory::Transport,
            Self::TeardownTimeout(_) => ErrorCategory::Timeout,
            Self::ResourceBusy(_) | Self::InvalidState(_) => ErrorCategory::ResourceBusy,

            Self::NotFound { .. } => ErrorCategory::NotFound,

            Self::Io(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

// ============================================================================
// Error Trait - Architectural layer
// ============================================================================

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Timeout,

    // Register layer
    Validation,
    NotFound,
    Conflict,

    // Transport layer
    Transport,

    // System level
    Internal,
    ResourceBusy,
}

/// Error capability trait
///
/// Every crate keeps its own domain-specific error type (e.g. the codec's
/// `CodecError`) and gains the common interface by implementing this trait.
pub trait SimErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and status lines)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether retrying the same operation can succeed without operator action.
    ///
    /// Bind failures are never retried automatically, so transport errors are
    /// not retryable.
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Timeout | ErrorCategory::ResourceBusy
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal => Level::ERROR,
            ErrorCategory::Transport | ErrorCategory::Timeout | ErrorCategory::ResourceBusy => {
                Level::WARN
            },
            ErrorCategory::Validation | ErrorCategory::NotFound | ErrorCategory::Conflict => {
                Level::INFO
            },
            ErrorCategory::Configuration => Level::WARN,
        }
    }
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SimError::UnknownClass("xx".into()).error_code(),
            "UNKNOWN_CLASS"
        );
        assert_eq!(
            SimError::TransportBind {
                endpoint: "0.0.0.0:5020".into(),
                reason: "address in use".into()
            }
            .error_code(),
            "TRANSPORT_BIND_FAILED"
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(SimError::TeardownTimeout("slave1".into()).is_retryable());
        assert!(SimError::ResourceBusy("COM1".into()).is_retryable());
        assert!(!SimError::TransportBind {
            endpoint: "COM1".into(),
            reason: "permission denied".into()
        }
        .is_retryable());
        assert!(!SimError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(
            SimError::Internal("boom".into()).log_level(),
            tracing::Level::ERROR
        );
        assert_eq!(
            SimError::Overlap("HR:10".into()).log_level(),
            tracing::Level::INFO
        );
    }

    #[test]
    fn test_figment_error_is_configuration() {
        let err = figment::Figment::new()
            .extract_inner::<u16>("port")
            .unwrap_err();
        let sim: SimError = err.into();
        assert!(matches!(sim, SimError::Configuration(_)));
        assert_eq!(sim.log_level(), tracing::Level::WARN);
    }
}
