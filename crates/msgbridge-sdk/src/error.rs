//! Recoverable errors reported to bridge callers
//!
//! Setup and binding defects never show up here: those terminate the
//! process. These variants cover operational failures a caller can degrade
//! around.

/// Result type for recoverable bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Operational bridge errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// A class looked up at runtime does not exist
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// The foreign runtime could not produce the requested object
    #[error("{operation} returned nil")]
    NilResult {
        /// Operation that produced nil
        operation: String,
    },

    /// A data constant could not be resolved
    #[error("Constant not found: {0}")]
    ConstantNotFound(String),

    /// A method type encoding could not be parsed
    #[error("Invalid type encoding: {0}")]
    InvalidEncoding(String),

    /// The bridge has not been initialized yet
    #[error("Bridge not initialized")]
    NotInitialized,

    /// A host string could not be handed to the foreign runtime
    #[error("Invalid string: {0}")]
    InvalidString(String),
}

impl BridgeError {
    /// Build a `NilResult` for the given operation name
    pub fn nil(operation: impl Into<String>) -> Self {
        BridgeError::NilResult {
            operation: operation.into(),
        }
    }
}

impl From<crate::encoding::EncodingError> for BridgeError {
    fn from(e: crate::encoding::EncodingError) -> Self {
        BridgeError::InvalidEncoding(e.to_string())
    }
}

impl From<std::ffi::NulError> for BridgeError {
    fn from(e: std::ffi::NulError) -> Self {
        BridgeError::InvalidString(e.to_string())
    }
}
