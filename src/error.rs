//! # Error Types for the Annex Covenant
//!
//! This module provides the error handling for covenant commitment,
//! follow-on reconstruction and the node service glue.

use thiserror::Error;

/// Main error type for all covenant operations
#[derive(Debug, Error)]
pub enum CovenantError {
    /// Malformed PSBT, hex or transaction bytes on input
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Address parsing and network validation errors
    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    /// The commitment amount cannot cover the follow-on fee
    #[error(
        "Insufficient amount: commitment holds {amount} sats, follow-on fee is {fee} sats"
    )]
    InsufficientAmount { amount: u64, fee: u64 },

    /// The configured commitment output index is out of range
    #[error("Output {index} not found: transaction has {count} outputs")]
    OutputNotFound { index: u32, count: usize },

    /// The designated output does not carry the placeholder script
    #[error("Output {index} does not hold the placeholder script")]
    NotPlaceholder { index: u32 },

    /// Any other violated precondition
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    /// The embedded signature does not have the expected length
    #[error("Malformed signature: expected 64 bytes, got {length}")]
    MalformedSignature { length: usize },

    /// The witness stack of the committing input has the wrong shape
    #[error("Unexpected witness layout: expected {expected} elements, got {actual}")]
    WitnessLayout { expected: usize, actual: usize },

    /// Key generation, sighash or signing failures
    #[error("Cryptographic operation failed: {message}")]
    Cryptography { message: String },

    /// Bitcoin RPC communication failures
    #[error("RPC communication failed: {source}")]
    Rpc {
        #[from]
        source: bitcoincore_rpc::Error,
    },

    /// File I/O operations
    #[error("File operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for covenant operations
pub type CovenantResult<T> = Result<T, CovenantError>;

/// Coarse classification of a [`CovenantError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Precondition,
    Structural,
    Crypto,
    Service,
}

impl CovenantError {
    /// Create a decode error with a message
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a precondition error with a message
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create a cryptography error with a message
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Cryptography {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CovenantError::Decode { .. } | CovenantError::InvalidAddress { .. } => {
                ErrorKind::Decode
            }
            CovenantError::InsufficientAmount { .. }
            | CovenantError::OutputNotFound { .. }
            | CovenantError::NotPlaceholder { .. }
            | CovenantError::Precondition { .. } => ErrorKind::Precondition,
            CovenantError::MalformedSignature { .. } | CovenantError::WitnessLayout { .. } => {
                ErrorKind::Structural
            }
            CovenantError::Cryptography { .. } => ErrorKind::Crypto,
            CovenantError::Rpc { .. } | CovenantError::Io { .. } | CovenantError::Json { .. } => {
                ErrorKind::Service
            }
        }
    }

    /// Check if this error indicates a security issue
    pub fn is_security_critical(&self) -> bool {
        matches!(self.kind(), ErrorKind::Crypto | ErrorKind::Structural)
    }
}
