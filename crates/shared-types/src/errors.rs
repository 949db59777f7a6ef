//! # Error Types
//!
//! Errors raised while parsing value objects from their text form.

use thiserror::Error;

/// Errors that can occur when parsing an address, hash or amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    /// The input was not valid hexadecimal.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded byte length did not match the expected width.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The input was not a valid unsigned integer.
    #[error("Invalid integer: {0}")]
    InvalidInteger(String),
}
