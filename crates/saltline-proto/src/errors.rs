//! Error types for wire-format decoding.
//!
//! Decode errors are local to the envelope or container item being read.
//! The session layer reports them per item and never lets one abort its
//! siblings, so the taxonomy here stays deliberately small.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding wire data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes remain than the fixed-size read requires.
    #[error("truncated input: need {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the read required.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },
}
