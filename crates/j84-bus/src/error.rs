//! J1939 bus error types.

use thiserror::Error;

/// Errors that can occur during J1939 bus operations.
#[derive(Debug, Error)]
pub enum J1939Error {
    #[error("CAN interface error: {0}")]
    Interface(String),

    #[error("J1939 protocol error: {0}")]
    Protocol(String),

    #[error("Safety violation: request for PGN {pgn} is not allowed")]
    SafetyViolation { pgn: u32 },

    #[error("Response timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transport protocol error: {0}")]
    Transport(String),

    #[error("PGN {pgn} decode error: {reason}")]
    Decode { pgn: u32, reason: String },
}

impl J1939Error {
    pub fn decode(pgn: u32, reason: impl Into<String>) -> Self {
        J1939Error::Decode {
            pgn,
            reason: reason.into(),
        }
    }
}

/// Convenience alias for J1939 results.
pub type J1939Result<T> = Result<T, J1939Error>;
