//! Request safety guard. Blocks DTC clearing unless explicitly enabled.
//!
//! Clear requests (DM3 previously active, DM11 active) erase emissions
//! fault history on every ECU that accepts them, so the engine refuses to
//! send them unless the caller opted in.

use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM3, PGN_DM11};

/// PGNs whose request clears diagnostic information.
pub const CLEAR_PGNS: &[u32] = &[PGN_DM3, PGN_DM11];

/// Policy applied to every outgoing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestPolicy {
    pub allow_clear: bool,
}

impl RequestPolicy {
    pub fn allowing_clear() -> Self {
        Self { allow_clear: true }
    }

    /// Validates that a request for `pgn` is allowed under this policy.
    pub fn check(&self, pgn: u32) -> J1939Result<()> {
        if CLEAR_PGNS.contains(&pgn) && !self.allow_clear {
            return Err(J1939Error::SafetyViolation { pgn });
        }
        Ok(())
    }
}
