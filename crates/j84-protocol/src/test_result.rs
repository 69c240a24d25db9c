use serde::{Deserialize, Serialize};

/// Test value reported before a monitor has run since the last code clear.
pub const TEST_VALUE_INITIALIZED: u16 = 0xFB00;

/// Limit value meaning "no limit / not available".
pub const TEST_LIMIT_NOT_AVAILABLE: u16 = 0xFFFF;

/// DM30 scaled test result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledTestResult {
    pub test_id: u8,
    pub spn: u32,
    pub fmi: u8,
    /// Scaling, limit, offset and transfer function identifier.
    pub slot_id: u16,
    pub value: u16,
    pub max: u16,
    pub min: u16,
}

/// Interpretation of a scaled test result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResultState {
    /// Test has not completed since the last clear.
    Initialized,
    Passed,
    Failed,
    /// Value or limits carry J1939 "not available" / "error" codes.
    NotAvailable,
}

impl ScaledTestResult {
    pub fn is_initialized(&self) -> bool {
        self.value == TEST_VALUE_INITIALIZED
            && self.max == TEST_LIMIT_NOT_AVAILABLE
            && self.min == TEST_LIMIT_NOT_AVAILABLE
    }

    pub fn state(&self) -> TestResultState {
        if self.is_initialized() {
            return TestResultState::Initialized;
        }
        if self.value > 0xFAFF {
            return TestResultState::NotAvailable;
        }
        let above = self.max <= 0xFAFF && self.value > self.max;
        let below = self.min <= 0xFAFF && self.value < self.min;
        if above || below {
            TestResultState::Failed
        } else {
            TestResultState::Passed
        }
    }
}
