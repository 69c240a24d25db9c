use serde::{Deserialize, Serialize};

/// One SPN entry from a DM24 (SPN support) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedSpn {
    pub spn: u32,
    /// Data length in bytes as reported by the ECU.
    pub length: u8,
    /// Supported in the data stream (broadcast or on request).
    pub data_stream: bool,
    /// Supported in expanded freeze frame.
    pub freeze_frame: bool,
    /// Supported in DM7/DM30 scaled test results.
    pub scaled_test_results: bool,
}

impl SupportedSpn {
    /// Decode a 4-byte DM24 record. Support flags are active low.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let spn = (bytes[0] as u32) | ((bytes[1] as u32) << 8) | (((bytes[2] & 0xE0) as u32) << 11);
        let flags = bytes[2];
        Self {
            spn,
            length: bytes[3],
            freeze_frame: flags & 0x01 == 0,
            data_stream: flags & 0x02 == 0,
            scaled_test_results: flags & 0x04 == 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut flags = 0x1Fu8;
        if self.freeze_frame {
            flags &= !0x01;
        }
        if self.data_stream {
            flags &= !0x02;
        }
        if self.scaled_test_results {
            flags &= !0x04;
        }
        [
            (self.spn & 0xFF) as u8,
            ((self.spn >> 8) & 0xFF) as u8,
            (((self.spn >> 11) & 0xE0) as u8) | flags,
            self.length,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_stream_only() {
        // SPN 190, data stream supported, FF and test results not supported
        let spn = SupportedSpn::from_bytes([0xBE, 0x00, 0x1D, 0x02]);
        assert_eq!(spn.spn, 190);
        assert!(spn.data_stream);
        assert!(!spn.freeze_frame);
        assert!(!spn.scaled_test_results);
        assert_eq!(spn.length, 2);
    }

    #[test]
    fn all_flags_supported() {
        let spn = SupportedSpn::from_bytes([0x6E, 0x00, 0x18, 0x01]);
        assert!(spn.data_stream && spn.freeze_frame && spn.scaled_test_results);
        assert_eq!(spn.to_bytes(), [0x6E, 0x00, 0x18, 0x01]);
    }
}
