use std::fmt;

use serde::{Deserialize, Serialize};

/// J1939-73 Diagnostic Trouble Code (SPN + FMI + occurrence count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticTroubleCode {
    /// Suspect Parameter Number (19 bits).
    pub spn: u32,
    /// Failure Mode Identifier (5 bits).
    pub fmi: u8,
    /// Occurrence count (7 bits, 127 = not available).
    pub occurrence_count: u8,
    /// SPN conversion method bit.
    pub conversion_method: u8,
}

impl DiagnosticTroubleCode {
    pub fn new(spn: u32, fmi: u8, occurrence_count: u8) -> Self {
        Self {
            spn,
            fmi,
            occurrence_count,
            conversion_method: 0,
        }
    }

    /// Decode a 4-byte DTC record.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let spn = (bytes[0] as u32) | ((bytes[1] as u32) << 8) | (((bytes[2] & 0xE0) as u32) << 11);
        Self {
            spn,
            fmi: bytes[2] & 0x1F,
            occurrence_count: bytes[3] & 0x7F,
            conversion_method: (bytes[3] >> 7) & 0x01,
        }
    }

    /// Encode into a 4-byte DTC record.
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            (self.spn & 0xFF) as u8,
            ((self.spn >> 8) & 0xFF) as u8,
            (((self.spn >> 11) & 0xE0) as u8) | (self.fmi & 0x1F),
            ((self.conversion_method & 0x01) << 7) | (self.occurrence_count & 0x7F),
        ]
    }
}

impl fmt::Display for DiagnosticTroubleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPN {} FMI {}", self.spn, self.fmi)
    }
}

/// Lamp state reported alongside DTCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LampStatus {
    Off,
    On,
    SlowFlash,
    FastFlash,
    /// Reserved or error encoding.
    Other,
    NotSupported,
}

impl LampStatus {
    /// Decode from the 2-bit status field and its 2-bit flash field.
    pub fn from_bits(status: u8, flash: u8) -> Self {
        match status & 0x03 {
            0b00 => LampStatus::Off,
            0b01 => match flash & 0x03 {
                0b00 => LampStatus::SlowFlash,
                0b01 => LampStatus::FastFlash,
                0b11 => LampStatus::On,
                _ => LampStatus::Other,
            },
            0b10 => LampStatus::Other,
            _ => LampStatus::NotSupported,
        }
    }

    /// Encode back to `(status, flash)` bit pairs.
    pub fn to_bits(self) -> (u8, u8) {
        match self {
            LampStatus::Off => (0b00, 0b11),
            LampStatus::On => (0b01, 0b11),
            LampStatus::SlowFlash => (0b01, 0b00),
            LampStatus::FastFlash => (0b01, 0b01),
            LampStatus::Other => (0b10, 0b11),
            LampStatus::NotSupported => (0b11, 0b11),
        }
    }
}

/// The four lamps carried in the first two bytes of a DTC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lamps {
    pub mil: LampStatus,
    pub red_stop: LampStatus,
    pub amber_warning: LampStatus,
    pub protect: LampStatus,
}

impl Lamps {
    pub fn all_off() -> Self {
        Self {
            mil: LampStatus::Off,
            red_stop: LampStatus::Off,
            amber_warning: LampStatus::Off,
            protect: LampStatus::Off,
        }
    }

    pub fn from_bytes(status: u8, flash: u8) -> Self {
        let lamp = |shift: u8| LampStatus::from_bits(status >> shift, flash >> shift);
        Self {
            mil: lamp(6),
            red_stop: lamp(4),
            amber_warning: lamp(2),
            protect: lamp(0),
        }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        let mut status = 0u8;
        let mut flash = 0u8;
        for (lamp, shift) in [
            (self.mil, 6),
            (self.red_stop, 4),
            (self.amber_warning, 2),
            (self.protect, 0),
        ] {
            let (s, f) = lamp.to_bits();
            status |= s << shift;
            flash |= f << shift;
        }
        [status, flash]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_dtc_with_high_spn_bits() {
        // SPN 520348 (0x7F09C), FMI 31, OC 1
        let dtc = DiagnosticTroubleCode::from_bytes([0x9C, 0xF0, 0xFF, 0x01]);
        assert_eq!(dtc.spn, 0x7F09C);
        assert_eq!(dtc.fmi, 31);
        assert_eq!(dtc.occurrence_count, 1);
        assert_eq!(dtc.to_bytes(), [0x9C, 0xF0, 0xFF, 0x01]);
    }

    #[test]
    fn decode_coolant_temp_dtc() {
        let dtc = DiagnosticTroubleCode::from_bytes([0x6E, 0x00, 0x00, 0x81]);
        assert_eq!(dtc.spn, 110);
        assert_eq!(dtc.fmi, 0);
        assert_eq!(dtc.occurrence_count, 1);
        assert_eq!(dtc.conversion_method, 1);
        assert_eq!(dtc.to_string(), "SPN 110 FMI 0");
    }

    #[test]
    fn lamp_status_decoding() {
        assert_eq!(LampStatus::from_bits(0b00, 0b11), LampStatus::Off);
        assert_eq!(LampStatus::from_bits(0b01, 0b11), LampStatus::On);
        assert_eq!(LampStatus::from_bits(0b01, 0b00), LampStatus::SlowFlash);
        assert_eq!(LampStatus::from_bits(0b01, 0b01), LampStatus::FastFlash);
        assert_eq!(LampStatus::from_bits(0b01, 0b10), LampStatus::Other);
        assert_eq!(LampStatus::from_bits(0b11, 0b11), LampStatus::NotSupported);
    }

    #[test]
    fn lamps_from_bytes() {
        // MIL on, others off, flash bytes "do not flash"
        let lamps = Lamps::from_bytes(0x40, 0xFF);
        assert_eq!(lamps.mil, LampStatus::On);
        assert_eq!(lamps.red_stop, LampStatus::Off);
        assert_eq!(lamps.amber_warning, LampStatus::Off);
        assert_eq!(lamps.protect, LampStatus::Off);
        assert_eq!(lamps.to_bytes(), [0x40, 0xFF]);
    }

    #[test]
    fn lamp_serialization() {
        assert_eq!(
            serde_json::to_string(&LampStatus::FastFlash).unwrap(),
            r#""fast_flash""#
        );
    }
}
