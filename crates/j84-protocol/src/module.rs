use serde::{Deserialize, Serialize};

use crate::spn::SupportedSpn;
use crate::test_result::ScaledTestResult;

/// Everything the sequencer has learned about one OBD ECU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OBDModuleInformation {
    pub source_address: u8,
    /// DM5 OBD compliance byte.
    pub obd_compliance: u8,
    /// DM24 SPN support roster.
    #[serde(default)]
    pub supported_spns: Vec<SupportedSpn>,
    /// DM19 calibration information.
    #[serde(default)]
    pub calibrations: Vec<CalibrationInformation>,
    /// DM56 model year / certification family.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_model_year: Option<ModelYearInfo>,
    /// PGN 65259 component identification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<ComponentIdentification>,
    /// DM30 results gathered for SPNs supported in scaled test results.
    #[serde(default)]
    pub scaled_test_results: Vec<ScaledTestResult>,
}

impl OBDModuleInformation {
    pub fn new(source_address: u8, obd_compliance: u8) -> Self {
        Self {
            source_address,
            obd_compliance,
            supported_spns: Vec::new(),
            calibrations: Vec::new(),
            engine_model_year: None,
            component_id: None,
            scaled_test_results: Vec::new(),
        }
    }

    pub fn data_stream_spns(&self) -> impl Iterator<Item = &SupportedSpn> {
        self.supported_spns.iter().filter(|s| s.data_stream)
    }

    pub fn freeze_frame_spns(&self) -> impl Iterator<Item = &SupportedSpn> {
        self.supported_spns.iter().filter(|s| s.freeze_frame)
    }

    pub fn test_result_spns(&self) -> impl Iterator<Item = &SupportedSpn> {
        self.supported_spns.iter().filter(|s| s.scaled_test_results)
    }
}

/// One DM19 calibration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationInformation {
    /// Calibration ID with trailing padding removed.
    pub calibration_id: String,
    /// Calibration verification number.
    pub cvn: u32,
    /// Raw 16 bytes as received.
    pub raw_calibration_id: Vec<u8>,
}

impl CalibrationInformation {
    /// True when the ID is non-empty printable ASCII.
    pub fn has_printable_id(&self) -> bool {
        !self.calibration_id.is_empty()
            && self
                .calibration_id
                .bytes()
                .all(|b| b.is_ascii_graphic() || b == b' ')
    }
}

/// Whether a DM56 model year refers to the engine or the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelYearKind {
    Engine,
    Vehicle,
}

/// DM56 model year and certification family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelYearInfo {
    pub year: u16,
    pub kind: ModelYearKind,
    pub family: String,
}

/// PGN 65259 component identification fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentification {
    pub make: String,
    pub model: String,
    pub serial_number: String,
    pub unit_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_calibration_id() {
        let cal = CalibrationInformation {
            calibration_id: "CAL-0001 A".into(),
            cvn: 0x1234,
            raw_calibration_id: b"CAL-0001 A".to_vec(),
        };
        assert!(cal.has_printable_id());

        let bad = CalibrationInformation {
            calibration_id: "CAL\u{1}".into(),
            ..cal
        };
        assert!(!bad.has_printable_id());
    }

    #[test]
    fn spn_filters() {
        let mut module = OBDModuleInformation::new(0x00, 0x13);
        module.supported_spns = vec![
            SupportedSpn {
                spn: 190,
                length: 2,
                data_stream: true,
                freeze_frame: true,
                scaled_test_results: false,
            },
            SupportedSpn {
                spn: 3226,
                length: 2,
                data_stream: false,
                freeze_frame: false,
                scaled_test_results: true,
            },
        ];
        assert_eq!(module.data_stream_spns().count(), 1);
        assert_eq!(module.freeze_frame_spns().count(), 1);
        assert_eq!(module.test_result_spns().next().map(|s| s.spn), Some(3226));
    }

    #[test]
    fn module_roundtrip() {
        let module = OBDModuleInformation::new(0x3D, 0x13);
        let json = serde_json::to_string(&module).unwrap();
        let back: OBDModuleInformation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, module);
    }
}
