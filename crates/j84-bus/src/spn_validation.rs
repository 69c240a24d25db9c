//! SPN support validation: required data-stream parameters per fuel type
//! and the values actually observed on the bus.

use std::collections::BTreeSet;

use j84_protocol::module::OBDModuleInformation;
use j84_protocol::vehicle::FuelType;
use serde::Serialize;

use crate::pgn_db;
use crate::types::Packet;

/// Data-stream SPNs every OBD vehicle must support.
pub const COMMON_DATA_STREAM_SPNS: &[u32] = &[84, 91, 92, 108, 110, 190, 513];

/// Additional data-stream SPNs for compression ignition engines.
pub const COMPRESSION_IGNITION_SPNS: &[u32] = &[102, 183];

/// Additional data-stream SPNs for spark ignition engines.
pub const SPARK_IGNITION_SPNS: &[u32] = &[51, 132];

/// SPNs that must be captured in freeze frames.
pub const FREEZE_FRAME_SPNS: &[u32] = &[92, 110, 190, 513];

/// Data-stream SPNs required for `fuel`, sorted.
pub fn required_data_stream(fuel: FuelType) -> Vec<u32> {
    let mut spns = COMMON_DATA_STREAM_SPNS.to_vec();
    if fuel.is_compression_ignition() {
        spns.extend_from_slice(COMPRESSION_IGNITION_SPNS);
    }
    if fuel.is_spark_ignition() {
        spns.extend_from_slice(SPARK_IGNITION_SPNS);
    }
    spns.sort_unstable();
    spns.dedup();
    spns
}

/// Required data-stream SPNs that no OBD module supports.
pub fn missing_required(modules: &[OBDModuleInformation], fuel: FuelType) -> Vec<u32> {
    let supported: BTreeSet<u32> = modules
        .iter()
        .flat_map(|m| m.data_stream_spns())
        .map(|s| s.spn)
        .collect();
    required_data_stream(fuel)
        .into_iter()
        .filter(|spn| !supported.contains(spn))
        .collect()
}

/// Required freeze-frame SPNs that no OBD module supports.
pub fn missing_freeze_frame(modules: &[OBDModuleInformation]) -> Vec<u32> {
    let supported: BTreeSet<u32> = modules
        .iter()
        .flat_map(|m| m.freeze_frame_spns())
        .map(|s| s.spn)
        .collect();
    FREEZE_FRAME_SPNS
        .iter()
        .copied()
        .filter(|spn| !supported.contains(spn))
        .collect()
}

/// Problem with a supported SPN's observed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SpnProblem {
    /// No packet carrying the SPN was seen.
    NotProvided { spn: u32 },
    /// Every observed value was "not available".
    NotAvailable { spn: u32 },
    /// At least one value was an error indicator.
    ErrorIndicator { spn: u32 },
}

impl SpnProblem {
    pub fn spn(&self) -> u32 {
        match *self {
            SpnProblem::NotProvided { spn }
            | SpnProblem::NotAvailable { spn }
            | SpnProblem::ErrorIndicator { spn } => spn,
        }
    }
}

impl std::fmt::Display for SpnProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpnProblem::NotProvided { spn } => write!(f, "SPN {spn} supported but not provided"),
            SpnProblem::NotAvailable { spn } => write!(f, "SPN {spn} reported as not available"),
            SpnProblem::ErrorIndicator { spn } => write!(f, "SPN {spn} reported an error indicator"),
        }
    }
}

/// Check the values of supported data-stream SPNs in `packets`.
///
/// `packets` should come from the module that declared support. SPNs
/// without a definition are skipped.
pub fn validate_provided(supported: &[u32], packets: &[Packet]) -> Vec<SpnProblem> {
    let mut problems = Vec::new();
    for &spn in supported {
        let Some(def) = pgn_db::spn(spn) else {
            continue;
        };
        let values: Vec<_> = packets
            .iter()
            .filter(|p| p.pgn == def.pgn)
            .filter_map(|p| def.value(&p.payload))
            .collect();

        if values.is_empty() {
            problems.push(SpnProblem::NotProvided { spn });
        } else if values.iter().all(|v| v.is_not_available()) {
            problems.push(SpnProblem::NotAvailable { spn });
        } else if values.iter().any(|v| v.is_error()) {
            problems.push(SpnProblem::ErrorIndicator { spn });
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgn_db::{PGN_EEC1, PGN_ET1};
    use crate::types::GLOBAL_ADDR;
    use j84_protocol::spn::SupportedSpn;

    fn module(addr: u8, spns: &[(u32, bool, bool)]) -> OBDModuleInformation {
        let mut m = OBDModuleInformation::new(addr, 0x13);
        m.supported_spns = spns
            .iter()
            .map(|&(spn, data_stream, freeze_frame)| SupportedSpn {
                spn,
                length: 1,
                data_stream,
                freeze_frame,
                scaled_test_results: false,
            })
            .collect();
        m
    }

    #[test]
    fn required_lists_by_fuel() {
        assert_eq!(
            required_data_stream(FuelType::Diesel),
            vec![84, 91, 92, 102, 108, 110, 183, 190, 513]
        );
        assert_eq!(
            required_data_stream(FuelType::Gasoline),
            vec![51, 84, 91, 92, 108, 110, 132, 190, 513]
        );
    }

    #[test]
    fn missing_spread_across_modules() {
        let engine = module(0x00, &[(84, true, false), (91, true, false), (92, true, true), (190, true, true)]);
        let other = module(0x3D, &[(108, true, false), (110, true, true), (513, true, true), (102, true, false)]);
        assert_eq!(missing_required(&[engine.clone(), other.clone()], FuelType::Diesel), vec![183]);
        assert!(missing_freeze_frame(&[engine.clone(), other]).is_empty());
        assert_eq!(missing_freeze_frame(&[engine]), vec![110, 513]);
    }

    #[test]
    fn provided_values_classified() {
        let eec1 = Packet::new(PGN_EEC1, 0x00, GLOBAL_ADDR, vec![0xF0, 0x7D, 0x7D, 0x40, 0x1F, 0xFF, 0xFF, 0xFF]);
        let et1_na = Packet::new(PGN_ET1, 0x00, GLOBAL_ADDR, vec![0xFF; 8]);
        let mut eec1_err = eec1.clone();
        eec1_err.payload[2] = 0xFE;

        let problems = validate_provided(&[190, 110, 84, 513, 9999], &[eec1, et1_na, eec1_err]);
        assert_eq!(
            problems,
            vec![
                SpnProblem::NotAvailable { spn: 110 },
                SpnProblem::NotProvided { spn: 84 },
                SpnProblem::ErrorIndicator { spn: 513 },
            ]
        );
    }
}
