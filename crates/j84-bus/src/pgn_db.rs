//! Static PGN and SPN definitions for the parameters the sequencer checks.
//!
//! Lookups are linear scans over small tables. Value extraction classifies
//! raw values into the J1939-71 ranges (valid, parameter specific, error,
//! not available).

use std::time::Duration;

use serde::Serialize;

use crate::types::{PGN_COMPONENT_ID, PGN_DM1, PGN_ENGINE_HOURS, PGN_VIN};

/// Parameter group definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PgnDefinition {
    pub pgn: u32,
    pub label: &'static str,
    pub acronym: &'static str,
    /// Broadcast period; `None` means sent on request only.
    pub rate: Option<Duration>,
}

/// Suspect parameter definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpnDefinition {
    pub spn: u32,
    pub label: &'static str,
    pub pgn: u32,
    /// Zero-based byte offset of the parameter's first byte.
    pub byte_offset: usize,
    pub bit_offset: u8,
    pub bit_length: u8,
    pub resolution: f64,
    pub offset: f64,
    pub unit: &'static str,
}

/// Classified parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SpnValue {
    /// Scaled value in engineering units.
    Valid(f64),
    ParameterSpecific,
    Error,
    NotAvailable,
}

impl SpnValue {
    pub fn is_not_available(&self) -> bool {
        matches!(self, SpnValue::NotAvailable)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SpnValue::Error)
    }
}

pub const PGN_EEC1: u32 = 0xF004;
pub const PGN_EEC2: u32 = 0xF003;
pub const PGN_EGF1: u32 = 0xF00A;
pub const PGN_CCVS1: u32 = 0xFEF1;
pub const PGN_ET1: u32 = 0xFEEE;
pub const PGN_AMB: u32 = 0xFEF5;
pub const PGN_IC1: u32 = 0xFEF6;
pub const PGN_LFE1: u32 = 0xFEF2;
pub const PGN_VD: u32 = 0xFEE0;

const fn ms(millis: u64) -> Option<Duration> {
    Some(Duration::from_millis(millis))
}

static PGNS: &[PgnDefinition] = &[
    PgnDefinition { pgn: PGN_EEC1, label: "Electronic Engine Controller 1", acronym: "EEC1", rate: ms(10) },
    PgnDefinition { pgn: PGN_EEC2, label: "Electronic Engine Controller 2", acronym: "EEC2", rate: ms(50) },
    PgnDefinition { pgn: PGN_EGF1, label: "Engine Gas Flow Rate", acronym: "EGF1", rate: ms(50) },
    PgnDefinition { pgn: PGN_CCVS1, label: "Cruise Control/Vehicle Speed 1", acronym: "CCVS1", rate: ms(100) },
    PgnDefinition { pgn: PGN_ET1, label: "Engine Temperature 1", acronym: "ET1", rate: ms(1000) },
    PgnDefinition { pgn: PGN_AMB, label: "Ambient Conditions", acronym: "AMB", rate: ms(1000) },
    PgnDefinition { pgn: PGN_IC1, label: "Intake/Exhaust Conditions 1", acronym: "IC1", rate: ms(500) },
    PgnDefinition { pgn: PGN_LFE1, label: "Fuel Economy (Liquid)", acronym: "LFE1", rate: ms(100) },
    PgnDefinition { pgn: PGN_VD, label: "Vehicle Distance", acronym: "VD", rate: ms(100) },
    PgnDefinition { pgn: PGN_DM1, label: "Active Diagnostic Trouble Codes", acronym: "DM1", rate: ms(1000) },
    PgnDefinition { pgn: PGN_ENGINE_HOURS, label: "Engine Hours, Revolutions", acronym: "HOURS", rate: None },
    PgnDefinition { pgn: PGN_VIN, label: "Vehicle Identification", acronym: "VI", rate: None },
    PgnDefinition { pgn: PGN_COMPONENT_ID, label: "Component Identification", acronym: "CI", rate: None },
];

#[allow(clippy::too_many_arguments)]
const fn spn_def(
    spn: u32,
    label: &'static str,
    pgn: u32,
    byte_offset: usize,
    bit_length: u8,
    resolution: f64,
    offset: f64,
    unit: &'static str,
) -> SpnDefinition {
    SpnDefinition {
        spn,
        label,
        pgn,
        byte_offset,
        bit_offset: 0,
        bit_length,
        resolution,
        offset,
        unit,
    }
}

static SPNS: &[SpnDefinition] = &[
    spn_def(512, "Driver's Demand Engine - Percent Torque", PGN_EEC1, 1, 8, 1.0, -125.0, "%"),
    spn_def(513, "Actual Engine - Percent Torque", PGN_EEC1, 2, 8, 1.0, -125.0, "%"),
    spn_def(190, "Engine Speed", PGN_EEC1, 3, 16, 0.125, 0.0, "rpm"),
    spn_def(91, "Accelerator Pedal Position 1", PGN_EEC2, 1, 8, 0.4, 0.0, "%"),
    spn_def(92, "Engine Percent Load At Current Speed", PGN_EEC2, 2, 8, 1.0, 0.0, "%"),
    spn_def(132, "Engine Intake Air Mass Flow Rate", PGN_EGF1, 2, 16, 0.05, 0.0, "kg/h"),
    spn_def(84, "Wheel-Based Vehicle Speed", PGN_CCVS1, 1, 16, 1.0 / 256.0, 0.0, "km/h"),
    spn_def(110, "Engine Coolant Temperature", PGN_ET1, 0, 8, 1.0, -40.0, "°C"),
    spn_def(175, "Engine Oil Temperature 1", PGN_ET1, 2, 16, 0.03125, -273.0, "°C"),
    spn_def(108, "Barometric Pressure", PGN_AMB, 0, 8, 0.5, 0.0, "kPa"),
    spn_def(171, "Ambient Air Temperature", PGN_AMB, 3, 16, 0.03125, -273.0, "°C"),
    spn_def(102, "Engine Intake Manifold #1 Pressure", PGN_IC1, 1, 8, 2.0, 0.0, "kPa"),
    spn_def(105, "Engine Intake Manifold 1 Temperature", PGN_IC1, 2, 8, 1.0, -40.0, "°C"),
    spn_def(183, "Engine Fuel Rate", PGN_LFE1, 0, 16, 0.05, 0.0, "L/h"),
    spn_def(51, "Engine Throttle Valve 1 Position 1", PGN_LFE1, 6, 8, 0.4, 0.0, "%"),
    spn_def(245, "Total Vehicle Distance", PGN_VD, 4, 32, 0.125, 0.0, "km"),
    spn_def(247, "Engine Total Hours of Operation", PGN_ENGINE_HOURS, 0, 32, 0.05, 0.0, "h"),
];

/// Look up a parameter group.
pub fn pgn(pgn: u32) -> Option<&'static PgnDefinition> {
    PGNS.iter().find(|d| d.pgn == pgn)
}

/// Look up a parameter.
pub fn spn(spn: u32) -> Option<&'static SpnDefinition> {
    SPNS.iter().find(|d| d.spn == spn)
}

/// Parameters carried in a parameter group.
pub fn spns_in_pgn(pgn: u32) -> Vec<&'static SpnDefinition> {
    SPNS.iter().filter(|d| d.pgn == pgn).collect()
}

/// Every parameter group with a fixed broadcast rate.
pub fn periodic_pgns() -> impl Iterator<Item = &'static PgnDefinition> {
    PGNS.iter().filter(|d| d.rate.is_some())
}

impl SpnDefinition {
    /// Raw little-endian value, or `None` if the payload is too short.
    pub fn raw(&self, payload: &[u8]) -> Option<u64> {
        let total_bits = self.bit_offset as usize + self.bit_length as usize;
        let bytes = payload.get(self.byte_offset..self.byte_offset + total_bits.div_ceil(8))?;
        let word = bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64);
        let mask = if self.bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_length) - 1
        };
        Some((word >> self.bit_offset) & mask)
    }

    /// Extract and classify the parameter from a payload.
    pub fn value(&self, payload: &[u8]) -> Option<SpnValue> {
        let raw = self.raw(payload)?;
        Some(match classify(raw, self.bit_length) {
            Range::Valid => SpnValue::Valid(raw as f64 * self.resolution + self.offset),
            Range::ParameterSpecific => SpnValue::ParameterSpecific,
            Range::Error => SpnValue::Error,
            Range::NotAvailable => SpnValue::NotAvailable,
        })
    }
}

enum Range {
    Valid,
    ParameterSpecific,
    Error,
    NotAvailable,
}

fn classify(raw: u64, bit_length: u8) -> Range {
    if bit_length < 8 {
        let max = (1u64 << bit_length) - 1;
        return match raw {
            r if r == max => Range::NotAvailable,
            r if bit_length > 1 && r == max - 1 => Range::Error,
            _ => Range::Valid,
        };
    }
    // Multi-byte parameters are classified by their most significant byte.
    let top = (raw >> (bit_length - 8)) & 0xFF;
    match top {
        0xFF => Range::NotAvailable,
        0xFE => Range::Error,
        0xFB..=0xFD => Range::ParameterSpecific,
        _ => Range::Valid,
    }
}
