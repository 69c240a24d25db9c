use serde::Serialize;

use super::{J1939Message, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM5, Packet};

/// OBD compliance value for ECUs not intended to meet OBD requirements.
pub const COMPLIANCE_NOT_OBD: u8 = 0x05;

/// Compliance byte "not available".
pub const COMPLIANCE_NOT_AVAILABLE: u8 = 0xFF;

/// Continuously monitored systems, bit position in byte 4.
const CONTINUOUS: [(&str, u8); 3] = [
    ("Misfire", 0),
    ("Fuel System", 1),
    ("Comprehensive Component", 2),
];

/// Non-continuously monitored systems, bit position in bytes 5-6 / 7-8.
const NON_CONTINUOUS: [(&str, u8); 13] = [
    ("Catalyst", 0),
    ("Heated Catalyst", 1),
    ("Evaporative System", 2),
    ("Secondary Air System", 3),
    ("A/C System Refrigerant", 4),
    ("Exhaust Gas Sensor", 5),
    ("Exhaust Gas Sensor Heater", 6),
    ("EGR/VVT System", 7),
    ("Cold Start Aid System", 8),
    ("Boost Pressure Control System", 9),
    ("Diesel Particulate Filter", 10),
    ("NOx Catalyst/Adsorber", 11),
    ("NMHC Converting Catalyst", 12),
];

/// Readiness of one monitored system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoredSystem {
    pub name: &'static str,
    pub supported: bool,
    pub complete: bool,
}

/// DM5 Diagnostic Readiness 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm5 {
    pub source: u8,
    pub active_count: u8,
    pub previously_active_count: u8,
    pub obd_compliance: u8,
    /// Byte 4: support bits 0-2, incomplete bits 4-6.
    pub continuous: u8,
    /// Bytes 5-6 little endian: support bits.
    pub non_continuous_support: u16,
    /// Bytes 7-8 little endian: incomplete bits.
    pub non_continuous_status: u16,
}

impl Dm5 {
    /// True for ECUs that declare OBD compliance.
    pub fn is_obd(&self) -> bool {
        !matches!(self.obd_compliance, COMPLIANCE_NOT_OBD | COMPLIANCE_NOT_AVAILABLE)
    }

    pub fn monitored_systems(&self) -> Vec<MonitoredSystem> {
        let continuous = CONTINUOUS.iter().map(|(name, bit)| MonitoredSystem {
            name: *name,
            supported: self.continuous & (1 << bit) != 0,
            complete: self.continuous & (1 << (bit + 4)) == 0,
        });
        let non_continuous = NON_CONTINUOUS.iter().map(|(name, bit)| MonitoredSystem {
            name: *name,
            supported: self.non_continuous_support & (1 << bit) != 0,
            complete: self.non_continuous_status & (1 << bit) == 0,
        });
        continuous.chain(non_continuous).collect()
    }

    /// Supported systems that have not yet completed.
    pub fn incomplete_monitors(&self) -> Vec<&'static str> {
        self.monitored_systems()
            .into_iter()
            .filter(|m| m.supported && !m.complete)
            .map(|m| m.name)
            .collect()
    }
}

impl J1939Message for Dm5 {
    const PGN: u32 = PGN_DM5;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_DM5)?;
        let p = &packet.payload;
        if p.len() < 8 {
            return Err(J1939Error::decode(PGN_DM5, format!("expected 8 bytes, got {}", p.len())));
        }
        Ok(Self {
            source: packet.source,
            active_count: p[0],
            previously_active_count: p[1],
            obd_compliance: p[2],
            continuous: p[3],
            non_continuous_support: u16::from_le_bytes([p[4], p[5]]),
            non_continuous_status: u16::from_le_bytes([p[6], p[7]]),
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let support = self.non_continuous_support.to_le_bytes();
        let status = self.non_continuous_status.to_le_bytes();
        vec![
            self.active_count,
            self.previously_active_count,
            self.obd_compliance,
            self.continuous,
            support[0],
            support[1],
            status[0],
            status[1],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GLOBAL_ADDR;

    fn dm5_packet(compliance: u8) -> Packet {
        // 1 active, 0 previously active, comprehensive component supported + complete,
        // DPF supported but incomplete
        Packet::new(
            PGN_DM5,
            0x00,
            GLOBAL_ADDR,
            vec![0x01, 0x00, compliance, 0x04, 0x00, 0x04, 0x00, 0x04],
        )
    }

    #[test]
    fn parse_obd_module() {
        let dm5 = Dm5::parse(&dm5_packet(0x13)).unwrap();
        assert!(dm5.is_obd());
        assert_eq!(dm5.active_count, 1);
        assert_eq!(dm5.incomplete_monitors(), vec!["Diesel Particulate Filter"]);
    }

    #[test]
    fn non_obd_compliance_values() {
        assert!(!Dm5::parse(&dm5_packet(COMPLIANCE_NOT_OBD)).unwrap().is_obd());
        assert!(!Dm5::parse(&dm5_packet(COMPLIANCE_NOT_AVAILABLE)).unwrap().is_obd());
    }

    #[test]
    fn monitored_system_flags() {
        let dm5 = Dm5::parse(&dm5_packet(0x13)).unwrap();
        let systems = dm5.monitored_systems();
        let ccm = systems.iter().find(|m| m.name == "Comprehensive Component").unwrap();
        assert!(ccm.supported && ccm.complete);
        let misfire = systems.iter().find(|m| m.name == "Misfire").unwrap();
        assert!(!misfire.supported);
        assert_eq!(dm5.to_payload(), dm5_packet(0x13).payload);
    }

    #[test]
    fn short_dm5_rejected() {
        let packet = Packet::new(PGN_DM5, 0x00, GLOBAL_ADDR, vec![0x00, 0x00, 0x13]);
        assert!(Dm5::parse(&packet).is_err());
    }
}
