use j84_protocol::module::CalibrationInformation;

use super::{J1939Message, ascii_field, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM19, Packet};

const RECORD_LEN: usize = 20;

/// DM19 Calibration Information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm19 {
    pub source: u8,
    pub calibrations: Vec<CalibrationInformation>,
}

impl Dm19 {
    pub fn new(source: u8, calibrations: Vec<CalibrationInformation>) -> Self {
        Self { source, calibrations }
    }

    /// Build a calibration record the way an ECU reports it.
    pub fn calibration(id: &str, cvn: u32) -> CalibrationInformation {
        let mut raw = id.as_bytes().to_vec();
        raw.resize(16, 0x00);
        CalibrationInformation {
            calibration_id: ascii_field(&raw),
            cvn,
            raw_calibration_id: raw,
        }
    }
}

impl J1939Message for Dm19 {
    const PGN: u32 = PGN_DM19;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_DM19)?;
        let p = &packet.payload;
        if p.is_empty() || p.len() % RECORD_LEN != 0 {
            return Err(J1939Error::decode(
                PGN_DM19,
                format!("length {} is not a multiple of {RECORD_LEN}", p.len()),
            ));
        }
        let calibrations = p
            .chunks_exact(RECORD_LEN)
            .map(|r| CalibrationInformation {
                cvn: u32::from_le_bytes([r[0], r[1], r[2], r[3]]),
                calibration_id: ascii_field(&r[4..]),
                raw_calibration_id: r[4..].to_vec(),
            })
            .collect();
        Ok(Self {
            source: packet.source,
            calibrations,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.calibrations.len() * RECORD_LEN);
        for cal in &self.calibrations {
            payload.extend_from_slice(&cal.cvn.to_le_bytes());
            let mut raw = cal.raw_calibration_id.clone();
            raw.resize(16, 0x00);
            payload.extend_from_slice(&raw);
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GLOBAL_ADDR;

    #[test]
    fn parse_two_calibrations() {
        let dm19 = Dm19::new(
            0x00,
            vec![
                Dm19::calibration("ENG-CAL-0042", 0xDEADBEEF),
                Dm19::calibration("ENG-SUB-7", 0x01020304),
            ],
        );
        let packet = Packet::new(PGN_DM19, 0x00, GLOBAL_ADDR, dm19.to_payload());
        assert_eq!(packet.payload.len(), 40);

        let parsed = Dm19::parse(&packet).unwrap();
        assert_eq!(parsed.calibrations.len(), 2);
        assert_eq!(parsed.calibrations[0].calibration_id, "ENG-CAL-0042");
        assert_eq!(parsed.calibrations[0].cvn, 0xDEADBEEF);
        assert_eq!(parsed.calibrations[1].calibration_id, "ENG-SUB-7");
    }

    #[test]
    fn partial_record_rejected() {
        let packet = Packet::new(PGN_DM19, 0x00, GLOBAL_ADDR, vec![0x00; 25]);
        assert!(Dm19::parse(&packet).is_err());
    }
}
