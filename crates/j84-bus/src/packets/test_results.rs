use j84_protocol::test_result::ScaledTestResult;

use super::{J1939Message, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM7, PGN_DM30, Packet};

/// Test identifier requesting every test result for an SPN.
pub const TID_ALL_FOR_SPN: u8 = 247;

/// FMI used with [`TID_ALL_FOR_SPN`].
pub const FMI_ALL: u8 = 31;

const RECORD_LEN: usize = 12;

fn spn_fmi_bytes(spn: u32, fmi: u8) -> [u8; 3] {
    [
        (spn & 0xFF) as u8,
        ((spn >> 8) & 0xFF) as u8,
        (((spn >> 11) & 0xE0) as u8) | (fmi & 0x1F),
    ]
}

fn spn_fmi_from(b: &[u8]) -> (u32, u8) {
    let spn = (b[0] as u32) | ((b[1] as u32) << 8) | (((b[2] & 0xE0) as u32) << 11);
    (spn, b[2] & 0x1F)
}

/// DM7 Command Non-Continuously Monitored Test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dm7 {
    pub source: u8,
    pub test_id: u8,
    pub spn: u32,
    pub fmi: u8,
}

impl Dm7 {
    /// Request every scaled test result for `spn`.
    pub fn all_results_for(source: u8, spn: u32) -> Self {
        Self {
            source,
            test_id: TID_ALL_FOR_SPN,
            spn,
            fmi: FMI_ALL,
        }
    }
}

impl J1939Message for Dm7 {
    const PGN: u32 = PGN_DM7;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_DM7)?;
        let p = &packet.payload;
        if p.len() < 4 {
            return Err(J1939Error::decode(PGN_DM7, "command shorter than 4 bytes"));
        }
        let (spn, fmi) = spn_fmi_from(&p[1..4]);
        Ok(Self {
            source: packet.source,
            test_id: p[0],
            spn,
            fmi,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = vec![self.test_id];
        payload.extend_from_slice(&spn_fmi_bytes(self.spn, self.fmi));
        payload.extend_from_slice(&[0xFF; 4]);
        payload
    }
}

/// DM30 Scaled Test Results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm30 {
    pub source: u8,
    pub results: Vec<ScaledTestResult>,
}

impl J1939Message for Dm30 {
    const PGN: u32 = PGN_DM30;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_DM30)?;
        let p = &packet.payload;
        let results = p
            .chunks_exact(RECORD_LEN)
            .filter(|r| !r.iter().all(|&b| b == 0xFF))
            .map(|r| {
                let (spn, fmi) = spn_fmi_from(&r[1..4]);
                ScaledTestResult {
                    test_id: r[0],
                    spn,
                    fmi,
                    slot_id: u16::from_le_bytes([r[4], r[5]]),
                    value: u16::from_le_bytes([r[6], r[7]]),
                    max: u16::from_le_bytes([r[8], r[9]]),
                    min: u16::from_le_bytes([r[10], r[11]]),
                }
            })
            .collect();
        Ok(Self {
            source: packet.source,
            results,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.results.len() * RECORD_LEN);
        for r in &self.results {
            payload.push(r.test_id);
            payload.extend_from_slice(&spn_fmi_bytes(r.spn, r.fmi));
            payload.extend_from_slice(&r.slot_id.to_le_bytes());
            payload.extend_from_slice(&r.value.to_le_bytes());
            payload.extend_from_slice(&r.max.to_le_bytes());
            payload.extend_from_slice(&r.min.to_le_bytes());
        }
        payload
    }
}
