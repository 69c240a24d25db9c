use j84_protocol::dtc::{DiagnosticTroubleCode, Lamps};

use super::{J1939Message, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM1, PGN_DM2, PGN_DM6, PGN_DM12, PGN_DM23, PGN_DM28, Packet};

/// Lamp status plus DTC list, shared by every DTC-carrying DM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtcPacket<const DM_PGN: u32> {
    pub source: u8,
    pub lamps: Lamps,
    pub dtcs: Vec<DiagnosticTroubleCode>,
}

/// Active DTCs.
pub type Dm1 = DtcPacket<PGN_DM1>;
/// Previously active DTCs.
pub type Dm2 = DtcPacket<PGN_DM2>;
/// Pending DTCs.
pub type Dm6 = DtcPacket<PGN_DM6>;
/// Emissions-related active DTCs.
pub type Dm12 = DtcPacket<PGN_DM12>;
/// Previously MIL-on DTCs.
pub type Dm23 = DtcPacket<PGN_DM23>;
/// Permanent DTCs.
pub type Dm28 = DtcPacket<PGN_DM28>;

impl<const DM_PGN: u32> DtcPacket<DM_PGN> {
    pub fn new(source: u8, lamps: Lamps, dtcs: Vec<DiagnosticTroubleCode>) -> Self {
        Self { source, lamps, dtcs }
    }
}

impl<const DM_PGN: u32> J1939Message for DtcPacket<DM_PGN> {
    const PGN: u32 = DM_PGN;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, DM_PGN)?;
        let payload = &packet.payload;
        if payload.len() < 2 {
            return Err(J1939Error::decode(DM_PGN, "missing lamp status bytes"));
        }
        let lamps = Lamps::from_bytes(payload[0], payload[1]);

        let dtcs = payload[2..]
            .chunks_exact(4)
            .filter(|c| !c.iter().all(|&b| b == 0x00) && !c.iter().all(|&b| b == 0xFF))
            .map(|c| DiagnosticTroubleCode::from_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            source: packet.source,
            lamps,
            dtcs,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = self.lamps.to_bytes().to_vec();
        if self.dtcs.is_empty() {
            payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF]);
        } else {
            for dtc in &self.dtcs {
                payload.extend_from_slice(&dtc.to_bytes());
            }
        }
        payload
    }
}
