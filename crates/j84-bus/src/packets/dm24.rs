use j84_protocol::spn::SupportedSpn;

use super::{J1939Message, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM24, Packet};

/// DM24 SPN Support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm24 {
    pub source: u8,
    pub spns: Vec<SupportedSpn>,
}

impl Dm24 {
    pub fn new(source: u8, spns: Vec<SupportedSpn>) -> Self {
        Self { source, spns }
    }
}

impl J1939Message for Dm24 {
    const PGN: u32 = PGN_DM24;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_DM24)?;
        let p = &packet.payload;
        if p.len() % 4 != 0 {
            return Err(J1939Error::decode(
                PGN_DM24,
                format!("length {} is not a multiple of 4", p.len()),
            ));
        }
        let spns = p
            .chunks_exact(4)
            .filter(|r| !r.iter().all(|&b| b == 0xFF))
            .map(|r| SupportedSpn::from_bytes([r[0], r[1], r[2], r[3]]))
            .collect();
        Ok(Self {
            source: packet.source,
            spns,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload: Vec<u8> = self.spns.iter().flat_map(|s| s.to_bytes()).collect();
        // Single-frame messages are padded to 8 bytes
        while payload.len() < 8 {
            payload.extend_from_slice(&[0xFF; 4]);
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TOOL_ADDR;

    #[test]
    fn parse_with_padding_record() {
        let packet = Packet::new(
            PGN_DM24,
            0x00,
            TOOL_ADDR,
            vec![0xBE, 0x00, 0x1D, 0x02, 0xFF, 0xFF, 0xFF, 0xFF],
        );
        let dm24 = Dm24::parse(&packet).unwrap();
        assert_eq!(dm24.spns.len(), 1);
        assert_eq!(dm24.spns[0].spn, 190);
        assert!(dm24.spns[0].data_stream);
        assert_eq!(dm24.to_payload(), packet.payload);
    }

    #[test]
    fn misaligned_length_rejected() {
        let packet = Packet::new(PGN_DM24, 0x00, TOOL_ADDR, vec![0xBE, 0x00, 0x1D]);
        assert!(Dm24::parse(&packet).is_err());
    }
}
