use super::{J1939Message, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_VIN, Packet};

/// PGN 65260 Vehicle Identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VinPacket {
    pub source: u8,
    pub vin: String,
    /// Manufacturer data following the `*` delimiter.
    pub manufacturer_data: Vec<u8>,
}

impl VinPacket {
    pub fn new(source: u8, vin: &str) -> Self {
        Self {
            source,
            vin: vin.to_string(),
            manufacturer_data: Vec::new(),
        }
    }
}

impl J1939Message for VinPacket {
    const PGN: u32 = PGN_VIN;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_VIN)?;
        let p = &packet.payload;
        let (vin_bytes, rest) = match p.iter().position(|&b| b == b'*') {
            Some(i) => (&p[..i], &p[i + 1..]),
            None => (&p[..], &[][..]),
        };
        if vin_bytes.is_empty() {
            return Err(J1939Error::decode(PGN_VIN, "empty VIN"));
        }
        Ok(Self {
            source: packet.source,
            vin: String::from_utf8_lossy(vin_bytes).to_string(),
            manufacturer_data: rest.to_vec(),
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = self.vin.as_bytes().to_vec();
        payload.push(b'*');
        payload.extend_from_slice(&self.manufacturer_data);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GLOBAL_ADDR;

    #[test]
    fn parse_vin_with_delimiter() {
        let packet = Packet::new(PGN_VIN, 0x00, GLOBAL_ADDR, b"1FUJGLDR2RLBP8834*".to_vec());
        let vin = VinPacket::parse(&packet).unwrap();
        assert_eq!(vin.vin, "1FUJGLDR2RLBP8834");
        assert!(vin.manufacturer_data.is_empty());
        assert_eq!(vin.to_payload(), packet.payload);
    }

    #[test]
    fn parse_vin_without_delimiter() {
        let packet = Packet::new(PGN_VIN, 0x00, GLOBAL_ADDR, b"1FUJGLDR2RLBP8834".to_vec());
        assert_eq!(VinPacket::parse(&packet).unwrap().vin, "1FUJGLDR2RLBP8834");
    }

    #[test]
    fn manufacturer_data_kept() {
        let packet = Packet::new(PGN_VIN, 0x00, GLOBAL_ADDR, b"1FUJGLDR2RLBP8834*XYZ".to_vec());
        assert_eq!(VinPacket::parse(&packet).unwrap().manufacturer_data, b"XYZ");
    }
}
