use j84_protocol::module::{ModelYearInfo, ModelYearKind};

use super::{J1939Message, ascii_field, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_DM56, Packet};

/// DM56 Engine Properties (model year and certification family).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dm56 {
    pub source: u8,
    pub info: ModelYearInfo,
}

impl Dm56 {
    pub fn new(source: u8, year: u16, kind: ModelYearKind, family: &str) -> Self {
        Self {
            source,
            info: ModelYearInfo {
                year,
                kind,
                family: family.to_string(),
            },
        }
    }
}

impl J1939Message for Dm56 {
    const PGN: u32 = PGN_DM56;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_DM56)?;
        let p = &packet.payload;
        if p.len() < 8 {
            return Err(J1939Error::decode(PGN_DM56, "model year field shorter than 8 bytes"));
        }

        let year = std::str::from_utf8(&p[0..4])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| J1939Error::decode(PGN_DM56, "model year is not numeric"))?;
        let kind = match p[4] {
            b'E' => ModelYearKind::Engine,
            b'V' => ModelYearKind::Vehicle,
            other => {
                return Err(J1939Error::decode(
                    PGN_DM56,
                    format!("unknown model year type '{}'", other as char),
                ));
            }
        };

        let rest = &p[8..];
        let end = rest.iter().position(|&b| b == b'*').unwrap_or(rest.len());
        let family = ascii_field(&rest[..end]);

        Ok(Self {
            source: packet.source,
            info: ModelYearInfo { year, kind, family },
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let kind = match self.info.kind {
            ModelYearKind::Engine => 'E',
            ModelYearKind::Vehicle => 'V',
        };
        format!("{:04}{kind}-MY{}*", self.info.year, self.info.family).into_bytes()
    }
}
