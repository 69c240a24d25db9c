use j84_protocol::module::ComponentIdentification;

use super::{J1939Message, expect_pgn};
use crate::error::J1939Result;
use crate::types::{PGN_COMPONENT_ID, Packet};

/// PGN 65259 Component Identification (`*`-delimited make, model, serial, unit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentIdPacket {
    pub source: u8,
    pub id: ComponentIdentification,
}

impl ComponentIdPacket {
    pub fn new(source: u8, make: &str, model: &str, serial_number: &str, unit_number: &str) -> Self {
        Self {
            source,
            id: ComponentIdentification {
                make: make.to_string(),
                model: model.to_string(),
                serial_number: serial_number.to_string(),
                unit_number: unit_number.to_string(),
            },
        }
    }
}

impl J1939Message for ComponentIdPacket {
    const PGN: u32 = PGN_COMPONENT_ID;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_COMPONENT_ID)?;
        let text = String::from_utf8_lossy(&packet.payload);
        let mut fields = text.split('*').map(|f| f.trim_end_matches(['\0', '\u{FFFD}']).trim().to_string());
        let mut next = || fields.next().unwrap_or_default();
        let id = ComponentIdentification {
            make: next(),
            model: next(),
            serial_number: next(),
            unit_number: next(),
        };
        Ok(Self {
            source: packet.source,
            id,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        format!(
            "{}*{}*{}*{}*",
            self.id.make, self.id.model, self.id.serial_number, self.id.unit_number
        )
        .into_bytes()
    }
}
