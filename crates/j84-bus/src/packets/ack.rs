use serde::{Deserialize, Serialize};

use super::{J1939Message, expect_pgn};
use crate::error::{J1939Error, J1939Result};
use crate::types::{PGN_ACK, Packet, pgn_bytes};

/// Acknowledgment control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckControl {
    Ack,
    Nack,
    AccessDenied,
    /// Busy; the request may be retried.
    CannotRespond,
    Other(u8),
}

impl AckControl {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => AckControl::Ack,
            1 => AckControl::Nack,
            2 => AckControl::AccessDenied,
            3 => AckControl::CannotRespond,
            other => AckControl::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            AckControl::Ack => 0,
            AckControl::Nack => 1,
            AckControl::AccessDenied => 2,
            AckControl::CannotRespond => 3,
            AckControl::Other(b) => b,
        }
    }
}

/// PGN 59392 Acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgmentPacket {
    pub source: u8,
    pub control: AckControl,
    pub group_function: u8,
    /// Address of the node whose request is acknowledged.
    pub address: u8,
    /// Acknowledged PGN.
    pub pgn: u32,
}

impl AcknowledgmentPacket {
    pub fn new(source: u8, control: AckControl, address: u8, pgn: u32) -> Self {
        Self {
            source,
            control,
            group_function: 0xFF,
            address,
            pgn,
        }
    }

    pub fn is_nack(&self) -> bool {
        !matches!(self.control, AckControl::Ack)
    }
}

impl J1939Message for AcknowledgmentPacket {
    const PGN: u32 = PGN_ACK;

    fn parse(packet: &Packet) -> J1939Result<Self> {
        expect_pgn(packet, PGN_ACK)?;
        if packet.payload.len() < 8 {
            return Err(J1939Error::decode(PGN_ACK, "acknowledgment shorter than 8 bytes"));
        }
        let pgn = packet
            .pgn_at(5)
            .ok_or_else(|| J1939Error::decode(PGN_ACK, "missing acknowledged PGN"))?;
        Ok(Self {
            source: packet.source,
            control: AckControl::from_byte(packet.payload[0]),
            group_function: packet.payload[1],
            address: packet.payload[4],
            pgn,
        })
    }

    fn source(&self) -> u8 {
        self.source
    }

    fn to_payload(&self) -> Vec<u8> {
        let mut payload = vec![self.control.to_byte(), self.group_function, 0xFF, 0xFF, self.address];
        payload.extend_from_slice(&pgn_bytes(self.pgn));
        payload
    }
}
