//! Core J1939 types: identifier codec, frames, packets and well-known constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Addresses ───────────────────────────────────────────────────

/// Global (broadcast) destination address.
pub const GLOBAL_ADDR: u8 = 0xFF;

/// Off-board diagnostic-service tool #1.
pub const TOOL_ADDR: u8 = 0xF9;

/// Engine #1.
pub const ENGINE_ADDR: u8 = 0x00;

// ── Network management PGNs ─────────────────────────────────────

pub const PGN_REQUEST: u32 = 0xEA00;
pub const PGN_ACK: u32 = 0xE800;
pub const PGN_TP_CM: u32 = 0xEC00;
pub const PGN_TP_DT: u32 = 0xEB00;

// ── Diagnostic PGNs (J1939-73) ──────────────────────────────────

pub const PGN_DM1: u32 = 0xFECA;
pub const PGN_DM2: u32 = 0xFECB;
pub const PGN_DM3: u32 = 0xFECC;
pub const PGN_DM5: u32 = 0xFECE;
pub const PGN_DM6: u32 = 0xFECF;
pub const PGN_DM7: u32 = 0xE300;
pub const PGN_DM11: u32 = 0xFED3;
pub const PGN_DM12: u32 = 0xFED4;
pub const PGN_DM19: u32 = 0xD300;
pub const PGN_DM23: u32 = 0xFDB5;
pub const PGN_DM24: u32 = 0xFDB6;
pub const PGN_DM28: u32 = 0xFD80;
pub const PGN_DM30: u32 = 0xA400;
pub const PGN_DM56: u32 = 0xFCC7;

// ── Identification PGNs ─────────────────────────────────────────

pub const PGN_VIN: u32 = 0xFEEC;
pub const PGN_COMPONENT_ID: u32 = 0xFEEB;
pub const PGN_ENGINE_HOURS: u32 = 0xFEE5;

/// Default priority for diagnostic messages.
pub const DEFAULT_PRIORITY: u8 = 6;

/// PDU format values below this are destination specific (PDU1).
const PDU2_THRESHOLD: u32 = 0xF0;

/// True if the PGN is PDU1 (destination carried in the PS field).
pub fn is_pdu1(pgn: u32) -> bool {
    ((pgn >> 8) & 0xFF) < PDU2_THRESHOLD
}

// ── Identifier ──────────────────────────────────────────────────

/// Decoded 29-bit J1939 identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct J1939Id {
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
}

impl J1939Id {
    pub fn new(priority: u8, pgn: u32, source: u8, destination: u8) -> Self {
        let (pgn, destination) = if is_pdu1(pgn) {
            (pgn & 0x3FF00, destination)
        } else {
            (pgn, GLOBAL_ADDR)
        };
        Self {
            priority,
            pgn,
            source,
            destination,
        }
    }

    pub fn decode(id: u32) -> Self {
        let priority = ((id >> 26) & 0x07) as u8;
        let raw_pgn = (id >> 8) & 0x3FFFF;
        let source = (id & 0xFF) as u8;
        if is_pdu1(raw_pgn) {
            Self {
                priority,
                pgn: raw_pgn & 0x3FF00,
                source,
                destination: (raw_pgn & 0xFF) as u8,
            }
        } else {
            Self {
                priority,
                pgn: raw_pgn,
                source,
                destination: GLOBAL_ADDR,
            }
        }
    }

    pub fn encode(&self) -> u32 {
        let pgn = if is_pdu1(self.pgn) {
            (self.pgn & 0x3FF00) | self.destination as u32
        } else {
            self.pgn
        };
        ((self.priority as u32 & 0x07) << 26) | (pgn << 8) | self.source as u32
    }
}

// ── CAN Frame ───────────────────────────────────────────────────

/// A raw CAN 2.0B frame (extended 29-bit ID).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// CAN arbitration ID (29-bit extended).
    pub id: u32,
    /// Data payload (0–8 bytes).
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn j1939_id(&self) -> J1939Id {
        J1939Id::decode(self.id)
    }
}

// ── Packet ──────────────────────────────────────────────────────

/// A complete J1939 message, possibly reassembled from transport frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
    pub payload: Vec<u8>,
    /// Arrival time relative to the start of the bus session.
    pub timestamp: Duration,
}

impl Packet {
    pub fn new(pgn: u32, source: u8, destination: u8, payload: Vec<u8>) -> Self {
        let id = J1939Id::new(DEFAULT_PRIORITY, pgn, source, destination);
        Self {
            priority: id.priority,
            pgn: id.pgn,
            source,
            destination: id.destination,
            payload,
            timestamp: Duration::ZERO,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build from a single frame received at `timestamp`.
    pub fn from_frame(frame: &CanFrame, timestamp: Duration) -> Self {
        let id = frame.j1939_id();
        Self {
            priority: id.priority,
            pgn: id.pgn,
            source: id.source,
            destination: id.destination,
            payload: frame.data.clone(),
            timestamp,
        }
    }

    pub fn id(&self) -> J1939Id {
        J1939Id {
            priority: self.priority,
            pgn: self.pgn,
            source: self.source,
            destination: self.destination,
        }
    }

    /// Single-frame representation. Only valid for payloads of 8 bytes or less.
    pub fn to_frame(&self) -> CanFrame {
        CanFrame::new(self.id().encode(), self.payload.clone())
    }

    /// Build a Request (PGN 59904) for `pgn`.
    pub fn request(pgn: u32, source: u8, destination: u8) -> Self {
        Self::new(PGN_REQUEST, source, destination, pgn_bytes(pgn).to_vec())
    }

    /// Read a 3-byte little-endian PGN at `offset`.
    pub fn pgn_at(&self, offset: usize) -> Option<u32> {
        let b = self.payload.get(offset..offset + 3)?;
        Some(b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16)
    }
}

/// Encode a PGN as its 3-byte little-endian wire form.
pub fn pgn_bytes(pgn: u32) -> [u8; 3] {
    [
        (pgn & 0xFF) as u8,
        ((pgn >> 8) & 0xFF) as u8,
        ((pgn >> 16) & 0xFF) as u8,
    ]
}
