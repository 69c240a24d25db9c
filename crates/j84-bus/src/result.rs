//! Request outcome wrappers distinguishing data, acknowledgments, malformed
//! answers and timeouts.

use crate::error::J1939Result;
use crate::packets::AcknowledgmentPacket;
use crate::types::Packet;

/// What came back for a destination-specific request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<T> {
    /// The requested data.
    Packet(T),
    /// ACK, NACK, Access Denied or a final busy NACK.
    Ack(AcknowledgmentPacket),
    /// An answer with the requested PGN that failed to parse.
    Malformed { packet: Packet, reason: String },
    /// No answer after every attempt.
    Timeout,
}

/// Result of a destination-specific request.
#[derive(Debug, Clone, PartialEq)]
pub struct BusResult<T> {
    /// More than one attempt was needed.
    pub retry_used: bool,
    pub response: Response<T>,
}

impl<T> BusResult<T> {
    pub fn packet(&self) -> Option<&T> {
        match &self.response {
            Response::Packet(p) => Some(p),
            _ => None,
        }
    }

    pub fn ack(&self) -> Option<&AcknowledgmentPacket> {
        match &self.response {
            Response::Ack(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.response, Response::Timeout)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.response, Response::Malformed { .. })
    }
}

impl BusResult<Packet> {
    /// Parse the data variant; a parse failure becomes `Malformed`.
    pub fn parse<U>(self, f: impl FnOnce(&Packet) -> J1939Result<U>) -> BusResult<U> {
        let response = match self.response {
            Response::Packet(packet) => match f(&packet) {
                Ok(parsed) => Response::Packet(parsed),
                Err(e) => {
                    tracing::warn!(source = packet.source, pgn = packet.pgn, error = %e, "malformed response");
                    Response::Malformed {
                        packet,
                        reason: e.to_string(),
                    }
                }
            },
            Response::Ack(a) => Response::Ack(a),
            Response::Malformed { packet, reason } => Response::Malformed { packet, reason },
            Response::Timeout => Response::Timeout,
        };
        BusResult {
            retry_used: self.retry_used,
            response,
        }
    }
}

/// Everything collected for a global request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult<T> {
    pub packets: Vec<T>,
    pub acks: Vec<AcknowledgmentPacket>,
    /// Responses with the requested PGN that failed to parse.
    pub rejected: Vec<Packet>,
}

impl<T> Default for RequestResult<T> {
    fn default() -> Self {
        Self {
            packets: Vec::new(),
            acks: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> RequestResult<T> {
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty() && self.acks.is_empty()
    }
}

impl RequestResult<Packet> {
    /// Parse collected packets; failures move to `rejected`.
    pub fn parse<U>(self, f: impl Fn(&Packet) -> J1939Result<U>) -> RequestResult<U> {
        let mut parsed = Vec::with_capacity(self.packets.len());
        let mut rejected = self.rejected;
        for packet in self.packets {
            match f(&packet) {
                Ok(p) => parsed.push(p),
                Err(e) => {
                    tracing::warn!(source = packet.source, pgn = packet.pgn, error = %e, "rejected malformed response");
                    rejected.push(packet);
                }
            }
        }
        RequestResult {
            packets: parsed,
            acks: self.acks,
            rejected,
        }
    }
}
