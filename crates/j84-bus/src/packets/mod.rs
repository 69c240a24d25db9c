//! Typed J1939 diagnostic messages.
//!
//! Each message parses from a reassembled [`Packet`] and encodes back to a
//! payload; the simulator uses the encoders to build its responses.

mod ack;
mod component_id;
mod dm19;
mod dm24;
mod dm5;
mod dm56;
mod dtc;
mod test_results;
mod vin;

pub use ack::{AckControl, AcknowledgmentPacket};
pub use component_id::ComponentIdPacket;
pub use dm5::{COMPLIANCE_NOT_AVAILABLE, COMPLIANCE_NOT_OBD, Dm5, MonitoredSystem};
pub use dm19::Dm19;
pub use dm24::Dm24;
pub use dm56::Dm56;
pub use dtc::{Dm1, Dm2, Dm6, Dm12, Dm23, Dm28, DtcPacket};
pub use test_results::{Dm7, Dm30, FMI_ALL, TID_ALL_FOR_SPN};
pub use vin::VinPacket;

use crate::error::J1939Result;
use crate::types::Packet;

/// A J1939 message with a fixed PGN.
pub trait J1939Message: Sized + Send {
    const PGN: u32;

    /// Decode from a complete packet.
    fn parse(packet: &Packet) -> J1939Result<Self>;

    /// Address of the ECU that sent the message.
    fn source(&self) -> u8;

    /// Encode the message payload.
    fn to_payload(&self) -> Vec<u8>;
}

/// Check the packet carries the expected PGN.
pub(crate) fn expect_pgn(packet: &Packet, pgn: u32) -> J1939Result<()> {
    if packet.pgn != pgn {
        return Err(crate::error::J1939Error::decode(
            pgn,
            format!("unexpected PGN {}", packet.pgn),
        ));
    }
    Ok(())
}

/// Decode ASCII, stopping at NUL and trimming trailing padding.
pub(crate) fn ascii_field(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .position(|&b| b == 0x00 || b == 0xFF)
        .unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}
