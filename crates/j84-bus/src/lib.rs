//! J1939 bus engine for the J1939-84 sequencer.
//!
//! Frames move through a [`Bus`] implementation; [`J1939`] layers the
//! transport protocol and request/response correlation on top, and the
//! `packets` module turns payloads into typed diagnostic messages.

pub mod broadcast;
pub mod error;
pub mod interface;
pub mod j1939;
pub mod mock;
pub mod packets;
pub mod pgn_db;
pub mod result;
pub mod safety;
pub mod sim;
pub mod spn_validation;
pub mod transport;
pub mod types;

pub use error::{J1939Error, J1939Result};
pub use interface::Bus;
#[cfg(target_os = "linux")]
pub use interface::SocketCanBus;
pub use j1939::{J1939, Timing};
pub use mock::MockBus;
pub use result::{BusResult, RequestResult, Response};
pub use safety::RequestPolicy;
pub use sim::{ClearBehavior, FaultState, REFERENCE_VIN, SimEcu, SimResponse, SimulatedVehicle};
pub use types::{CanFrame, Packet};
