//! CAN bus interface abstraction.
//!
//! `Bus` trait with `send_frame`/`recv_frame`. Three impls:
//! - `SocketCanBus`: Linux-only, wraps a blocking `socketcan::CanSocket`
//! - `MockBus`: all platforms, scripted frames (in `mock.rs`)
//! - `SimulatedVehicle`: all platforms, responding ECUs (in `sim.rs`)

use async_trait::async_trait;
use std::time::Duration;

use crate::error::J1939Result;
use crate::types::CanFrame;

/// Trait for CAN bus implementations carrying 29-bit J1939 traffic.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Send a CAN frame.
    async fn send_frame(&self, frame: &CanFrame) -> J1939Result<()>;

    /// Receive a CAN frame, waiting up to `timeout`.
    ///
    /// Returns `J1939Error::Timeout` when nothing arrives in time.
    async fn recv_frame(&self, timeout: Duration) -> J1939Result<CanFrame>;
}

// ── SocketCAN (Linux-only) ──────────────────────────────────────

#[cfg(target_os = "linux")]
pub use socket::SocketCanBus;

#[cfg(target_os = "linux")]
mod socket {
    use std::io;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use socketcan::{CanSocket, EmbeddedFrame, ExtendedId, Id, Socket};

    use super::Bus;
    use crate::error::{J1939Error, J1939Result};
    use crate::types::CanFrame;

    /// SocketCAN interface for Linux hosts.
    ///
    /// The socket is blocking; each operation runs on the blocking pool.
    pub struct SocketCanBus {
        interface_name: String,
        socket: Arc<CanSocket>,
    }

    impl SocketCanBus {
        pub fn open(interface_name: &str) -> J1939Result<Self> {
            let socket = CanSocket::open(interface_name)
                .map_err(|e| J1939Error::Interface(format!("{interface_name}: {e}")))?;
            tracing::info!(interface = interface_name, "SocketCAN interface opened");
            Ok(Self {
                interface_name: interface_name.to_string(),
                socket: Arc::new(socket),
            })
        }

        pub fn interface_name(&self) -> &str {
            &self.interface_name
        }
    }

    /// A zero SO_RCVTIMEO means "block forever", so never hand one to the socket.
    const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

    fn read_timeout(remaining: Duration) -> Duration {
        remaining.max(MIN_READ_TIMEOUT)
    }

    /// J1939 only uses 29-bit identifiers.
    fn extended_id(id: Id) -> Option<u32> {
        match id {
            Id::Extended(id) => Some(id.as_raw()),
            Id::Standard(_) => None,
        }
    }

    fn join_error(e: tokio::task::JoinError) -> J1939Error {
        J1939Error::Interface(format!("blocking task failed: {e}"))
    }

    #[async_trait]
    impl Bus for SocketCanBus {
        async fn send_frame(&self, frame: &CanFrame) -> J1939Result<()> {
            let id = ExtendedId::new(frame.id)
                .ok_or_else(|| J1939Error::Protocol(format!("invalid extended ID 0x{:08X}", frame.id)))?;
            let raw = socketcan::CanFrame::new(id, &frame.data)
                .ok_or_else(|| J1939Error::Protocol(format!("invalid frame length {}", frame.data.len())))?;

            let socket = Arc::clone(&self.socket);
            tokio::task::spawn_blocking(move || socket.write_frame(&raw))
                .await
                .map_err(join_error)?
                .map_err(|e| J1939Error::Interface(format!("write failed: {e}")))
        }

        async fn recv_frame(&self, timeout: Duration) -> J1939Result<CanFrame> {
            let socket = Arc::clone(&self.socket);
            let result = tokio::task::spawn_blocking(move || {
                let deadline = Instant::now() + timeout;
                loop {
                    socket.set_read_timeout(read_timeout(deadline.saturating_duration_since(Instant::now())))?;
                    let raw = socket.read_frame()?;
                    match extended_id(raw.id()) {
                        Some(id) => return Ok(CanFrame::new(id, raw.data().to_vec())),
                        None if Instant::now() >= deadline => return Err(io::Error::from(io::ErrorKind::TimedOut)),
                        None => tracing::trace!(id = ?raw.id(), "skipping 11-bit frame"),
                    }
                }
            })
            .await
            .map_err(join_error)?;

            match result {
                Ok(frame) => Ok(frame),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    Err(J1939Error::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
                Err(e) => Err(J1939Error::Interface(format!("read failed: {e}"))),
            }
        }
    }

}
