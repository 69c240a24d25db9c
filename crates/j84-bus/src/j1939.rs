//! J1939 request/response engine.
//!
//! Wraps a [`Bus`] with transport protocol reassembly and the request
//! semantics J1939-84 depends on: global requests collect every answer
//! inside a fixed window and are never retried, destination-specific
//! requests retry on timeout or busy NACK and treat any other
//! acknowledgment as final.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{J1939Error, J1939Result};
use crate::interface::Bus;
use crate::packets::{AckControl, AcknowledgmentPacket, Dm7, Dm30, J1939Message};
use crate::result::{BusResult, RequestResult, Response};
use crate::safety::RequestPolicy;
use crate::transport::{TransportEvent, TransportReassembler};
use crate::types::{GLOBAL_ADDR, PGN_ACK, PGN_DM7, Packet};

/// Protocol timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Tr: how long to wait for a destination-specific response.
    pub response_timeout: Duration,
    /// How long to collect responses to a global request.
    pub global_window: Duration,
    /// Attempts for a destination-specific request, including the first.
    pub ds_attempts: u32,
    /// Wait before retrying after a busy NACK.
    pub busy_retry_delay: Duration,
    /// T1: idle time after which a transport session is dropped.
    pub transport_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(200),
            global_window: Duration::from_millis(600),
            ds_attempts: 3,
            busy_retry_delay: Duration::from_millis(220),
            transport_timeout: Duration::from_millis(750),
        }
    }
}

/// J1939 engine bound to one source address.
pub struct J1939 {
    bus: Arc<dyn Bus>,
    address: u8,
    timing: Timing,
    policy: RequestPolicy,
    epoch: Instant,
    transport: Mutex<TransportReassembler>,
}

impl J1939 {
    pub fn new(bus: Arc<dyn Bus>, address: u8) -> Self {
        let timing = Timing::default();
        Self {
            bus,
            address,
            timing,
            policy: RequestPolicy::default(),
            epoch: Instant::now(),
            transport: Mutex::new(TransportReassembler::new(address, timing.transport_timeout)),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self.transport = Mutex::new(TransportReassembler::new(self.address, timing.transport_timeout));
        self
    }

    pub fn with_policy(mut self, policy: RequestPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn policy(&self) -> RequestPolicy {
        self.policy
    }

    /// Time since the engine was created; used to stamp packets.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Send a single-frame packet.
    pub async fn send(&self, packet: &Packet) -> J1939Result<()> {
        if packet.payload.len() > 8 {
            return Err(J1939Error::Transport(format!(
                "{} byte payload for PGN {} needs a transport session",
                packet.payload.len(),
                packet.pgn
            )));
        }
        tracing::trace!(pgn = packet.pgn, destination = packet.destination, "sending packet");
        self.bus.send_frame(&packet.to_frame()).await
    }

    /// Read the next complete packet, or `None` once `deadline` passes.
    ///
    /// While a transport session is open the deadline is extended to the
    /// session's last activity plus T1.
    pub async fn read_packet(&self, deadline: Instant) -> J1939Result<Option<Packet>> {
        loop {
            let effective = {
                let transport = self.transport.lock().await;
                match transport.latest_activity() {
                    Some(last) => deadline.max(self.epoch + last + self.timing.transport_timeout),
                    None => deadline,
                }
            };

            let now = Instant::now();
            if now >= effective {
                let events = self.transport.lock().await.expire(self.elapsed());
                self.dispatch(events).await?;
                return Ok(None);
            }

            let frame = match self.bus.recv_frame(effective - now).await {
                Ok(frame) => frame,
                Err(J1939Error::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            };

            let events = self.transport.lock().await.on_frame(&frame, self.elapsed());
            if let Some(packet) = self.dispatch(events).await? {
                if packet.source != self.address {
                    return Ok(Some(packet));
                }
            }
        }
    }

    /// Send transport replies; return the completed packet, if any.
    async fn dispatch(&self, events: Vec<TransportEvent>) -> J1939Result<Option<Packet>> {
        let mut complete = None;
        for event in events {
            match event {
                TransportEvent::Reply(frame) => self.bus.send_frame(&frame).await?,
                TransportEvent::Complete(packet) => complete = Some(packet),
                TransportEvent::Aborted { source, pgn, reason } => {
                    tracing::warn!(source, pgn, %reason, "transport session aborted");
                }
            }
        }
        Ok(complete)
    }

    fn addressed_to_us(&self, packet: &Packet) -> bool {
        packet.destination == self.address || packet.destination == GLOBAL_ADDR
    }

    /// Parse `packet` as an acknowledgment of `pgn` meant for us.
    fn matching_ack(&self, packet: &Packet, pgn: u32) -> Option<AcknowledgmentPacket> {
        if packet.pgn != PGN_ACK || !self.addressed_to_us(packet) {
            return None;
        }
        match AcknowledgmentPacket::parse(packet) {
            Ok(ack) if ack.pgn == pgn && (ack.address == self.address || ack.address == GLOBAL_ADDR) => {
                Some(ack)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(source = packet.source, error = %e, "malformed acknowledgment");
                None
            }
        }
    }

    /// Request `pgn` from every node and collect answers for the global window.
    pub async fn request_raw_global(&self, pgn: u32) -> J1939Result<RequestResult<Packet>> {
        self.policy.check(pgn)?;
        self.send(&Packet::request(pgn, self.address, GLOBAL_ADDR)).await?;
        tracing::debug!(pgn, "global request sent");

        let deadline = Instant::now() + self.timing.global_window;
        let mut result = RequestResult::default();
        while let Some(packet) = self.read_packet(deadline).await? {
            if packet.pgn == pgn && self.addressed_to_us(&packet) {
                result.packets.push(packet);
            } else if let Some(ack) = self.matching_ack(&packet, pgn) {
                result.acks.push(ack);
            }
        }
        tracing::debug!(
            pgn,
            responses = result.packets.len(),
            acks = result.acks.len(),
            "global request complete"
        );
        Ok(result)
    }

    /// Request `pgn` from `destination`, retrying on timeout or busy.
    pub async fn request_raw_ds(&self, pgn: u32, destination: u8) -> J1939Result<BusResult<Packet>> {
        self.policy.check(pgn)?;
        let request = Packet::request(pgn, self.address, destination);
        self.exchange(&request, destination, pgn, pgn).await
    }

    /// Send a destination-specific command and wait for `response_pgn`.
    ///
    /// Acknowledgments are matched against the command's own PGN.
    pub async fn command_ds(
        &self,
        pgn: u32,
        destination: u8,
        payload: Vec<u8>,
        response_pgn: u32,
    ) -> J1939Result<BusResult<Packet>> {
        self.policy.check(pgn)?;
        let command = Packet::new(pgn, self.address, destination, payload);
        self.exchange(&command, destination, pgn, response_pgn).await
    }

    async fn exchange(
        &self,
        outgoing: &Packet,
        destination: u8,
        ack_pgn: u32,
        response_pgn: u32,
    ) -> J1939Result<BusResult<Packet>> {
        let attempts = self.timing.ds_attempts.max(1);
        let mut last_busy = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tracing::debug!(pgn = response_pgn, destination, attempt, "retrying request");
            }
            self.send(outgoing).await?;
            let deadline = Instant::now() + self.timing.response_timeout;
            last_busy = None;

            while let Some(packet) = self.read_packet(deadline).await? {
                if packet.source != destination {
                    continue;
                }
                if packet.pgn == response_pgn && self.addressed_to_us(&packet) {
                    return Ok(BusResult {
                        retry_used: attempt > 1,
                        response: Response::Packet(packet),
                    });
                }
                if let Some(ack) = self.matching_ack(&packet, ack_pgn) {
                    if ack.control == AckControl::CannotRespond {
                        last_busy = Some(ack);
                        break;
                    }
                    return Ok(BusResult {
                        retry_used: attempt > 1,
                        response: Response::Ack(ack),
                    });
                }
            }

            if last_busy.is_some() {
                tracing::debug!(pgn = response_pgn, destination, attempt, "destination busy");
                if attempt < attempts {
                    tokio::time::sleep(self.timing.busy_retry_delay).await;
                }
            } else {
                tracing::debug!(pgn = response_pgn, destination, attempt, "no response");
            }
        }

        let response = match last_busy {
            Some(ack) => Response::Ack(ack),
            None => Response::Timeout,
        };
        Ok(BusResult {
            retry_used: attempts > 1,
            response,
        })
    }

    /// Typed global request; malformed responses land in `rejected`.
    pub async fn request_global<T: J1939Message>(&self) -> J1939Result<RequestResult<T>> {
        Ok(self.request_raw_global(T::PGN).await?.parse(T::parse))
    }

    /// Typed destination-specific request.
    pub async fn request_ds<T: J1939Message>(&self, destination: u8) -> J1939Result<BusResult<T>> {
        Ok(self.request_raw_ds(T::PGN, destination).await?.parse(T::parse))
    }

    /// DM7 for every test of `spn`, answered with DM30.
    pub async fn request_test_results(&self, destination: u8, spn: u32) -> J1939Result<BusResult<Dm30>> {
        let command = Dm7::all_results_for(self.address, spn);
        Ok(self
            .command_ds(PGN_DM7, destination, command.to_payload(), Dm30::PGN)
            .await?
            .parse(Dm30::parse))
    }

    /// Collect every complete packet seen during `duration`.
    pub async fn read_broadcasts(&self, duration: Duration) -> J1939Result<Vec<Packet>> {
        let deadline = Instant::now() + duration;
        let mut packets = Vec::new();
        while let Some(packet) = self.read_packet(deadline).await? {
            packets.push(packet);
        }
        tracing::debug!(count = packets.len(), "broadcast capture complete");
        Ok(packets)
    }
}
