//! J1939-21 transport protocol: BAM and RTS/CTS reassembly plus frame
//! builders for the sending side.
//!
//! The reassembler is a plain state machine fed one frame at a time; it
//! never touches the bus itself. Frames it wants sent (CTS, EOM ACK,
//! Abort) come back as [`TransportEvent::Reply`].

use std::collections::HashMap;
use std::time::Duration;

use crate::types::{CanFrame, GLOBAL_ADDR, J1939Id, PGN_TP_CM, PGN_TP_DT, Packet, pgn_bytes};

// ── TP.CM control bytes ─────────────────────────────────────────

pub const CM_RTS: u8 = 16;
pub const CM_CTS: u8 = 17;
pub const CM_EOM_ACK: u8 = 19;
pub const CM_BAM: u8 = 32;
pub const CM_ABORT: u8 = 255;

// ── Abort reasons ───────────────────────────────────────────────

pub const ABORT_TIMEOUT: u8 = 3;
pub const ABORT_BAD_SEQUENCE: u8 = 7;
pub const ABORT_TOO_LARGE: u8 = 9;

/// Largest message the transport protocol can carry.
pub const MAX_MESSAGE_SIZE: usize = 1785;

/// Transport frames are sent at the lowest priority.
pub const TP_PRIORITY: u8 = 7;

/// Number of TP.DT frames needed for `size` bytes.
pub fn packet_count(size: usize) -> usize {
    size.div_ceil(7)
}

/// Outcome of feeding a frame to the reassembler.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A complete message (single frame or reassembled).
    Complete(Packet),
    /// A frame that must be sent back to the originator.
    Reply(CanFrame),
    /// A session was dropped before completion.
    Aborted { source: u8, pgn: u32, reason: String },
}

#[derive(Debug)]
struct Session {
    pgn: u32,
    priority: u8,
    destination: u8,
    size: usize,
    total_packets: u8,
    next_seq: u8,
    /// Last sequence number granted by our CTS (RTS sessions only).
    window_end: u8,
    max_per_cts: u8,
    data: Vec<u8>,
    last_activity: Duration,
    broadcast: bool,
}

/// Per-(source, destination) transport session reassembler.
#[derive(Debug)]
pub struct TransportReassembler {
    address: u8,
    timeout: Duration,
    sessions: HashMap<(u8, u8), Session>,
}

impl TransportReassembler {
    /// `address` is our own address; RTS sessions to other nodes are ignored.
    pub fn new(address: u8, timeout: Duration) -> Self {
        Self {
            address,
            timeout,
            sessions: HashMap::new(),
        }
    }

    pub fn has_active_sessions(&self) -> bool {
        !self.sessions.is_empty()
    }

    /// Most recent frame time across open sessions.
    pub fn latest_activity(&self) -> Option<Duration> {
        self.sessions.values().map(|s| s.last_activity).max()
    }

    /// Drop sessions idle for longer than the transport timeout.
    pub fn expire(&mut self, now: Duration) -> Vec<TransportEvent> {
        let timeout = self.timeout;
        let stale: Vec<(u8, u8)> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_sub(s.last_activity) > timeout)
            .map(|(k, _)| *k)
            .collect();

        let mut events = Vec::new();
        for key in stale {
            if let Some(session) = self.sessions.remove(&key) {
                tracing::debug!(source = key.0, pgn = session.pgn, "transport session timed out");
                if !session.broadcast {
                    events.push(TransportEvent::Reply(abort_frame(
                        session.pgn,
                        self.address,
                        key.0,
                        ABORT_TIMEOUT,
                    )));
                }
                events.push(TransportEvent::Aborted {
                    source: key.0,
                    pgn: session.pgn,
                    reason: "transport timeout".into(),
                });
            }
        }
        events
    }

    /// Feed one received frame.
    pub fn on_frame(&mut self, frame: &CanFrame, now: Duration) -> Vec<TransportEvent> {
        let mut events = self.expire(now);
        let id = frame.j1939_id();
        match id.pgn {
            PGN_TP_CM => self.on_connection_management(id, &frame.data, now, &mut events),
            PGN_TP_DT => self.on_data_transfer(id, &frame.data, now, &mut events),
            _ => events.push(TransportEvent::Complete(Packet::from_frame(frame, now))),
        }
        events
    }

    fn on_connection_management(
        &mut self,
        id: J1939Id,
        data: &[u8],
        now: Duration,
        events: &mut Vec<TransportEvent>,
    ) {
        if data.len() < 8 {
            tracing::warn!(source = id.source, len = data.len(), "short TP.CM frame ignored");
            return;
        }
        let pgn = data[5] as u32 | (data[6] as u32) << 8 | (data[7] as u32) << 16;
        let key = (id.source, id.destination);

        match data[0] {
            CM_BAM | CM_RTS => {
                let broadcast = data[0] == CM_BAM;
                if broadcast && id.destination != GLOBAL_ADDR {
                    return;
                }
                if !broadcast && id.destination != self.address {
                    return;
                }

                let size = data[1] as usize | (data[2] as usize) << 8;
                let total_packets = data[3];
                if size > MAX_MESSAGE_SIZE || packet_count(size) != total_packets as usize || size == 0 {
                    tracing::warn!(source = id.source, pgn, size, total_packets, "invalid transport announcement");
                    if !broadcast {
                        events.push(TransportEvent::Reply(abort_frame(
                            pgn,
                            self.address,
                            id.source,
                            ABORT_TOO_LARGE,
                        )));
                    }
                    return;
                }

                if self.sessions.contains_key(&key) {
                    tracing::debug!(source = id.source, pgn, "new announcement replaces open session");
                }

                let max_per_cts = if data[4] == 0 { 0xFF } else { data[4] };
                let window_end = if broadcast {
                    total_packets
                } else {
                    total_packets.min(max_per_cts)
                };

                self.sessions.insert(
                    key,
                    Session {
                        pgn,
                        priority: id.priority,
                        destination: id.destination,
                        size,
                        total_packets,
                        next_seq: 1,
                        window_end,
                        max_per_cts,
                        data: Vec::with_capacity(size),
                        last_activity: now,
                        broadcast,
                    },
                );

                if !broadcast {
                    events.push(TransportEvent::Reply(cts_frame(
                        pgn,
                        self.address,
                        id.source,
                        window_end,
                        1,
                    )));
                }
            }
            CM_ABORT => {
                // An abort from the sender targets the session it opened with us.
                if let Some(session) = self.sessions.remove(&key) {
                    events.push(TransportEvent::Aborted {
                        source: id.source,
                        pgn: session.pgn,
                        reason: format!("aborted by sender (reason {})", data[1]),
                    });
                }
            }
            _ => {}
        }
    }

    fn on_data_transfer(
        &mut self,
        id: J1939Id,
        data: &[u8],
        now: Duration,
        events: &mut Vec<TransportEvent>,
    ) {
        let key = (id.source, id.destination);
        let Some(session) = self.sessions.get_mut(&key) else {
            return;
        };
        if data.is_empty() {
            return;
        }

        let seq = data[0];
        if seq != session.next_seq {
            let pgn = session.pgn;
            let broadcast = session.broadcast;
            self.sessions.remove(&key);
            if !broadcast {
                events.push(TransportEvent::Reply(abort_frame(
                    pgn,
                    self.address,
                    id.source,
                    ABORT_BAD_SEQUENCE,
                )));
            }
            events.push(TransportEvent::Aborted {
                source: id.source,
                pgn,
                reason: format!("bad sequence number {seq}"),
            });
            return;
        }

        let remaining = session.size - session.data.len();
        let take = remaining.min(data.len() - 1).min(7);
        session.data.extend_from_slice(&data[1..1 + take]);
        session.last_activity = now;
        session.next_seq = session.next_seq.wrapping_add(1);

        if session.data.len() >= session.size || seq >= session.total_packets {
            if let Some(mut session) = self.sessions.remove(&key) {
                session.data.truncate(session.size);
                if !session.broadcast {
                    events.push(TransportEvent::Reply(eom_ack_frame(
                        session.pgn,
                        self.address,
                        id.source,
                        session.size,
                        session.total_packets,
                    )));
                }
                events.push(TransportEvent::Complete(Packet {
                    priority: session.priority,
                    pgn: session.pgn,
                    source: id.source,
                    destination: session.destination,
                    payload: session.data,
                    timestamp: now,
                }));
            }
        } else if !session.broadcast && seq == session.window_end {
            let next = seq + 1;
            let count = (session.total_packets - seq).min(session.max_per_cts);
            session.window_end = seq + count;
            events.push(TransportEvent::Reply(cts_frame(
                session.pgn,
                self.address,
                id.source,
                count,
                next,
            )));
        }
    }
}

// ── Frame builders ──────────────────────────────────────────────

fn cm_frame(source: u8, destination: u8, bytes: [u8; 5], pgn: u32) -> CanFrame {
    let id = J1939Id::new(TP_PRIORITY, PGN_TP_CM, source, destination);
    let p = pgn_bytes(pgn);
    let mut data = bytes.to_vec();
    data.extend_from_slice(&p);
    CanFrame::new(id.encode(), data)
}

pub fn bam_frame(pgn: u32, source: u8, size: usize) -> CanFrame {
    cm_frame(
        source,
        GLOBAL_ADDR,
        [
            CM_BAM,
            (size & 0xFF) as u8,
            (size >> 8) as u8,
            packet_count(size) as u8,
            0xFF,
        ],
        pgn,
    )
}

pub fn rts_frame(pgn: u32, source: u8, destination: u8, size: usize) -> CanFrame {
    cm_frame(
        source,
        destination,
        [
            CM_RTS,
            (size & 0xFF) as u8,
            (size >> 8) as u8,
            packet_count(size) as u8,
            0xFF,
        ],
        pgn,
    )
}

pub fn cts_frame(pgn: u32, source: u8, destination: u8, count: u8, next_seq: u8) -> CanFrame {
    cm_frame(source, destination, [CM_CTS, count, next_seq, 0xFF, 0xFF], pgn)
}

pub fn eom_ack_frame(pgn: u32, source: u8, destination: u8, size: usize, packets: u8) -> CanFrame {
    cm_frame(
        source,
        destination,
        [
            CM_EOM_ACK,
            (size & 0xFF) as u8,
            (size >> 8) as u8,
            packets,
            0xFF,
        ],
        pgn,
    )
}

pub fn abort_frame(pgn: u32, source: u8, destination: u8, reason: u8) -> CanFrame {
    cm_frame(source, destination, [CM_ABORT, reason, 0xFF, 0xFF, 0xFF], pgn)
}

/// TP.DT frames for a payload; the final frame is padded with 0xFF.
pub fn data_frames(source: u8, destination: u8, payload: &[u8]) -> Vec<CanFrame> {
    let id = J1939Id::new(TP_PRIORITY, PGN_TP_DT, source, destination).encode();
    payload
        .chunks(7)
        .enumerate()
        .map(|(i, chunk)| {
            let mut data = Vec::with_capacity(8);
            data.push((i + 1) as u8);
            data.extend_from_slice(chunk);
            data.resize(8, 0xFF);
            CanFrame::new(id, data)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PGN_DM19, PGN_VIN, TOOL_ADDR};

    fn completes(events: &[TransportEvent]) -> Vec<&Packet> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Complete(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn replies(events: &[TransportEvent]) -> Vec<&CanFrame> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Reply(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn single_frame_passes_through() {
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));
        let frame = CanFrame::new(0x18FECA00, vec![0x00, 0xFF, 0, 0, 0, 0, 0xFF, 0xFF]);
        let events = r.on_frame(&frame, Duration::from_millis(10));
        let packets = completes(&events);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].pgn, 0xFECA);
        assert_eq!(packets[0].timestamp, Duration::from_millis(10));
    }

    #[test]
    fn bam_reassembly() {
        let payload: Vec<u8> = b"1FUJGLDR2RLBP8834*".to_vec();
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));

        let mut events = r.on_frame(&bam_frame(PGN_VIN, 0x00, payload.len()), Duration::ZERO);
        assert!(r.has_active_sessions());
        for (i, f) in data_frames(0x00, GLOBAL_ADDR, &payload).iter().enumerate() {
            events.extend(r.on_frame(f, Duration::from_millis(50 * (i as u64 + 1))));
        }

        let packets = completes(&events);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].pgn, PGN_VIN);
        assert_eq!(packets[0].payload, payload);
        assert_eq!(packets[0].destination, GLOBAL_ADDR);
        assert!(replies(&events).is_empty());
        assert!(!r.has_active_sessions());
    }

    #[test]
    fn rts_cts_reassembly_sends_cts_and_eom() {
        let payload: Vec<u8> = (0..40u8).collect();
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));

        let events = r.on_frame(&rts_frame(PGN_DM19, 0x00, TOOL_ADDR, payload.len()), Duration::ZERO);
        let cts = replies(&events);
        assert_eq!(cts.len(), 1);
        assert_eq!(cts[0].data[0], CM_CTS);
        assert_eq!(cts[0].data[1], 6); // all 6 packets
        assert_eq!(cts[0].data[2], 1);
        assert_eq!(cts[0].j1939_id().destination, 0x00);

        let mut events = Vec::new();
        for f in data_frames(0x00, TOOL_ADDR, &payload) {
            events.extend(r.on_frame(&f, Duration::from_millis(5)));
        }
        let packets = completes(&events);
        assert_eq!(packets[0].payload, payload);
        assert_eq!(packets[0].destination, TOOL_ADDR);
        let eom = replies(&events);
        assert_eq!(eom[0].data[0], CM_EOM_ACK);
        assert_eq!(eom[0].data[3], 6);
    }

    #[test]
    fn rts_to_other_node_ignored() {
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));
        let events = r.on_frame(&rts_frame(PGN_DM19, 0x00, 0x17, 20), Duration::ZERO);
        assert!(events.is_empty());
        assert!(!r.has_active_sessions());
    }

    #[test]
    fn bad_sequence_aborts() {
        let payload = vec![0x11; 20];
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));
        r.on_frame(&rts_frame(PGN_DM19, 0x00, TOOL_ADDR, payload.len()), Duration::ZERO);
        let frames = data_frames(0x00, TOOL_ADDR, &payload);
        let events = r.on_frame(&frames[1], Duration::from_millis(1));

        assert!(events.iter().any(|e| matches!(e, TransportEvent::Aborted { .. })));
        let abort = replies(&events);
        assert_eq!(abort[0].data[0], CM_ABORT);
        assert_eq!(abort[0].data[1], ABORT_BAD_SEQUENCE);
    }

    #[test]
    fn idle_session_expires() {
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));
        r.on_frame(&bam_frame(PGN_VIN, 0x00, 18), Duration::ZERO);
        let events = r.expire(Duration::from_millis(800));
        assert!(matches!(events[0], TransportEvent::Aborted { pgn: PGN_VIN, .. }));
        assert!(!r.has_active_sessions());
    }

    #[test]
    fn cts_windows_respect_max_packets() {
        let payload = vec![0x22; 30]; // 5 packets
        let mut r = TransportReassembler::new(TOOL_ADDR, Duration::from_millis(750));
        let mut rts = rts_frame(PGN_DM19, 0x00, TOOL_ADDR, payload.len());
        rts.data[4] = 2;
        let events = r.on_frame(&rts, Duration::ZERO);
        assert_eq!(replies(&events)[0].data[1], 2);

        let frames = data_frames(0x00, TOOL_ADDR, &payload);
        r.on_frame(&frames[0], Duration::ZERO);
        let events = r.on_frame(&frames[1], Duration::ZERO);
        let cts = replies(&events);
        assert_eq!(cts[0].data[1], 2);
        assert_eq!(cts[0].data[2], 3);
    }
}
