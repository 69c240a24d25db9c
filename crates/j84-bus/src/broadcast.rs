//! Broadcast period analysis.
//!
//! Packets are grouped by (source, PGN) and their arrival intervals are
//! compared with the rate from the PGN database.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::pgn_db;
use crate::types::{GLOBAL_ADDR, Packet};

/// Smallest tolerance applied to any period.
pub const MIN_TOLERANCE: Duration = Duration::from_millis(5);

/// Allowed deviation from `period`: 10% of the period, at least 5 ms.
pub fn tolerance(period: Duration) -> Duration {
    (period / 10).max(MIN_TOLERANCE)
}

/// A problem with one broadcast parameter group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BroadcastFinding {
    TooFast {
        source: u8,
        pgn: u32,
        expected_ms: u64,
        observed_ms: u64,
    },
    TooSlow {
        source: u8,
        pgn: u32,
        expected_ms: u64,
        observed_ms: u64,
    },
    /// An on-request parameter group was broadcast.
    Unexpected { source: u8, pgn: u32 },
    InsufficientSamples { source: u8, pgn: u32, count: usize },
}

impl BroadcastFinding {
    pub fn source(&self) -> u8 {
        match self {
            BroadcastFinding::TooFast { source, .. }
            | BroadcastFinding::TooSlow { source, .. }
            | BroadcastFinding::Unexpected { source, .. }
            | BroadcastFinding::InsufficientSamples { source, .. } => *source,
        }
    }

    pub fn pgn(&self) -> u32 {
        match self {
            BroadcastFinding::TooFast { pgn, .. }
            | BroadcastFinding::TooSlow { pgn, .. }
            | BroadcastFinding::Unexpected { pgn, .. }
            | BroadcastFinding::InsufficientSamples { pgn, .. } => *pgn,
        }
    }
}

impl std::fmt::Display for BroadcastFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastFinding::TooFast {
                source,
                pgn,
                expected_ms,
                observed_ms,
            } => write!(
                f,
                "PGN {pgn} from 0x{source:02X} broadcast too fast: {observed_ms} ms (expected {expected_ms} ms)"
            ),
            BroadcastFinding::TooSlow {
                source,
                pgn,
                expected_ms,
                observed_ms,
            } => write!(
                f,
                "PGN {pgn} from 0x{source:02X} broadcast too slow: {observed_ms} ms (expected {expected_ms} ms)"
            ),
            BroadcastFinding::Unexpected { source, pgn } => {
                write!(f, "on-request PGN {pgn} broadcast by 0x{source:02X}")
            }
            BroadcastFinding::InsufficientSamples { source, pgn, count } => write!(
                f,
                "PGN {pgn} from 0x{source:02X} seen {count} time(s), period cannot be measured"
            ),
        }
    }
}

/// Interval statistics for one (source, PGN) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastStats {
    pub source: u8,
    pub pgn: u32,
    pub count: usize,
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub mean_interval_ms: Option<u64>,
}

/// Result of analyzing a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub stats: Vec<BroadcastStats>,
    pub findings: Vec<BroadcastFinding>,
}

impl BroadcastReport {
    /// PGNs seen from `source`.
    pub fn pgns_from(&self, source: u8) -> Vec<u32> {
        self.stats
            .iter()
            .filter(|s| s.source == source)
            .map(|s| s.pgn)
            .collect()
    }
}

/// Analyze broadcast packets captured over a listening period.
///
/// Destination-specific packets and PGNs without a definition are ignored.
pub fn analyze(packets: &[Packet]) -> BroadcastReport {
    let mut groups: BTreeMap<(u8, u32), Vec<Duration>> = BTreeMap::new();
    for packet in packets.iter().filter(|p| p.destination == GLOBAL_ADDR) {
        if pgn_db::pgn(packet.pgn).is_some() {
            groups
                .entry((packet.source, packet.pgn))
                .or_default()
                .push(packet.timestamp);
        }
    }

    let mut report = BroadcastReport::default();
    for ((source, pgn), mut times) in groups {
        times.sort();
        let intervals: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        let min = intervals.iter().min().copied();
        let max = intervals.iter().max().copied();
        let mean = (!intervals.is_empty())
            .then(|| intervals.iter().sum::<Duration>() / intervals.len() as u32);

        report.stats.push(BroadcastStats {
            source,
            pgn,
            count: times.len(),
            min_interval_ms: min.map(as_ms),
            max_interval_ms: max.map(as_ms),
            mean_interval_ms: mean.map(as_ms),
        });

        let Some(period) = pgn_db::pgn(pgn).and_then(|d| d.rate) else {
            report.findings.push(BroadcastFinding::Unexpected { source, pgn });
            continue;
        };

        let (Some(min), Some(max)) = (min, max) else {
            report.findings.push(BroadcastFinding::InsufficientSamples {
                source,
                pgn,
                count: times.len(),
            });
            continue;
        };

        let tol = tolerance(period);
        if min + tol < period {
            report.findings.push(BroadcastFinding::TooFast {
                source,
                pgn,
                expected_ms: as_ms(period),
                observed_ms: as_ms(min),
            });
        }
        if max > period + tol {
            report.findings.push(BroadcastFinding::TooSlow {
                source,
                pgn,
                expected_ms: as_ms(period),
                observed_ms: as_ms(max),
            });
        }
    }
    report
}

fn as_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
