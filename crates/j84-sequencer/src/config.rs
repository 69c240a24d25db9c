//! Sequencer configuration, loadable from TOML.

use std::time::Duration;

use serde::Deserialize;

use j84_bus::types::TOOL_ADDR;
use j84_bus::{RequestPolicy, Timing};
use j84_protocol::vehicle::VehicleInformation;

/// Top-level configuration for a test run.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencerConfig {
    /// Source address the tool claims on the bus.
    #[serde(default = "default_tool_address")]
    pub tool_address: u8,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Operator-entered vehicle facts. Required on a real bus; the
    /// simulated vehicle falls back to its own reference values.
    #[serde(default)]
    pub vehicle: Option<VehicleInformation>,
    #[serde(default)]
    pub sequence: SequenceConfig,
}

fn default_tool_address() -> u8 {
    TOOL_ADDR
}

/// Which bus to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    Socketcan,
    #[default]
    Simulated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,
    /// SocketCAN interface name (e.g., "can0").
    #[serde(default = "default_interface")]
    pub interface: String,
}

fn default_interface() -> String {
    "can0".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::default(),
            interface: default_interface(),
        }
    }
}

/// Protocol timing overrides, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,
    #[serde(default = "default_global_window")]
    pub global_window_ms: u64,
    #[serde(default = "default_ds_attempts")]
    pub ds_attempts: u32,
    #[serde(default = "default_busy_retry_delay")]
    pub busy_retry_delay_ms: u64,
    #[serde(default = "default_transport_timeout")]
    pub transport_timeout_ms: u64,
}

fn default_response_timeout() -> u64 {
    200
}

fn default_global_window() -> u64 {
    600
}

fn default_ds_attempts() -> u32 {
    3
}

fn default_busy_retry_delay() -> u64 {
    220
}

fn default_transport_timeout() -> u64 {
    750
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout(),
            global_window_ms: default_global_window(),
            ds_attempts: default_ds_attempts(),
            busy_retry_delay_ms: default_busy_retry_delay(),
            transport_timeout_ms: default_transport_timeout(),
        }
    }
}

impl TimingConfig {
    pub fn to_timing(&self) -> Timing {
        Timing {
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            global_window: Duration::from_millis(self.global_window_ms),
            ds_attempts: self.ds_attempts,
            busy_retry_delay: Duration::from_millis(self.busy_retry_delay_ms),
            transport_timeout: Duration::from_millis(self.transport_timeout_ms),
        }
    }
}

/// Knobs for the Part 1 steps.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// How long step 1.13 listens to broadcast traffic.
    #[serde(default = "default_broadcast_listen")]
    pub broadcast_listen_secs: u64,
    /// How long step 1.11 waits for DM1 from every module.
    #[serde(default = "default_dm1_listen")]
    pub dm1_listen_secs: u64,
    /// Send DM11 in step 1.9. Off by default: it erases fault history.
    #[serde(default)]
    pub allow_dtc_clear: bool,
}

fn default_broadcast_listen() -> u64 {
    10
}

fn default_dm1_listen() -> u64 {
    3
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            broadcast_listen_secs: default_broadcast_listen(),
            dm1_listen_secs: default_dm1_listen(),
            allow_dtc_clear: false,
        }
    }
}

impl SequenceConfig {
    pub fn broadcast_listen(&self) -> Duration {
        Duration::from_secs(self.broadcast_listen_secs)
    }

    pub fn dm1_listen(&self) -> Duration {
        Duration::from_secs(self.dm1_listen_secs)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            tool_address: default_tool_address(),
            bus: BusConfig::default(),
            timing: TimingConfig::default(),
            vehicle: None,
            sequence: SequenceConfig::default(),
        }
    }
}

impl SequencerConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Request policy implied by `sequence.allow_dtc_clear`.
    pub fn policy(&self) -> RequestPolicy {
        RequestPolicy {
            allow_clear: self.sequence.allow_dtc_clear,
        }
    }
}
