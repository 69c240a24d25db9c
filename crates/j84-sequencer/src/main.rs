//! J1939-84 sequencer binary. Runs Part 1 against a CAN bus or the simulated
//! vehicle and prints the session report as JSON on stdout.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use j84_bus::{Bus, J1939, SimulatedVehicle};
use j84_sequencer::config::{BusKind, SequencerConfig};
use j84_sequencer::listener::TracingListener;
use j84_sequencer::registry::StepRegistry;
use j84_sequencer::sequencer::Sequencer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "j84-sequencer starting");

    // ── Load config ─────────────────────────────────────────────
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            let config = SequencerConfig::from_file(&path)?;
            tracing::info!(path = %path, "config loaded");
            config
        }
        None => {
            tracing::info!("no config file given, using defaults");
            SequencerConfig::default()
        }
    };

    // ── Open bus ────────────────────────────────────────────────
    let bus: Arc<dyn Bus> = match config.bus.kind {
        BusKind::Simulated => {
            if config.vehicle.is_none() {
                config.vehicle = Some(SimulatedVehicle::reference_info());
            }
            tracing::info!("using simulated reference vehicle");
            Arc::new(SimulatedVehicle::reference())
        }
        BusKind::Socketcan => open_socketcan(&config)?,
    };
    if config.vehicle.is_none() {
        anyhow::bail!("[vehicle] section is required when testing a real bus");
    }

    let j1939 = J1939::new(bus, config.tool_address)
        .with_timing(config.timing.to_timing())
        .with_policy(config.policy());

    // ── Run Part 1 ──────────────────────────────────────────────
    let registry = StepRegistry::part1();
    let mut sequencer = Sequencer::new(j1939, config);
    sequencer.add_listener(Arc::new(TracingListener));

    let stop = sequencer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            stop.stop();
        }
    });

    let report = sequencer.run(&registry).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_socketcan(config: &SequencerConfig) -> anyhow::Result<Arc<dyn Bus>> {
    let bus = j84_bus::SocketCanBus::open(&config.bus.interface)?;
    tracing::info!(interface = %config.bus.interface, "SocketCAN interface opened");
    Ok(Arc::new(bus))
}

#[cfg(not(target_os = "linux"))]
fn open_socketcan(_config: &SequencerConfig) -> anyhow::Result<Arc<dyn Bus>> {
    anyhow::bail!("SocketCAN is only available on Linux")
}
