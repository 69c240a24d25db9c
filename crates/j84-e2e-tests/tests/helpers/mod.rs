//! Shared harness for the end-to-end Part 1 suites.
//!
//! Runs the real step registry through `Sequencer` against a
//! `SimulatedVehicle`. Every suite uses a paused tokio clock, so listening
//! periods and retries finish instantly.

#![allow(dead_code)]

use std::sync::Arc;

use j84_bus::{Bus, J1939, SimulatedVehicle};
use j84_protocol::outcome::{Outcome, SessionReport, StepResult};
use j84_sequencer::config::SequencerConfig;
use j84_sequencer::data_repository::DataRepository;
use j84_sequencer::listener::CollectingListener;
use j84_sequencer::registry::StepRegistry;
use j84_sequencer::sequencer::Sequencer;

/// A simulated vehicle plus the configuration a run will use.
pub struct TestHarness {
    pub vehicle: Arc<SimulatedVehicle>,
    pub config: SequencerConfig,
    pub listener: Arc<CollectingListener>,
}

/// What a finished run leaves behind.
pub struct Run {
    pub report: SessionReport,
    pub repo: DataRepository,
}

impl TestHarness {
    /// Compliant reference vehicle with matching vehicle information.
    pub fn reference() -> Self {
        let mut config = SequencerConfig::default();
        config.vehicle = Some(SimulatedVehicle::reference_info());
        config.sequence.broadcast_listen_secs = 5;
        Self {
            vehicle: Arc::new(SimulatedVehicle::reference()),
            config,
            listener: Arc::new(CollectingListener::new()),
        }
    }

    pub fn allowing_clear(mut self) -> Self {
        self.config.sequence.allow_dtc_clear = true;
        self
    }

    pub fn sequencer_on(&self, bus: Arc<dyn Bus>) -> Sequencer {
        let j1939 = J1939::new(bus, self.config.tool_address)
            .with_timing(self.config.timing.to_timing())
            .with_policy(self.config.policy());
        let mut sequencer = Sequencer::new(j1939, self.config.clone());
        sequencer.add_listener(self.listener.clone());
        sequencer
    }

    pub fn sequencer(&self) -> Sequencer {
        self.sequencer_on(self.vehicle.clone())
    }

    /// Run all of Part 1 against the simulated vehicle.
    pub async fn run(&self) -> Run {
        let sequencer = self.sequencer();
        let report = sequencer.run(&StepRegistry::part1()).await;
        Run {
            report,
            repo: sequencer.repository().clone(),
        }
    }
}

pub fn step(report: &SessionReport, number: u8) -> &StepResult {
    report
        .step(1, number)
        .unwrap_or_else(|| panic!("step 1.{number} missing from report"))
}

/// Messages of findings with exactly `outcome` in step 1.`number`.
pub fn findings(report: &SessionReport, number: u8, outcome: Outcome) -> Vec<String> {
    step(report, number)
        .with_outcome(outcome)
        .map(|o| o.message.clone())
        .collect()
}

pub fn assert_step(report: &SessionReport, number: u8, expected: Outcome) {
    let result = step(report, number);
    assert_eq!(
        result.outcome, expected,
        "step 1.{number} ({}) findings: {:#?}",
        result.name, result.outcomes
    );
}

pub fn assert_finding(report: &SessionReport, number: u8, outcome: Outcome, text: &str) {
    let messages = findings(report, number, outcome);
    assert!(
        messages.iter().any(|m| m.contains(text)),
        "no {outcome} finding containing {text:?} in step 1.{number}: {messages:#?}"
    );
}
