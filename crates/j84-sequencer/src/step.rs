//! Step trait and the context a step runs in.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use j84_bus::{J1939, J1939Error};
use j84_protocol::outcome::{ActionOutcome, Outcome};
use j84_protocol::vehicle::VehicleInformation;

use crate::config::SequencerConfig;
use crate::data_repository::DataRepository;
use crate::listener::ResultsListener;

/// Errors that stop a step early. The sequencer records them as `Abort`.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("bus error: {0}")]
    Bus(#[from] J1939Error),

    #[error("vehicle information has not been entered")]
    NoVehicleInformation,
}

/// One numbered step of the test plan.
#[async_trait]
pub trait TestStep: Send + Sync {
    fn part(&self) -> u8 {
        1
    }

    fn step(&self) -> u8;

    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError>;
}

/// Everything a running step can touch.
pub struct StepContext<'a> {
    pub j1939: &'a J1939,
    pub repo: &'a DataRepository,
    pub config: &'a SequencerConfig,
    part: u8,
    step: u8,
    outcomes: Vec<ActionOutcome>,
    listeners: &'a [Arc<dyn ResultsListener>],
}

impl<'a> StepContext<'a> {
    pub fn new(
        j1939: &'a J1939,
        repo: &'a DataRepository,
        config: &'a SequencerConfig,
        part: u8,
        step: u8,
        listeners: &'a [Arc<dyn ResultsListener>],
    ) -> Self {
        Self {
            j1939,
            repo,
            config,
            part,
            step,
            outcomes: Vec::new(),
            listeners,
        }
    }

    /// Record a finding and forward it to every listener.
    pub fn record(&mut self, outcome: Outcome, message: impl Into<String>) {
        let finding = ActionOutcome {
            part: self.part,
            step: self.step,
            outcome,
            message: message.into(),
        };
        for listener in self.listeners {
            listener.on_outcome(&finding);
        }
        self.outcomes.push(finding);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(Outcome::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(Outcome::Warn, message);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.record(Outcome::Fail, message);
    }

    pub fn outcomes(&self) -> &[ActionOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ActionOutcome> {
        self.outcomes
    }

    /// Vehicle facts entered for this run.
    pub async fn vehicle(&self) -> Result<VehicleInformation, StepError> {
        self.repo.vehicle().await.ok_or(StepError::NoVehicleInformation)
    }

    /// Prefix used in messages about a module.
    pub fn module_name(address: u8) -> String {
        match address {
            0x00 => "Engine #1 (0x00)".to_string(),
            0x01 => "Engine #2 (0x01)".to_string(),
            0x03 => "Transmission #1 (0x03)".to_string(),
            0x17 => "Instrument Cluster #1 (0x17)".to_string(),
            0x3D => "Exhaust Emission Controller (0x3D)".to_string(),
            other => format!("Module 0x{other:02X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::CollectingListener;
    use j84_bus::MockBus;

    #[test]
    fn module_names() {
        assert_eq!(StepContext::module_name(0x00), "Engine #1 (0x00)");
        assert_eq!(StepContext::module_name(0x4A), "Module 0x4A");
    }

    #[tokio::test]
    async fn record_forwards_to_listeners() {
        let j1939 = J1939::new(Arc::new(MockBus::new()), 0xF9);
        let repo = DataRepository::new();
        let config = SequencerConfig::default();
        let collector = Arc::new(CollectingListener::new());
        let listeners: Vec<Arc<dyn ResultsListener>> = vec![collector.clone()];

        let mut ctx = StepContext::new(&j1939, &repo, &config, 1, 5, &listeners);
        ctx.info("one");
        ctx.fail("two");

        assert_eq!(ctx.outcomes().len(), 2);
        let seen = collector.outcomes();
        assert_eq!(seen[1].outcome, Outcome::Fail);
        assert_eq!((seen[1].part, seen[1].step), (1, 5));
        assert!(matches!(ctx.vehicle().await, Err(StepError::NoVehicleInformation)));
    }
}
