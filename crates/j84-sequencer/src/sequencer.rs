//! Runs registered steps against a bus and builds the session report.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use j84_bus::J1939;
use j84_protocol::outcome::{ActionOutcome, Outcome, SessionReport, StepResult};

use crate::config::SequencerConfig;
use crate::data_repository::DataRepository;
use crate::listener::ResultsListener;
use crate::registry::StepRegistry;
use crate::step::{StepContext, TestStep};

/// Requests that a running sequence stop after the current step.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Sequencer {
    j1939: J1939,
    repo: DataRepository,
    config: SequencerConfig,
    listeners: Vec<Arc<dyn ResultsListener>>,
    stop: StopHandle,
}

impl Sequencer {
    pub fn new(j1939: J1939, config: SequencerConfig) -> Self {
        Self {
            j1939,
            repo: DataRepository::new(),
            config,
            listeners: Vec::new(),
            stop: StopHandle::default(),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ResultsListener>) {
        self.listeners.push(listener);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn repository(&self) -> &DataRepository {
        &self.repo
    }

    pub fn j1939(&self) -> &J1939 {
        &self.j1939
    }

    /// Run every step in `registry` in order.
    ///
    /// Step errors are recorded as `Abort` and the sequence continues.
    /// Once stopped, the remaining steps are reported as `Incomplete`.
    pub async fn run(&self, registry: &StepRegistry) -> SessionReport {
        let id = Uuid::now_v7();
        let started_at = Utc::now();
        tracing::info!(session = %id, steps = registry.len(), "sequence started");

        if let Some(vehicle) = &self.config.vehicle {
            self.repo.set_vehicle(vehicle.clone()).await;
        }

        let mut steps = Vec::with_capacity(registry.len());
        for step in registry.iter() {
            let result = if self.stop.is_stopped() {
                incomplete(step)
            } else {
                self.run_step(step).await
            };
            steps.push(result);
        }

        let report = SessionReport {
            id,
            started_at,
            finished_at: Utc::now(),
            steps,
        };
        let summary = report.summary();
        tracing::info!(
            session = %id,
            passed = summary.passed,
            warned = summary.warned,
            failed = summary.failed,
            aborted = summary.aborted,
            incomplete = summary.incomplete,
            "sequence finished"
        );
        report
    }

    /// Run one step and report it to the listeners.
    pub async fn run_step(&self, step: &dyn TestStep) -> StepResult {
        let (part, number, name) = (step.part(), step.step(), step.name());
        for listener in &self.listeners {
            listener.on_step_started(part, number, name);
        }

        let start = Instant::now();
        let mut ctx = StepContext::new(&self.j1939, &self.repo, &self.config, part, number, &self.listeners);
        if let Err(e) = step.run(&mut ctx).await {
            tracing::error!(part, step = number, error = %e, "step aborted");
            ctx.record(Outcome::Abort, e.to_string());
        }
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = StepResult::from_outcomes(part, number, name, ctx.into_outcomes(), duration_ms);
        for listener in &self.listeners {
            listener.on_step_finished(&result);
        }
        result
    }
}

fn incomplete(step: &dyn TestStep) -> StepResult {
    let finding = ActionOutcome {
        part: step.part(),
        step: step.step(),
        outcome: Outcome::Incomplete,
        message: "sequence stopped before this step ran".to_string(),
    };
    StepResult::from_outcomes(step.part(), step.step(), step.name(), vec![finding], 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::CollectingListener;
    use crate::step::StepError;
    use async_trait::async_trait;
    use j84_bus::{J1939Error, MockBus};
    use std::time::Duration;

    struct Scripted {
        number: u8,
        outcome: Option<Outcome>,
        error: bool,
        stop: Option<StopHandle>,
    }

    impl Scripted {
        fn new(number: u8) -> Self {
            Self {
                number,
                outcome: None,
                error: false,
                stop: None,
            }
        }
    }

    #[async_trait]
    impl TestStep for Scripted {
        fn step(&self) -> u8 {
            self.number
        }

        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
            tokio::time::sleep(Duration::from_millis(40)).await;
            if let Some(outcome) = self.outcome {
                ctx.record(outcome, "scripted finding");
            }
            if let Some(stop) = &self.stop {
                stop.stop();
            }
            if self.error {
                return Err(J1939Error::Interface("bus off".into()).into());
            }
            Ok(())
        }
    }

    fn sequencer() -> Sequencer {
        Sequencer::new(J1939::new(Arc::new(MockBus::new()), 0xF9), SequencerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn errors_become_abort_and_sequence_continues() {
        let mut seq = sequencer();
        let collector = Arc::new(CollectingListener::new());
        seq.add_listener(collector.clone());

        let failing = Scripted {
            outcome: Some(Outcome::Info),
            error: true,
            ..Scripted::new(3)
        };
        let warning = Scripted {
            outcome: Some(Outcome::Warn),
            ..Scripted::new(4)
        };
        let registry = StepRegistry::new(vec![Box::new(Scripted::new(2)), Box::new(failing), Box::new(warning)]);
        let report = seq.run(&registry).await;

        let outcomes: Vec<Outcome> = report.steps.iter().map(|s| s.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::Pass, Outcome::Abort, Outcome::Warn]);
        assert_eq!(report.steps[0].duration_ms, 40);
        assert!(report.step(1, 3).unwrap().outcomes[1].message.contains("bus off"));
        assert!(!report.is_success());
        assert_eq!(collector.started(), vec![(1, 2), (1, 3), (1, 4)]);
        assert_eq!(collector.finished().len(), 3);
        assert_eq!(report.id.get_version_num(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_marks_remaining_steps_incomplete() {
        let seq = sequencer();
        let stopping = Scripted {
            stop: Some(seq.stop_handle()),
            ..Scripted::new(3)
        };
        let registry = StepRegistry::new(vec![
            Box::new(Scripted::new(2)),
            Box::new(stopping),
            Box::new(Scripted::new(4)),
            Box::new(Scripted::new(5)),
        ]);
        let report = seq.run(&registry).await;

        assert_eq!(report.steps[1].outcome, Outcome::Pass);
        assert_eq!(report.steps[2].outcome, Outcome::Incomplete);
        assert_eq!(report.steps[3].outcome, Outcome::Incomplete);
        assert_eq!(report.summary().incomplete, 2);
        assert!(!report.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn vehicle_from_config_lands_in_repository() {
        let mut config = SequencerConfig::default();
        config.vehicle = Some(j84_bus::SimulatedVehicle::reference_info());
        let seq = Sequencer::new(J1939::new(Arc::new(MockBus::new()), 0xF9), config);
        let report = seq.run(&StepRegistry::new(Vec::new())).await;

        assert!(report.steps.is_empty());
        assert!(report.is_success());
        assert_eq!(seq.repository().vehicle().await.unwrap().model_year, 2024);
    }
}
