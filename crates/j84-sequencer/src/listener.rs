//! Observers of step progress.

use std::sync::Mutex;

use j84_protocol::outcome::{ActionOutcome, Outcome, StepResult};

/// Receives step lifecycle events as the sequence runs.
pub trait ResultsListener: Send + Sync {
    fn on_step_started(&self, part: u8, step: u8, name: &str);

    fn on_outcome(&self, outcome: &ActionOutcome);

    fn on_step_finished(&self, result: &StepResult);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingListener;

impl ResultsListener for TracingListener {
    fn on_step_started(&self, part: u8, step: u8, name: &str) {
        tracing::info!(part, step, name, "step started");
    }

    fn on_outcome(&self, outcome: &ActionOutcome) {
        let step = format!("{}.{}", outcome.part, outcome.step);
        match outcome.outcome {
            Outcome::Pass | Outcome::Info => {
                tracing::info!(step = %step, outcome = %outcome.outcome, "{}", outcome.message)
            }
            Outcome::Warn => {
                tracing::warn!(step = %step, outcome = %outcome.outcome, "{}", outcome.message)
            }
            Outcome::Fail | Outcome::Abort | Outcome::Incomplete => {
                tracing::error!(step = %step, outcome = %outcome.outcome, "{}", outcome.message)
            }
        }
    }

    fn on_step_finished(&self, result: &StepResult) {
        tracing::info!(
            part = result.part,
            step = result.step,
            outcome = %result.outcome,
            findings = result.outcomes.len(),
            duration_ms = result.duration_ms,
            "step finished"
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingListener {
    started: Mutex<Vec<(u8, u8)>>,
    outcomes: Mutex<Vec<ActionOutcome>>,
    finished: Mutex<Vec<StepResult>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// (part, step) of every step that started, in order.
    pub fn started(&self) -> Vec<(u8, u8)> {
        self.started.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<ActionOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<StepResult> {
        self.finished.lock().unwrap().clone()
    }
}

impl ResultsListener for CollectingListener {
    fn on_step_started(&self, part: u8, step: u8, _name: &str) {
        self.started.lock().unwrap().push((part, step));
    }

    fn on_outcome(&self, outcome: &ActionOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn on_step_finished(&self, result: &StepResult) {
        self.finished.lock().unwrap().push(result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_listener_records_in_order() {
        let listener = CollectingListener::new();
        listener.on_step_started(1, 2, "Vehicle data");
        let finding = ActionOutcome {
            part: 1,
            step: 2,
            outcome: Outcome::Warn,
            message: "check digit".into(),
        };
        listener.on_outcome(&finding);
        listener.on_step_finished(&StepResult::from_outcomes(1, 2, "Vehicle data", vec![finding.clone()], 3));

        assert_eq!(listener.started(), vec![(1, 2)]);
        assert_eq!(listener.outcomes(), vec![finding]);
        assert_eq!(listener.finished()[0].outcome, Outcome::Warn);
    }
}
