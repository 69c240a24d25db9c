use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result classification of a check, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Info,
    Warn,
    Fail,
    /// Step could not complete because of a bus or internal error.
    Abort,
    /// Step never ran (sequence stopped early).
    Incomplete,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pass => "PASS",
            Outcome::Info => "INFO",
            Outcome::Warn => "WARN",
            Outcome::Fail => "FAIL",
            Outcome::Abort => "ABORT",
            Outcome::Incomplete => "INCOMPLETE",
        };
        f.write_str(s)
    }
}

/// A single recorded finding within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub part: u8,
    pub step: u8,
    pub outcome: Outcome,
    pub message: String,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} - {}: {}", self.part, self.step, self.outcome, self.message)
    }
}

/// Result of executing one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub part: u8,
    pub step: u8,
    pub name: String,
    pub outcome: Outcome,
    pub outcomes: Vec<ActionOutcome>,
    pub duration_ms: u64,
}

impl StepResult {
    /// Derive the overall outcome from the recorded findings.
    pub fn from_outcomes(
        part: u8,
        step: u8,
        name: impl Into<String>,
        outcomes: Vec<ActionOutcome>,
        duration_ms: u64,
    ) -> Self {
        let outcome = outcomes
            .iter()
            .map(|o| o.outcome)
            .max()
            .unwrap_or(Outcome::Pass);
        Self {
            part,
            step,
            name: name.into(),
            outcome,
            outcomes,
            duration_ms,
        }
    }

    /// Findings of exactly the given severity.
    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(move |o| o.outcome == outcome)
    }
}

/// Full record of one sequencer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
}

/// Step counts per overall outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub passed: usize,
    pub info: usize,
    pub warned: usize,
    pub failed: usize,
    pub aborted: usize,
    pub incomplete: usize,
}

impl SessionReport {
    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary::default();
        for step in &self.steps {
            match step.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Info => summary.info += 1,
                Outcome::Warn => summary.warned += 1,
                Outcome::Fail => summary.failed += 1,
                Outcome::Abort => summary.aborted += 1,
                Outcome::Incomplete => summary.incomplete += 1,
            }
        }
        summary
    }

    pub fn step(&self, part: u8, step: u8) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.part == part && s.step == step)
    }

    /// True when no step failed, aborted or was left incomplete.
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.outcome <= Outcome::Warn)
    }
}
