//! Ordered collection of test steps.
//!
//! The sequencer runs steps in registration order; lookups by
//! (part, step) let callers run or inspect a single step.

use std::collections::HashMap;

use crate::step::TestStep;
use crate::steps;

/// Metadata about a registered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub part: u8,
    pub step: u8,
    pub name: String,
}

pub struct StepRegistry {
    steps: Vec<Box<dyn TestStep>>,
    /// (part, step) → index into `steps`.
    index: HashMap<(u8, u8), usize>,
}

impl StepRegistry {
    /// Build a registry; a later step with the same number replaces the
    /// index entry of an earlier one.
    pub fn new(steps: Vec<Box<dyn TestStep>>) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| ((s.part(), s.step()), i))
            .collect();
        Self { steps, index }
    }

    /// Part 1 of the test plan, in execution order.
    pub fn part1() -> Self {
        Self::new(steps::part1())
    }

    pub fn lookup(&self, part: u8, step: u8) -> Option<&dyn TestStep> {
        self.index.get(&(part, step)).map(|&i| self.steps[i].as_ref())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TestStep> {
        self.steps.iter().map(|s| s.as_ref())
    }

    pub fn list(&self) -> Vec<StepInfo> {
        self.iter()
            .map(|s| StepInfo {
                part: s.part(),
                step: s.step(),
                name: s.name().to_string(),
            })
            .collect()
    }
}
