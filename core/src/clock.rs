//! Simulation clock: owns the step counter.

use crate::types::Step;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_step: Step,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one step. Returns the new step number.
    pub fn advance(&mut self) -> Step {
        self.current_step += 1;
        self.current_step
    }
}
