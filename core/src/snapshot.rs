//! Per-step aggregates and the final outcome of a run.
//!
//! One SimulationPoint is appended after every step, capturing the
//! post-update state. Points are immutable once appended.

use crate::{
    policy::Policy,
    types::{RunId, Step},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulationPoint {
    pub step:            Step,
    pub avg_price:       f64,
    /// Wealth Gini across all agents.
    pub gini:            f64,
    pub compliance_rate: f64,
    pub avg_stress:      f64,
    /// Units demanded across all neighborhoods at posted prices.
    pub total_demand:    f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NeighborhoodSnapshot {
    pub price:  f64,
    pub supply: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationOutcome {
    pub run_id:               RunId,
    pub seed:                 u64,
    pub policy:               Policy,
    pub history:              Vec<SimulationPoint>,
    /// Final state keyed by neighborhood name.
    pub neighborhoods:        BTreeMap<String, NeighborhoodSnapshot>,
    /// Wealth removed by capital flight over the run.
    pub capital_flight_total: f64,
}

impl SimulationOutcome {
    pub fn last_point(&self) -> Option<&SimulationPoint> {
        self.history.last()
    }
}
