//! Wire contract: one JSON request in, one JSON response out.
//!
//! This is the shape the runner's IPC mode speaks. Every numeric field
//! is a float except `steps` and `seed`.

use crate::{
    analysis::{analyze, Analysis},
    config::SimConfig,
    engine::run_with_config,
    error::SimResult,
    narrative::explain,
    policy::PolicyParams,
    snapshot::{NeighborhoodSnapshot, SimulationPoint},
    types::{RunId, Step},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_STEPS: Step = 24;

fn default_steps() -> Step {
    DEFAULT_STEPS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationRequest {
    pub policy_type: String,
    #[serde(default)]
    pub params:      PolicyParams,
    #[serde(default = "default_steps")]
    pub steps:       Step,
    #[serde(default)]
    pub seed:        Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplanationText {
    pub technical: String,
    pub layman:    String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResponse {
    pub run_id:          RunId,
    pub seed:            u64,
    pub history:         Vec<SimulationPoint>,
    pub analysis:        Analysis,
    pub neighborhoods:   BTreeMap<String, NeighborhoodSnapshot>,
    pub explanation:     ExplanationText,
    pub recommendations: Vec<String>,
}

/// Run, analyze and explain one request.
pub fn simulate(request: &SimulationRequest, config: &SimConfig) -> SimResult<SimulationResponse> {
    let outcome = run_with_config(
        &request.policy_type,
        &request.params,
        request.steps,
        request.seed,
        config,
    )?;
    let analysis = analyze(&outcome.history);
    let explanation = explain(&analysis, &outcome.history);
    Ok(SimulationResponse {
        run_id: outcome.run_id,
        seed: outcome.seed,
        history: outcome.history,
        analysis,
        neighborhoods: outcome.neighborhoods,
        explanation: ExplanationText {
            technical: explanation.technical,
            layman: explanation.layman,
        },
        recommendations: explanation.recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req: SimulationRequest = serde_json::from_str(r#"{"policy_type":"none"}"#).unwrap();
        assert_eq!(req.steps, DEFAULT_STEPS);
        assert!(req.params.is_empty());
        assert_eq!(req.seed, None);
    }
}
