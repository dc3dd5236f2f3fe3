//! Agent population: per-agent economic state and aggregate statistics.
//!
//! Every agent draws exactly four behaviour rolls per step whatever the
//! policy. Policies that are numerically neutral therefore reproduce the
//! no-intervention run bit for bit under the same seed.

use crate::{
    config::PopulationConfig,
    error::{SimError, SimResult},
    market::{MarketConditions, Neighborhood},
    policy::{DistortionContext, EffectContext, Policy},
    rng::{RngBank, StreamRng, StreamSlot},
    types::{AgentId, NeighborhoodId, Step},
};
use serde::{Deserialize, Serialize};

/// Propensity at or above which an agent counts as compliant.
pub const COMPLIANCE_THRESHOLD: f64 = 0.5;
/// Disposable margin at which stress reaches zero.
pub const COMFORT_MARGIN: f64 = 0.6;
/// Extra stress when all desired consumption goes unmet.
pub const SHORTAGE_STRESS: f64 = 0.5;
pub const STRESS_SMOOTHING: f64 = 0.3;
pub const STRESS_COMPLIANCE_WEIGHT: f64 = 0.3;
pub const SHORTAGE_COMPLIANCE_WEIGHT: f64 = 0.6;
pub const COMPLIANCE_REVERSION: f64 = 0.1;
pub const COMPLIANCE_NOISE: f64 = 0.02;
/// Per-step defection probability at full shortage pressure.
pub const DEFECTION_RATE: f64 = 0.5;
pub const DEFECTION_SHOCK: f64 = 0.05;
/// Share of unmet demand a non-compliant agent tries to buy off-market.
pub const SHADOW_SHARE: f64 = 0.5;
pub const SAVINGS_RATE: f64 = 0.1;
pub const NEED_MIN: f64 = 0.9;
pub const NEED_MAX: f64 = 1.1;
/// Width of the income-rank band a neighborhood attracts.
const AFFLUENCE_SPREAD: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub income: f64,
    pub wealth: f64,
    pub neighborhood_id: NeighborhoodId,
    pub stress: f64,
    pub compliance_propensity: f64,
    /// Consumption units needed per step at the reference price.
    pub baseline_consumption: f64,
    /// Propensity the agent settles at when unstressed.
    pub base_propensity: f64,
    /// Tolerance for tax burden before capital flight, in [0, 1).
    pub risk_tolerance: f64,
    pub need_factor: f64,
    pub peers: Vec<AgentId>,
}

impl Agent {
    pub fn is_compliant(&self) -> bool {
        self.compliance_propensity >= COMPLIANCE_THRESHOLD
    }

    fn desired_units(&self, price: f64, reference_price: f64, elasticity: f64) -> f64 {
        let price = price.max(f64::MIN_POSITIVE);
        self.baseline_consumption * self.need_factor * (reference_price / price).powf(elasticity)
    }
}

/// Stress an agent settles at for a given disposable margin and unmet need.
pub fn stress_target(disposable: f64, gross_income: f64, unmet_share: f64) -> f64 {
    let margin = if gross_income > 0.0 {
        (disposable / gross_income).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (1.0 - margin / COMFORT_MARGIN + SHORTAGE_STRESS * unmet_share).clamp(0.0, 1.0)
}

/// Propensity an agent drifts toward under the given stress and shortage.
pub fn resting_propensity(base: f64, stress: f64, defection_pressure: f64) -> f64 {
    (base - STRESS_COMPLIANCE_WEIGHT * stress - SHORTAGE_COMPLIANCE_WEIGHT * defection_pressure)
        .clamp(0.0, 1.0)
}

/// Gini coefficient of non-negative values.
///
/// G = 2 * sum(i * x_i) / (n * sum(x)) - (n + 1) / n over ascending x,
/// with 1-based i. Returns 0 for empty, zero-total or all-equal input.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    sorted.sort_by(f64::total_cmp);
    let total: f64 = sorted.iter().sum();
    if total <= 0.0 || sorted[0] == sorted[n - 1] {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (i + 1) as f64 * x)
        .sum();
    let n = n as f64;
    (2.0 * weighted / (n * total) - (n + 1.0) / n).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPopulation {
    agents: Vec<Agent>,
    /// Wealth moved out of the economy by capital flight so far.
    pub capital_flight_total: f64,
}

impl AgentPopulation {
    /// Draw a population and place it across the neighborhoods.
    pub fn initialize(
        config: &PopulationConfig,
        neighborhoods: &[Neighborhood],
        bank: &RngBank,
    ) -> SimResult<Self> {
        if neighborhoods.is_empty() {
            return Err(SimError::InvalidConfig("population needs at least one neighborhood".into()));
        }
        let mut rng = bank.for_stream(StreamSlot::Population);
        let n = config.agent_count;

        let incomes = (0..n)
            .map(|_| rng.log_normal(config.income_log_mean, config.income_log_sigma))
            .collect::<SimResult<Vec<f64>>>()?;

        // Income rank in [0, 1] drives which neighborhood an agent lands in.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|a, b| incomes[*a].total_cmp(&incomes[*b]));
        let mut rank = vec![0.0; n];
        for (pos, idx) in order.into_iter().enumerate() {
            rank[idx] = if n > 1 { pos as f64 / (n - 1) as f64 } else { 0.5 };
        }

        let mut agents = Vec::with_capacity(n);
        for (id, income) in incomes.into_iter().enumerate() {
            let neighborhood_id = pick_neighborhood(rank[id], neighborhoods, &mut rng);
            let base_propensity = rng.uniform(config.base_propensity_min, config.base_propensity_max);
            let risk_tolerance = rng.next_f64();
            agents.push(Agent {
                id,
                income,
                wealth: income * config.wealth_multiple,
                neighborhood_id,
                stress: 0.0,
                compliance_propensity: base_propensity,
                baseline_consumption: config.consumption_base_units
                    + config.consumption_income_share * income,
                base_propensity,
                risk_tolerance,
                need_factor: 1.0,
                peers: Vec::new(),
            });
        }

        let mut net_rng = bank.for_stream(StreamSlot::Network);
        wire_peers(&mut agents, config.peers_min, config.peers_max, &mut net_rng);

        // Start every agent at its resting state under reference prices.
        for agent in &mut agents {
            let nb = &neighborhoods[agent.neighborhood_id];
            let spend = nb.reference_price * agent.baseline_consumption;
            let disposable = (agent.income - spend).max(0.0);
            agent.stress = stress_target(disposable, agent.income, 0.0);
            agent.compliance_propensity = resting_propensity(agent.base_propensity, agent.stress, 0.0);
        }

        log::info!(
            "population: {} agents across {} neighborhoods, initial gini={:.3}",
            agents.len(),
            neighborhoods.len(),
            gini(&agents.iter().map(|a| a.wealth).collect::<Vec<_>>())
        );

        Ok(Self {
            agents,
            capital_flight_total: 0.0,
        })
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Units demanded in each neighborhood at its posted price.
    pub fn demand_by_neighborhood(&self, neighborhoods: &[Neighborhood]) -> Vec<f64> {
        let mut demand = vec![0.0; neighborhoods.len()];
        for agent in &self.agents {
            let nb = &neighborhoods[agent.neighborhood_id];
            demand[agent.neighborhood_id] +=
                agent.desired_units(nb.price, nb.reference_price, nb.demand_elasticity);
        }
        demand
    }

    /// Resident profile each neighborhood's distortion is computed from.
    pub fn distortion_contexts(&self, policy: &Policy, neighborhood_count: usize) -> Vec<DistortionContext> {
        let mut residents = vec![0usize; neighborhood_count];
        let mut eligible = vec![0usize; neighborhood_count];
        let mut units = vec![0.0; neighborhood_count];
        for agent in &self.agents {
            let k = agent.neighborhood_id;
            residents[k] += 1;
            units[k] += agent.baseline_consumption;
            if policy.is_eligible(agent) {
                eligible[k] += 1;
            }
        }
        (0..neighborhood_count)
            .map(|k| {
                if residents[k] == 0 {
                    return DistortionContext::default();
                }
                DistortionContext {
                    eligible_share: eligible[k] as f64 / residents[k] as f64,
                    units_per_agent: units[k] / residents[k] as f64,
                }
            })
            .collect()
    }

    /// Apply one step of policy and market effects to every agent.
    pub fn step(
        &mut self,
        conditions: &[MarketConditions],
        policy: &Policy,
        ctx: &EffectContext,
        rng: &mut StreamRng,
    ) {
        // Peers are judged on last step's behaviour so update order is irrelevant.
        let defecting: Vec<bool> = self.agents.iter().map(|a| !a.is_compliant()).collect();
        let mut flight = 0.0;

        for agent in &mut self.agents {
            let need_roll = rng.next_f64();
            let noise_roll = rng.next_f64();
            let defect_roll = rng.next_f64();
            let flight_roll = rng.next_f64();

            agent.need_factor = NEED_MIN + (NEED_MAX - NEED_MIN) * need_roll;
            let c = &conditions[agent.neighborhood_id];

            // Consumption: legal market first, shadow market for the defectors.
            let desired = agent.desired_units(c.price, c.reference_price, c.demand_elasticity);
            let bought = desired * c.fill_ratio;
            let unmet = desired - bought;

            let effect = policy.agent_effect(agent, ctx);
            let gross = agent.income + effect.subsidy;
            let legal_spend = c.price * bought;
            let budget_left = (gross - effect.tax - legal_spend).max(0.0);
            let shadow_units = if !agent.is_compliant() && unmet > 0.0 && c.shadow_price > 0.0 {
                (unmet * SHADOW_SHARE).min(budget_left / c.shadow_price)
            } else {
                0.0
            };
            let spend = legal_spend + shadow_units * c.shadow_price;
            let disposable = (gross - effect.tax - spend).max(0.0);

            let unmet_share = if desired > 0.0 {
                ((unmet - shadow_units) / desired).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let target = stress_target(disposable, gross, unmet_share);
            agent.stress = (agent.stress + STRESS_SMOOTHING * (target - agent.stress)).clamp(0.0, 1.0);

            // Compliance drifts toward its resting level; shortage under a
            // binding cap adds discrete defections, contagious among peers.
            let pressure = c.defection_pressure();
            let resting = resting_propensity(agent.base_propensity, agent.stress, pressure);
            let noise = (2.0 * noise_roll - 1.0) * COMPLIANCE_NOISE;
            let mut propensity = agent.compliance_propensity
                + COMPLIANCE_REVERSION * (resting - agent.compliance_propensity)
                + noise;
            let peer_rate = if agent.peers.is_empty() {
                0.0
            } else {
                agent.peers.iter().filter(|p| defecting[**p]).count() as f64 / agent.peers.len() as f64
            };
            if defect_roll < DEFECTION_RATE * pressure * (1.0 + peer_rate) {
                propensity -= DEFECTION_SHOCK;
            }
            agent.compliance_propensity = propensity.clamp(0.0, 1.0);

            agent.wealth += SAVINGS_RATE * disposable;
            if effect.flight_probability > 0.0
                && flight_roll < effect.flight_probability * (1.0 - agent.risk_tolerance)
            {
                let outflow = effect.flight_amount.min(agent.wealth);
                agent.wealth -= outflow;
                flight += outflow;
            }
            agent.wealth = agent.wealth.max(0.0);
        }

        if flight > 0.0 {
            log::debug!("population: capital flight moved {flight:.0} out this step ({} stream)", rng.name);
        }
        self.capital_flight_total += flight;
    }

    pub fn wealth_gini(&self) -> f64 {
        gini(&self.agents.iter().map(|a| a.wealth).collect::<Vec<_>>())
    }

    /// Fraction of agents at or above the compliance threshold.
    pub fn compliance_rate(&self) -> f64 {
        if self.agents.is_empty() {
            return 0.0;
        }
        self.agents.iter().filter(|a| a.is_compliant()).count() as f64 / self.agents.len() as f64
    }

    pub fn avg_stress(&self) -> f64 {
        if self.agents.is_empty() {
            return 0.0;
        }
        self.agents.iter().map(|a| a.stress).sum::<f64>() / self.agents.len() as f64
    }

    pub fn check_invariants(&self, step: Step) -> SimResult<()> {
        for a in &self.agents {
            let ok = (0.0..=1.0).contains(&a.stress)
                && (0.0..=1.0).contains(&a.compliance_propensity)
                && a.wealth.is_finite()
                && a.wealth >= 0.0;
            if !ok {
                return Err(SimError::InvariantViolation {
                    step,
                    detail: format!(
                        "agent {}: stress={} propensity={} wealth={}",
                        a.id, a.stress, a.compliance_propensity, a.wealth
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Weighted roll favouring neighborhoods whose affluence matches the rank.
fn pick_neighborhood(rank: f64, neighborhoods: &[Neighborhood], rng: &mut StreamRng) -> NeighborhoodId {
    let weights: Vec<f64> = neighborhoods
        .iter()
        .map(|nb| {
            let d = (rank - nb.affluence) / AFFLUENCE_SPREAD;
            (-0.5 * d * d).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    let roll = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (k, w) in weights.iter().enumerate() {
        cumulative += w;
        if roll < cumulative {
            return k;
        }
    }
    neighborhoods.len() - 1
}

fn wire_peers(agents: &mut [Agent], peers_min: usize, peers_max: usize, rng: &mut StreamRng) {
    let n = agents.len();
    if peers_max == 0 || n < 2 {
        return;
    }
    let span = (peers_max - peers_min + 1) as u64;
    for id in 0..n {
        let want = (peers_min + rng.next_u64_below(span) as usize).min(n - 1);
        let mut peers = Vec::with_capacity(want);
        while peers.len() < want {
            let candidate = rng.next_u64_below(n as u64) as usize;
            if candidate != id && !peers.contains(&candidate) {
                peers.push(candidate);
            }
        }
        agents[id].peers = peers;
    }
}
