//! The simulation engine: drives a policy run step by step.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Market: policy distortion applied, price and supply recomputed
//!   2. Agents: income, stress and compliance updated against new prices
//!   3. Aggregates computed and the step's point appended
//!   4. Step index advances
//!
//! RULES:
//!   - Every run owns its population, market and RNG streams.
//!   - Agents in step 2 see only prices produced in step 1.
//!   - All randomness flows through the RngBank.
//!   - Points reflect post-update state, never pre-update.

use crate::{
    clock::SimClock,
    config::SimConfig,
    error::{SimError, SimResult},
    market::NeighborhoodMarket,
    policy::{EffectContext, MarketDistortion, Policy, PolicyParams},
    population::AgentPopulation,
    rng::{RngBank, StreamRng, StreamSlot},
    snapshot::{SimulationOutcome, SimulationPoint},
    types::{RunId, Step},
};

/// Longest run accepted, 100 years of monthly steps.
pub const MAX_STEPS: Step = 1200;

pub struct SimEngine {
    pub run_id:   RunId,
    pub clock:    SimClock,
    seed:         u64,
    policy:       Policy,
    market:       NeighborhoodMarket,
    population:   AgentPopulation,
    behavior_rng: StreamRng,
    history:      Vec<SimulationPoint>,
}

impl SimEngine {
    /// Build a fully initialised engine. The config is validated before
    /// any state exists; `seed = None` draws a fresh seed.
    pub fn build(policy: Policy, config: &SimConfig, seed: Option<u64>) -> SimResult<Self> {
        config.validate()?;
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let bank = RngBank::new(seed);

        let mut market = NeighborhoodMarket::new(&config.neighborhoods);
        let population = AgentPopulation::initialize(&config.population, market.neighborhoods(), &bank)?;
        market.calibrate(&population.demand_by_neighborhood(market.neighborhoods()));

        log::info!(
            "{run_id}: built policy={} seed={seed} agents={}",
            policy.kind(),
            population.len()
        );

        Ok(Self {
            run_id,
            clock: SimClock::new(),
            seed: bank.seed(),
            policy,
            market,
            population,
            behavior_rng: bank.for_stream(StreamSlot::Behavior),
            history: Vec::new(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn market(&self) -> &NeighborhoodMarket {
        &self.market
    }

    pub fn population(&self) -> &AgentPopulation {
        &self.population
    }

    pub fn history(&self) -> &[SimulationPoint] {
        &self.history
    }

    /// Advance one step. This is the core simulation step.
    pub fn step(&mut self) -> SimResult<SimulationPoint> {
        // 1. Market update, driven by demand at last step's prices.
        let demand = self.population.demand_by_neighborhood(self.market.neighborhoods());
        let contexts = self.population.distortion_contexts(&self.policy, self.market.len());
        let distortions: Vec<MarketDistortion> = self
            .market
            .neighborhoods()
            .iter()
            .zip(&contexts)
            .map(|(nb, ctx)| self.policy.market_distortion(nb, ctx))
            .collect();
        self.market.update(&demand, &distortions);

        // 2. Agent update against the new prices.
        let demand = self.population.demand_by_neighborhood(self.market.neighborhoods());
        let conditions = self.market.conditions(&demand);
        let tax_collected: f64 = conditions.iter().map(|c| c.tax_revenue).sum();
        let ctx = EffectContext {
            tax_collected_per_agent: tax_collected / self.population.len().max(1) as f64,
        };
        self.population
            .step(&conditions, &self.policy, &ctx, &mut self.behavior_rng);

        // 3. Aggregates over post-update state.
        let step = self.clock.current_step + 1;
        self.market.check_invariants(step)?;
        self.population.check_invariants(step)?;
        let point = SimulationPoint {
            step,
            avg_price: self.market.avg_price(),
            gini: self.population.wealth_gini(),
            compliance_rate: self.population.compliance_rate(),
            avg_stress: self.population.avg_stress(),
            total_demand: self
                .population
                .demand_by_neighborhood(self.market.neighborhoods())
                .iter()
                .sum(),
        };
        self.history.push(point);

        // 4. Step index advances.
        self.clock.advance();

        log::debug!(
            "step={step} avg_price={:.3} gini={:.3} compliance={:.3} stress={:.3}",
            point.avg_price,
            point.gini,
            point.compliance_rate,
            point.avg_stress
        );
        Ok(point)
    }

    /// Run `steps` further steps and return the outcome so far.
    pub fn run(&mut self, steps: Step) -> SimResult<SimulationOutcome> {
        check_steps(steps)?;
        for _ in 0..steps {
            self.step()?;
        }
        let outcome = self.outcome();
        if let Some(last) = outcome.last_point() {
            log::info!(
                "{}: finished {} steps, avg_price={:.3} compliance={:.3}",
                self.run_id,
                outcome.history.len(),
                last.avg_price,
                last.compliance_rate
            );
        }
        Ok(outcome)
    }

    pub fn outcome(&self) -> SimulationOutcome {
        SimulationOutcome {
            run_id: self.run_id.clone(),
            seed: self.seed,
            policy: self.policy.clone(),
            history: self.history.clone(),
            neighborhoods: self.market.snapshot(),
            capital_flight_total: self.population.capital_flight_total,
        }
    }
}

fn check_steps(steps: Step) -> SimResult<()> {
    if steps > MAX_STEPS {
        return Err(SimError::ParameterOutOfRange {
            name: "steps".into(),
            value: steps as f64,
            min: 0.0,
            max: MAX_STEPS as f64,
        });
    }
    Ok(())
}

/// Validate and run a policy under the built-in configuration.
pub fn run(policy_type: &str, params: &PolicyParams, steps: Step, seed: Option<u64>) -> SimResult<SimulationOutcome> {
    run_with_config(policy_type, params, steps, seed, &SimConfig::default())
}

/// Validate and run a policy. Fails before any state is built when the
/// policy, its parameters, the step count or the config are invalid.
pub fn run_with_config(
    policy_type: &str,
    params: &PolicyParams,
    steps: Step,
    seed: Option<u64>,
    config: &SimConfig,
) -> SimResult<SimulationOutcome> {
    let policy = Policy::parse(policy_type, params)?;
    check_steps(steps)?;
    SimEngine::build(policy, config, seed)?.run(steps)
}
