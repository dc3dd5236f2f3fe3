//! Run configuration: population distribution and the neighborhood table.
//!
//! Config is read-only once a run starts. The engine takes its own
//! clone, so a loaded config can be shared across concurrent runs.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Agents per run.
pub const AGENT_COUNT: usize = 1000;

/// Neighborhoods per run.
pub const NEIGHBORHOOD_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationConfig {
    pub agent_count: usize,
    /// Mean of ln(income).
    pub income_log_mean: f64,
    /// Std-dev of ln(income). Zero gives a perfectly equal population.
    pub income_log_sigma: f64,
    /// Initial wealth as a multiple of monthly income.
    pub wealth_multiple: f64,
    /// Consumption units every agent needs regardless of income.
    pub consumption_base_units: f64,
    /// Extra consumption units per unit of income.
    pub consumption_income_share: f64,
    pub base_propensity_min: f64,
    pub base_propensity_max: f64,
    pub peers_min: usize,
    pub peers_max: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            agent_count: AGENT_COUNT,
            income_log_mean: 7.0,
            income_log_sigma: 0.8,
            wealth_multiple: 1.0,
            consumption_base_units: 40.0,
            consumption_income_share: 0.02,
            base_propensity_min: 0.55,
            base_propensity_max: 0.95,
            peers_min: 2,
            peers_max: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeighborhoodConfig {
    pub name: String,
    /// Suppliers' break-even price; also the starting price.
    pub reference_price: f64,
    pub demand_elasticity: f64,
    /// How strongly landlords absorb rent transfers into prices.
    pub landlord_responsiveness: f64,
    /// Share of an excise sellers pass on to buyers.
    pub pass_through: f64,
    /// Exponent of the supply response to producer price.
    pub supply_responsiveness: f64,
    /// Income rank (0 = poorest, 1 = richest) this neighborhood attracts.
    pub affluence: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct NeighborhoodsFile {
    neighborhoods: Vec<NeighborhoodConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    pub population: PopulationConfig,
    pub neighborhoods: Vec<NeighborhoodConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            neighborhoods: default_neighborhoods(),
        }
    }
}

impl SimConfig {
    /// Load from the data/ directory.
    /// In tests, use SimConfig::default() or SimConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let pop_path = format!("{data_dir}/population.json");
        let pop_content = std::fs::read_to_string(&pop_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {pop_path}: {e}"))?;
        let population: PopulationConfig = serde_json::from_str(&pop_content)?;

        let nb_path = format!("{data_dir}/neighborhoods.json");
        let nb_content = std::fs::read_to_string(&nb_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {nb_path}: {e}"))?;
        let nb_file: NeighborhoodsFile = serde_json::from_str(&nb_content)?;

        let config = Self {
            population,
            neighborhoods: nb_file.neighborhoods,
        };
        config.validate()?;
        log::info!(
            "config: loaded {} agents, {} neighborhoods from {data_dir}",
            config.population.agent_count,
            config.neighborhoods.len()
        );
        Ok(config)
    }

    /// Config with a smaller population for fast unit tests.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.population.agent_count = 200;
        config
    }

    /// Reject configs the engine cannot run. Called before any state is built.
    pub fn validate(&self) -> SimResult<()> {
        let p = &self.population;
        if p.agent_count == 0 {
            return Err(SimError::InvalidConfig("agent_count must be > 0".into()));
        }
        if !(p.income_log_sigma >= 0.0) || !p.income_log_mean.is_finite() {
            return Err(SimError::InvalidConfig(format!(
                "income distribution ln N({}, {}) is not valid",
                p.income_log_mean, p.income_log_sigma
            )));
        }
        for (name, value) in [
            ("wealth_multiple", p.wealth_multiple),
            ("consumption_base_units", p.consumption_base_units),
            ("consumption_income_share", p.consumption_income_share),
        ] {
            if !(value >= 0.0) {
                return Err(SimError::InvalidConfig(format!("{name} must be >= 0")));
            }
        }
        if !(0.0..=1.0).contains(&p.base_propensity_min)
            || !(0.0..=1.0).contains(&p.base_propensity_max)
            || p.base_propensity_min > p.base_propensity_max
        {
            return Err(SimError::InvalidConfig(
                "base propensity range must lie within [0, 1]".into(),
            ));
        }
        if p.peers_min > p.peers_max || (p.peers_max > 0 && p.peers_max >= p.agent_count) {
            return Err(SimError::InvalidConfig(format!(
                "peer range {}..={} invalid for {} agents",
                p.peers_min, p.peers_max, p.agent_count
            )));
        }

        if self.neighborhoods.len() != NEIGHBORHOOD_COUNT {
            return Err(SimError::InvalidConfig(format!(
                "expected {NEIGHBORHOOD_COUNT} neighborhoods, got {}",
                self.neighborhoods.len()
            )));
        }
        for nb in &self.neighborhoods {
            if !(nb.reference_price > 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "{}: reference_price must be > 0",
                    nb.name
                )));
            }
            if !(0.0..=2.0).contains(&nb.demand_elasticity)
                || !(0.0..=2.0).contains(&nb.supply_responsiveness)
                || !(0.0..=1.0).contains(&nb.landlord_responsiveness)
                || !(0.0..=1.0).contains(&nb.pass_through)
                || !(0.0..=1.0).contains(&nb.affluence)
            {
                return Err(SimError::InvalidConfig(format!(
                    "{}: coefficient out of range",
                    nb.name
                )));
            }
        }
        let mut names: Vec<&str> = self.neighborhoods.iter().map(|n| n.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.neighborhoods.len() {
            return Err(SimError::InvalidConfig("neighborhood names must be unique".into()));
        }
        Ok(())
    }
}

fn default_neighborhoods() -> Vec<NeighborhoodConfig> {
    let row = |name: &str, price: f64, elasticity: f64, landlord: f64, pass: f64, supply: f64, affluence: f64| {
        NeighborhoodConfig {
            name: name.into(),
            reference_price: price,
            demand_elasticity: elasticity,
            landlord_responsiveness: landlord,
            pass_through: pass,
            supply_responsiveness: supply,
            affluence,
        }
    };
    vec![
        row("Old Town", 8.0, 0.6, 0.5, 0.9, 0.8, 0.15),
        row("Riverside", 9.0, 0.5, 0.4, 0.8, 1.0, 0.35),
        row("Midtown", 10.0, 0.45, 0.6, 0.7, 0.9, 0.5),
        row("Northgate", 12.0, 0.4, 0.7, 0.6, 0.7, 0.7),
        row("Harbor Heights", 15.0, 0.3, 0.8, 0.5, 0.6, 0.9),
    ]
}
