//! Neighborhood markets: per-neighborhood price and supply evolution.
//!
//! Each neighborhood tracks two prices. The clearing price is what
//! demand pressure alone would set; the posted price is what buyers
//! actually pay once the policy's markup and cap are applied. Supply
//! chases a profitability target driven by the producer's price.

use crate::{
    config::NeighborhoodConfig,
    error::{SimError, SimResult},
    policy::MarketDistortion,
    snapshot::NeighborhoodSnapshot,
    types::{NeighborhoodId, Step},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PRICE_FLOOR: f64 = 0.5;
pub const PRICE_CEILING: f64 = 1000.0;
/// Base responsiveness of price to excess demand.
pub const PRICE_ADJUSTMENT: f64 = 0.4;
/// Largest fractional move of the clearing price in one step.
pub const MAX_PRICE_CHANGE: f64 = 0.25;
/// Fraction of the gap to target supply closed each step.
pub const SUPPLY_ADJUSTMENT: f64 = 0.2;
/// A binding cap never shrinks supply below this share of its target.
pub const MIN_CAP_SUPPLY_FACTOR: f64 = 0.1;
pub const MIN_SUPPLY_SHARE: f64 = 0.05;
pub const MAX_SUPPLY_SHARE: f64 = 3.0;
/// Shadow-market trades never clear above this multiple of break-even.
pub const SHADOW_PRICE_MULTIPLE: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Neighborhood {
    pub id: NeighborhoodId,
    pub name: String,
    /// Posted price.
    pub price: f64,
    pub clearing_price: f64,
    pub supply: f64,
    pub base_supply: f64,
    pub reference_price: f64,
    pub demand_elasticity: f64,
    pub landlord_responsiveness: f64,
    pub pass_through: f64,
    pub supply_responsiveness: f64,
    pub affluence: f64,
    pub cap_binding: bool,
    /// Tax wedge between posted and clearing price.
    pub tax_per_unit: f64,
}

impl Neighborhood {
    fn from_config(id: NeighborhoodId, cfg: &NeighborhoodConfig) -> Self {
        Self {
            id,
            name: cfg.name.clone(),
            price: cfg.reference_price,
            clearing_price: cfg.reference_price,
            supply: 0.0,
            base_supply: 0.0,
            reference_price: cfg.reference_price,
            demand_elasticity: cfg.demand_elasticity,
            landlord_responsiveness: cfg.landlord_responsiveness,
            pass_through: cfg.pass_through,
            supply_responsiveness: cfg.supply_responsiveness,
            affluence: cfg.affluence,
            cap_binding: false,
            tax_per_unit: 0.0,
        }
    }

    /// Fractional gap between clearing and posted price while a cap binds.
    pub fn cap_gap(&self) -> f64 {
        if self.cap_binding && self.clearing_price > 0.0 {
            ((self.clearing_price - self.price) / self.clearing_price).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn update(&mut self, demand: f64, distortion: &MarketDistortion) {
        // 1. Demand signal moves the clearing price. Inelastic markets move more.
        let signal = if self.supply > 0.0 {
            ((demand - self.supply) / self.supply).clamp(-1.0, 2.0)
        } else {
            2.0
        };
        let speed = PRICE_ADJUSTMENT / (0.5 + self.demand_elasticity);
        let change = (speed * signal).clamp(-MAX_PRICE_CHANGE, MAX_PRICE_CHANGE);
        self.clearing_price = (self.clearing_price * (1.0 + change) + distortion.price_push)
            .clamp(PRICE_FLOOR, PRICE_CEILING);
        if self.clearing_price >= PRICE_CEILING {
            log::warn!("market: {} clearing price pinned at {PRICE_CEILING}", self.name);
        }

        // 2. Policy markup and cap give the posted price.
        let marked_up = (self.clearing_price * distortion.markup).clamp(PRICE_FLOOR, PRICE_CEILING);
        self.cap_binding = false;
        self.price = marked_up;
        if let Some(cap) = distortion.price_cap {
            if marked_up > cap {
                self.price = cap;
                self.cap_binding = true;
            }
        }
        self.tax_per_unit = if distortion.markup > 1.0 && !self.cap_binding {
            (self.price - self.clearing_price).max(0.0)
        } else {
            0.0
        };

        // 3. Supply chases what producers actually receive.
        let producer_price = self.price - self.tax_per_unit;
        let mut target = self.base_supply
            * (producer_price / self.reference_price).powf(self.supply_responsiveness);
        if self.cap_binding {
            target *= (1.0 - self.cap_gap() * distortion.supply_sensitivity).max(MIN_CAP_SUPPLY_FACTOR);
        }
        let target = target.clamp(
            self.base_supply * MIN_SUPPLY_SHARE,
            self.base_supply * MAX_SUPPLY_SHARE,
        );
        self.supply = (self.supply + SUPPLY_ADJUSTMENT * (target - self.supply)).max(0.0);
    }
}

/// What agents in one neighborhood face after the market update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketConditions {
    pub price: f64,
    pub shadow_price: f64,
    pub reference_price: f64,
    pub demand_elasticity: f64,
    /// Share of desired units the legal market can serve, in [0, 1].
    pub fill_ratio: f64,
    pub cap_gap: f64,
    pub tax_revenue: f64,
}

impl MarketConditions {
    /// Shortage pressure from a binding cap, in [0, 1].
    pub fn defection_pressure(&self) -> f64 {
        ((1.0 - self.fill_ratio) * self.cap_gap).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodMarket {
    neighborhoods: Vec<Neighborhood>,
}

impl NeighborhoodMarket {
    pub fn new(configs: &[NeighborhoodConfig]) -> Self {
        Self {
            neighborhoods: configs
                .iter()
                .enumerate()
                .map(|(id, cfg)| Neighborhood::from_config(id, cfg))
                .collect(),
        }
    }

    /// Set supply to the demand each neighborhood sees at its
    /// reference price, so the run starts at equilibrium.
    pub fn calibrate(&mut self, demand: &[f64]) {
        for (nb, d) in self.neighborhoods.iter_mut().zip(demand) {
            nb.base_supply = d.max(1.0);
            nb.supply = nb.base_supply;
        }
    }

    pub fn neighborhoods(&self) -> &[Neighborhood] {
        &self.neighborhoods
    }

    pub fn len(&self) -> usize {
        self.neighborhoods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighborhoods.is_empty()
    }

    /// Apply one step of demand pressure and policy distortion.
    pub fn update(&mut self, demand: &[f64], distortions: &[MarketDistortion]) {
        for ((nb, d), distortion) in self.neighborhoods.iter_mut().zip(demand).zip(distortions) {
            nb.update(*d, distortion);
        }
    }

    /// Conditions agents trade under, given demand at the posted prices.
    pub fn conditions(&self, demand: &[f64]) -> Vec<MarketConditions> {
        self.neighborhoods
            .iter()
            .zip(demand)
            .map(|(nb, d)| {
                let fill_ratio = if *d > 0.0 { (nb.supply / d).min(1.0) } else { 1.0 };
                let sold = d.min(nb.supply);
                MarketConditions {
                    price: nb.price,
                    shadow_price: nb
                        .clearing_price
                        .max(nb.price)
                        .min(nb.reference_price * SHADOW_PRICE_MULTIPLE),
                    reference_price: nb.reference_price,
                    demand_elasticity: nb.demand_elasticity,
                    fill_ratio,
                    cap_gap: nb.cap_gap(),
                    tax_revenue: nb.tax_per_unit * sold,
                }
            })
            .collect()
    }

    pub fn avg_price(&self) -> f64 {
        if self.neighborhoods.is_empty() {
            return 0.0;
        }
        self.neighborhoods.iter().map(|n| n.price).sum::<f64>() / self.neighborhoods.len() as f64
    }

    pub fn snapshot(&self) -> BTreeMap<String, NeighborhoodSnapshot> {
        self.neighborhoods
            .iter()
            .map(|n| {
                (
                    n.name.clone(),
                    NeighborhoodSnapshot {
                        price: n.price,
                        supply: n.supply,
                    },
                )
            })
            .collect()
    }

    pub fn check_invariants(&self, step: Step) -> SimResult<()> {
        for nb in &self.neighborhoods {
            if !(nb.price.is_finite() && nb.price >= 0.0) {
                return Err(SimError::InvariantViolation {
                    step,
                    detail: format!("{}: price {}", nb.name, nb.price),
                });
            }
            if !(nb.supply.is_finite() && nb.supply >= 0.0) {
                return Err(SimError::InvariantViolation {
                    step,
                    detail: format!("{}: supply {}", nb.name, nb.supply),
                });
            }
        }
        Ok(())
    }
}
