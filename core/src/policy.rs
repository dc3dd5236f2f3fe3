//! Policy variants.
//!
//! The set is closed: each variant carries its validated parameters and
//! two pure functions, `agent_effect` (transfers and taxes for one agent)
//! and `market_distortion` (how the variant bends one neighborhood's
//! price formation). New policies are added as new variants.

use crate::{
    error::{SimError, SimResult},
    market::Neighborhood,
    population::Agent,
    types::STEPS_PER_YEAR,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Share of taxable excess wealth that moves out on capital flight.
pub const FLIGHT_SHARE: f64 = 0.3;

/// Raw parameters as they arrive on the wire.
pub type PolicyParams = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[serde(rename = "none")]
    NoIntervention,
    HousingRentSubsidy,
    FuelTaxRebate,
    FoodPriceCeiling,
    LuxuryAssetTax,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 5] = [
        Self::NoIntervention,
        Self::HousingRentSubsidy,
        Self::FuelTaxRebate,
        Self::FoodPriceCeiling,
        Self::LuxuryAssetTax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoIntervention => "none",
            Self::HousingRentSubsidy => "housing_rent_subsidy",
            Self::FuelTaxRebate => "fuel_tax_rebate",
            Self::FoodPriceCeiling => "food_price_ceiling",
            Self::LuxuryAssetTax => "luxury_asset_tax",
        }
    }

    /// Parameter schema for this variant.
    pub fn schema(&self) -> &'static [ParamSpec] {
        match self {
            Self::NoIntervention => &[],
            Self::HousingRentSubsidy => HOUSING_SCHEMA,
            Self::FuelTaxRebate => FUEL_SCHEMA,
            Self::FoodPriceCeiling => FOOD_SCHEMA,
            Self::LuxuryAssetTax => LUXURY_SCHEMA,
        }
    }
}

impl FromStr for PolicyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SimError::UnknownPolicy(s.to_string()))
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a variant's parameter schema.
/// `default: None` marks the parameter as required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub description: &'static str,
}

const HOUSING_SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "subsidy_amount",
        default: None,
        min: 0.0,
        max: 1000.0,
        description: "Monthly cash to eligible renters",
    },
    ParamSpec {
        name: "eligibility_threshold",
        default: Some(1000.0),
        min: 0.0,
        max: 5000.0,
        description: "Maximum income to qualify",
    },
    ParamSpec {
        name: "landlord_capture_rate",
        default: Some(0.5),
        min: 0.0,
        max: 1.0,
        description: "Share of the subsidy landlords absorb through rent",
    },
];

const FUEL_SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "tax_rate",
        default: None,
        min: 0.0,
        max: 1.0,
        description: "Excise rate on fuel purchases",
    },
    ParamSpec {
        name: "rebate_percent",
        default: Some(0.9),
        min: 0.0,
        max: 1.0,
        description: "Fraction of collected tax returned per capita",
    },
];

const FOOD_SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "price_cap",
        default: None,
        min: 0.5,
        max: 1000.0,
        description: "Maximum allowed price for a food unit",
    },
    ParamSpec {
        name: "supply_sensitivity",
        default: Some(1.5),
        min: 0.0,
        max: 5.0,
        description: "How quickly supply retreats from a binding cap",
    },
];

const LUXURY_SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        name: "tax_rate",
        default: None,
        min: 0.0,
        max: 1.0,
        description: "Annual tax on wealth above the threshold",
    },
    ParamSpec {
        name: "wealth_threshold",
        default: Some(2000.0),
        min: 0.0,
        max: 1_000_000.0,
        description: "Minimum wealth that triggers the tax",
    },
];

/// A validated policy ready to drive a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy_type", rename_all = "snake_case")]
pub enum Policy {
    #[serde(rename = "none")]
    NoIntervention,
    HousingRentSubsidy {
        subsidy_amount: f64,
        eligibility_threshold: f64,
        landlord_capture_rate: f64,
    },
    FuelTaxRebate {
        tax_rate: f64,
        rebate_percent: f64,
    },
    FoodPriceCeiling {
        price_cap: f64,
        supply_sensitivity: f64,
    },
    LuxuryAssetTax {
        tax_rate: f64,
        wealth_threshold: f64,
    },
}

/// Money flows a policy applies to a single agent this step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgentEffect {
    pub subsidy: f64,
    pub tax: f64,
    /// Probability of capital flight before the agent's own tolerance applies.
    pub flight_probability: f64,
    /// Wealth that leaves the economy if flight happens.
    pub flight_amount: f64,
}

/// Run-wide quantities agent effects may depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectContext {
    /// Tax collected this step divided by the number of agents.
    pub tax_collected_per_agent: f64,
}

/// Per-neighborhood quantities the distortion may depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistortionContext {
    /// Share of residents receiving the policy's transfer.
    pub eligible_share: f64,
    /// Mean baseline consumption of residents.
    pub units_per_agent: f64,
}

/// How a policy bends price formation in one neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketDistortion {
    /// Added to the clearing price every step.
    pub price_push: f64,
    /// Posted price = clearing price x markup.
    pub markup: f64,
    /// Hard ceiling on the posted price.
    pub price_cap: Option<f64>,
    /// Supply withdrawal per unit of cap gap.
    pub supply_sensitivity: f64,
}

impl MarketDistortion {
    pub const NEUTRAL: Self = Self {
        price_push: 0.0,
        markup: 1.0,
        price_cap: None,
        supply_sensitivity: 0.0,
    };
}

impl Policy {
    /// Parse and validate a policy from its wire form. Fails before
    /// anything is simulated.
    pub fn parse(policy_type: &str, params: &PolicyParams) -> SimResult<Self> {
        let kind: PolicyKind = policy_type.parse()?;
        Self::from_params(kind, params)
    }

    pub fn from_params(kind: PolicyKind, params: &PolicyParams) -> SimResult<Self> {
        let schema = kind.schema();
        let policy = kind.as_str();

        if let Some(name) = params.keys().find(|k| !schema.iter().any(|s| s.name == k.as_str())) {
            return Err(SimError::UnknownParameter {
                policy,
                name: name.clone(),
            });
        }

        let value = |name: &'static str| -> SimResult<f64> {
            let spec = schema
                .iter()
                .find(|s| s.name == name)
                .ok_or(SimError::MissingParameter { policy, name })?;
            let v = match (params.get(name), spec.default) {
                (Some(v), _) => *v,
                (None, Some(d)) => d,
                (None, None) => return Err(SimError::MissingParameter { policy, name }),
            };
            if !(spec.min..=spec.max).contains(&v) {
                return Err(SimError::ParameterOutOfRange {
                    name: name.to_string(),
                    value: v,
                    min: spec.min,
                    max: spec.max,
                });
            }
            Ok(v)
        };

        Ok(match kind {
            PolicyKind::NoIntervention => Self::NoIntervention,
            PolicyKind::HousingRentSubsidy => Self::HousingRentSubsidy {
                subsidy_amount: value("subsidy_amount")?,
                eligibility_threshold: value("eligibility_threshold")?,
                landlord_capture_rate: value("landlord_capture_rate")?,
            },
            PolicyKind::FuelTaxRebate => Self::FuelTaxRebate {
                tax_rate: value("tax_rate")?,
                rebate_percent: value("rebate_percent")?,
            },
            PolicyKind::FoodPriceCeiling => Self::FoodPriceCeiling {
                price_cap: value("price_cap")?,
                supply_sensitivity: value("supply_sensitivity")?,
            },
            PolicyKind::LuxuryAssetTax => Self::LuxuryAssetTax {
                tax_rate: value("tax_rate")?,
                wealth_threshold: value("wealth_threshold")?,
            },
        })
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::NoIntervention => PolicyKind::NoIntervention,
            Self::HousingRentSubsidy { .. } => PolicyKind::HousingRentSubsidy,
            Self::FuelTaxRebate { .. } => PolicyKind::FuelTaxRebate,
            Self::FoodPriceCeiling { .. } => PolicyKind::FoodPriceCeiling,
            Self::LuxuryAssetTax { .. } => PolicyKind::LuxuryAssetTax,
        }
    }

    /// Whether the agent receives this policy's direct transfer.
    pub fn is_eligible(&self, agent: &Agent) -> bool {
        match self {
            Self::HousingRentSubsidy {
                eligibility_threshold,
                ..
            } => agent.income < *eligibility_threshold,
            Self::FuelTaxRebate { .. } => true,
            _ => false,
        }
    }

    pub fn agent_effect(&self, agent: &Agent, ctx: &EffectContext) -> AgentEffect {
        match self {
            Self::NoIntervention | Self::FoodPriceCeiling { .. } => AgentEffect::default(),
            Self::HousingRentSubsidy { subsidy_amount, .. } => AgentEffect {
                subsidy: if self.is_eligible(agent) { *subsidy_amount } else { 0.0 },
                ..AgentEffect::default()
            },
            Self::FuelTaxRebate { rebate_percent, .. } => AgentEffect {
                subsidy: rebate_percent * ctx.tax_collected_per_agent,
                ..AgentEffect::default()
            },
            Self::LuxuryAssetTax {
                tax_rate,
                wealth_threshold,
            } => {
                let excess = (agent.wealth - wealth_threshold).max(0.0);
                if excess == 0.0 {
                    return AgentEffect::default();
                }
                // Exposure is measured per 1000 over the threshold.
                let exposure = excess / 1000.0;
                AgentEffect {
                    subsidy: 0.0,
                    tax: excess * tax_rate / STEPS_PER_YEAR,
                    flight_probability: (exposure * tax_rate * 20.0).min(0.9),
                    flight_amount: excess * FLIGHT_SHARE,
                }
            }
        }
    }

    pub fn market_distortion(&self, nb: &Neighborhood, ctx: &DistortionContext) -> MarketDistortion {
        match self {
            Self::NoIntervention | Self::LuxuryAssetTax { .. } => MarketDistortion::NEUTRAL,
            Self::HousingRentSubsidy {
                subsidy_amount,
                landlord_capture_rate,
                ..
            } => {
                let captured = landlord_capture_rate
                    * nb.landlord_responsiveness
                    * subsidy_amount
                    * ctx.eligible_share;
                MarketDistortion {
                    price_push: if ctx.units_per_agent > 0.0 {
                        captured / ctx.units_per_agent
                    } else {
                        0.0
                    },
                    ..MarketDistortion::NEUTRAL
                }
            }
            Self::FuelTaxRebate { tax_rate, .. } => MarketDistortion {
                markup: 1.0 + tax_rate * nb.pass_through,
                ..MarketDistortion::NEUTRAL
            },
            Self::FoodPriceCeiling {
                price_cap,
                supply_sensitivity,
            } => MarketDistortion {
                price_cap: Some(*price_cap),
                supply_sensitivity: *supply_sensitivity,
                ..MarketDistortion::NEUTRAL
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, f64)]) -> PolicyParams {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in PolicyKind::ALL {
            assert_eq!(kind.as_str().parse::<PolicyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn defaults_fill_optional_parameters() {
        let policy = Policy::parse("housing_rent_subsidy", &params(&[("subsidy_amount", 200.0)])).unwrap();
        assert_eq!(
            policy,
            Policy::HousingRentSubsidy {
                subsidy_amount: 200.0,
                eligibility_threshold: 1000.0,
                landlord_capture_rate: 0.5,
            }
        );
    }

    #[test]
    fn nan_is_out_of_range() {
        let err = Policy::parse("food_price_ceiling", &params(&[("price_cap", f64::NAN)])).unwrap_err();
        assert!(matches!(err, SimError::ParameterOutOfRange { .. }));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = Policy::parse("fuel_tax_rebate", &params(&[("tax_rate", 0.1), ("tax", 0.2)])).unwrap_err();
        assert!(matches!(err, SimError::UnknownParameter { .. }));
        let err = Policy::parse("fuel_tax_rebate", &params(&[])).unwrap_err();
        assert!(matches!(err, SimError::MissingParameter { name: "tax_rate", .. }));
    }

    fn agent(income: f64, wealth: f64) -> Agent {
        Agent {
            id: 0,
            income,
            wealth,
            neighborhood_id: 0,
            stress: 0.0,
            compliance_propensity: 0.8,
            baseline_consumption: 60.0,
            base_propensity: 0.8,
            risk_tolerance: 0.5,
            need_factor: 1.0,
            peers: vec![],
        }
    }

    #[test]
    fn housing_subsidy_stops_at_the_threshold() {
        let policy = Policy::parse(
            "housing_rent_subsidy",
            &params(&[("subsidy_amount", 300.0), ("eligibility_threshold", 1000.0)]),
        )
        .unwrap();
        let ctx = EffectContext::default();
        assert_eq!(policy.agent_effect(&agent(999.0, 500.0), &ctx).subsidy, 300.0);
        assert_eq!(policy.agent_effect(&agent(1000.0, 500.0), &ctx), AgentEffect::default());
        assert_eq!(policy.agent_effect(&agent(4000.0, 500.0), &ctx), AgentEffect::default());
        assert!(!policy.is_eligible(&agent(1000.0, 500.0)));
    }

    #[test]
    fn fuel_markup_follows_pass_through() {
        let config = crate::config::SimConfig::default();
        let market = crate::market::NeighborhoodMarket::new(&config.neighborhoods);
        let policy = Policy::parse("fuel_tax_rebate", &params(&[("tax_rate", 0.5)])).unwrap();
        for nb in market.neighborhoods() {
            let d = policy.market_distortion(nb, &DistortionContext::default());
            assert!((d.markup - (1.0 + 0.5 * nb.pass_through)).abs() < 1e-12, "{}", nb.name);
        }
        let rebate = policy.agent_effect(
            &agent(800.0, 500.0),
            &EffectContext {
                tax_collected_per_agent: 20.0,
            },
        );
        assert!((rebate.subsidy - 18.0).abs() < 1e-12, "default rebate returns 90%");
    }

    #[test]
    fn luxury_tax_only_touches_excess_wealth() {
        let policy = Policy::parse("luxury_asset_tax", &params(&[("tax_rate", 0.12)])).unwrap();
        let mut holder = agent(1000.0, 1500.0);
        assert_eq!(policy.agent_effect(&holder, &EffectContext::default()), AgentEffect::default());

        holder.wealth = 3000.0;
        let effect = policy.agent_effect(&holder, &EffectContext::default());
        assert!((effect.tax - 10.0).abs() < 1e-9, "1000 excess at 12%/yr is 10 per month");
        assert!((effect.flight_amount - 300.0).abs() < 1e-9);
        assert!(effect.flight_probability > 0.0 && effect.flight_probability <= 0.9);
    }
}
