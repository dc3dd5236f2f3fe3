//! Engine contract: step ordering, history shape, edge cases.

use polisee_core::{
    config::{SimConfig, AGENT_COUNT},
    engine::{self, SimEngine, MAX_STEPS},
    error::SimError,
    policy::{Policy, PolicyKind, PolicyParams},
};

fn params(pairs: &[(&str, f64)]) -> PolicyParams {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn sample_params(kind: PolicyKind) -> PolicyParams {
    match kind {
        PolicyKind::NoIntervention => params(&[]),
        PolicyKind::HousingRentSubsidy => params(&[("subsidy_amount", 300.0)]),
        PolicyKind::FuelTaxRebate => params(&[("tax_rate", 0.3)]),
        PolicyKind::FoodPriceCeiling => params(&[("price_cap", 6.0)]),
        PolicyKind::LuxuryAssetTax => params(&[("tax_rate", 0.4)]),
    }
}

#[test]
fn history_has_one_point_per_step() {
    let outcome = engine::run("none", &params(&[]), 24, Some(1)).unwrap();
    assert_eq!(outcome.history.len(), 24);
    for (i, point) in outcome.history.iter().enumerate() {
        assert_eq!(point.step, i as u64 + 1, "Steps must be consecutive from 1");
    }
    assert_eq!(outcome.neighborhoods.len(), 5);
}

#[test]
fn default_population_has_fixed_size() {
    let engine = SimEngine::build(Policy::NoIntervention, &SimConfig::default(), Some(3)).unwrap();
    assert_eq!(engine.population().len(), AGENT_COUNT);
    assert_eq!(engine.market().len(), 5);
}

#[test]
fn zero_steps_leaves_market_at_initial_state() {
    let config = SimConfig::default_test();
    let outcome = engine::run_with_config("none", &params(&[]), 0, Some(5), &config).unwrap();
    assert!(outcome.history.is_empty());
    assert_eq!(outcome.neighborhoods.len(), 5);
    for nb in &config.neighborhoods {
        let snap = &outcome.neighborhoods[&nb.name];
        assert_eq!(snap.price, nb.reference_price, "{} should still be at its reference price", nb.name);
        assert!(snap.supply > 0.0);
    }
}

#[test]
fn unknown_policy_fails_before_running() {
    let err = engine::run("carbon_tax", &params(&[]), 12, Some(1)).unwrap_err();
    assert!(matches!(err, SimError::UnknownPolicy(ref name) if name == "carbon_tax"));
    assert!(err.is_configuration());
}

#[test]
fn bad_parameters_are_configuration_errors() {
    let cases = [
        ("food_price_ceiling", params(&[])),
        ("food_price_ceiling", params(&[("price_cap", 0.1)])),
        ("luxury_asset_tax", params(&[("tax_rate", 0.2), ("rate", 0.1)])),
    ];
    for (policy_type, p) in cases {
        let err = engine::run(policy_type, &p, 12, Some(1)).unwrap_err();
        assert!(err.is_configuration(), "{policy_type} {p:?} should be rejected, got {err}");
    }
}

#[test]
fn step_count_is_capped() {
    let err = engine::run("none", &params(&[]), MAX_STEPS + 1, Some(1)).unwrap_err();
    assert!(matches!(err, SimError::ParameterOutOfRange { ref name, .. } if name == "steps"));
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = SimConfig::default_test();
    config.population.agent_count = 0;
    let err = SimEngine::build(Policy::NoIntervention, &config, Some(1)).err().unwrap();
    assert!(matches!(err, SimError::InvalidConfig(_)));

    let mut config = SimConfig::default_test();
    config.neighborhoods.pop();
    assert!(SimEngine::build(Policy::NoIntervention, &config, Some(1)).is_err());
}

#[test]
fn aggregates_stay_in_bounds_for_every_policy() {
    let config = SimConfig::default_test();
    for kind in PolicyKind::ALL {
        let outcome =
            engine::run_with_config(kind.as_str(), &sample_params(kind), 36, Some(11), &config).unwrap();
        for p in &outcome.history {
            assert!((0.0..=1.0).contains(&p.gini), "{kind}: gini {} at step {}", p.gini, p.step);
            assert!(
                (0.0..=1.0).contains(&p.compliance_rate),
                "{kind}: compliance {} at step {}",
                p.compliance_rate,
                p.step
            );
            assert!((0.0..=1.0).contains(&p.avg_stress));
            assert!(p.avg_price >= 0.0 && p.total_demand >= 0.0);
        }
        for (name, nb) in &outcome.neighborhoods {
            assert!(nb.price >= 0.0 && nb.supply >= 0.0, "{kind}: {name} went negative");
        }
    }
}

#[test]
fn stepping_manually_matches_run() {
    let config = SimConfig::default_test();
    let mut manual = SimEngine::build(Policy::NoIntervention, &config, Some(21)).unwrap();
    for _ in 0..6 {
        manual.step().unwrap();
    }
    assert_eq!(manual.clock.current_step, 6);

    let outcome = SimEngine::build(Policy::NoIntervention, &config, Some(21))
        .unwrap()
        .run(6)
        .unwrap();
    assert_eq!(manual.history(), outcome.history.as_slice());
}
