//! Population initialization and Gini properties.

use polisee_core::{
    config::SimConfig,
    market::NeighborhoodMarket,
    population::{gini, AgentPopulation},
    rng::RngBank,
};
use proptest::prelude::*;

fn population(seed: u64) -> (AgentPopulation, NeighborhoodMarket) {
    let config = SimConfig::default();
    let market = NeighborhoodMarket::new(&config.neighborhoods);
    let pop = AgentPopulation::initialize(&config.population, market.neighborhoods(), &RngBank::new(seed))
        .expect("initialize population");
    (pop, market)
}

#[test]
fn initial_population_has_configured_size() {
    let (pop, _) = population(42);
    assert_eq!(pop.len(), 1000, "Expected 1000 agents, got {}", pop.len());
    for (i, agent) in pop.agents().iter().enumerate() {
        assert_eq!(agent.id, i);
    }
}

#[test]
fn incomes_are_unequal_from_the_start() {
    let (pop, _) = population(42);
    let g = gini(&pop.agents().iter().map(|a| a.income).collect::<Vec<_>>());
    assert!(g > 0.2 && g < 0.7, "log-normal incomes should give a moderate Gini, got {g}");
}

#[test]
fn neighborhoods_differ_in_composition() {
    let (pop, market) = population(42);
    let mean_income = |k: usize| {
        let incomes: Vec<f64> = pop
            .agents()
            .iter()
            .filter(|a| a.neighborhood_id == k)
            .map(|a| a.income)
            .collect();
        assert!(!incomes.is_empty(), "{} has no residents", market.neighborhoods()[k].name);
        incomes.iter().sum::<f64>() / incomes.len() as f64
    };
    let poorest = mean_income(0);
    let richest = mean_income(market.len() - 1);
    assert!(
        richest > poorest * 1.5,
        "Harbor Heights should be markedly richer than Old Town: {richest} vs {poorest}"
    );
}

#[test]
fn peers_are_distinct_other_agents() {
    let (pop, _) = population(7);
    for agent in pop.agents() {
        assert!((2..=5).contains(&agent.peers.len()), "agent {} has {} peers", agent.id, agent.peers.len());
        assert!(!agent.peers.contains(&agent.id));
        let mut sorted = agent.peers.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), agent.peers.len(), "agent {} has duplicate peers", agent.id);
    }
}

#[test]
fn initial_state_is_in_bounds() {
    let (pop, _) = population(9);
    for a in pop.agents() {
        assert!(a.income > 0.0 && a.wealth > 0.0);
        assert!((0.0..=1.0).contains(&a.stress));
        assert!((0.0..=1.0).contains(&a.compliance_propensity));
        assert!((0.0..1.0).contains(&a.risk_tolerance));
    }
    let rate = pop.compliance_rate();
    assert!(rate > 0.3 && rate <= 1.0, "most agents start compliant, got {rate}");
    pop.check_invariants(0).expect("initial invariants");
}

#[test]
fn equal_wealth_has_zero_gini() {
    let mut config = SimConfig::default_test();
    config.population.income_log_sigma = 0.0;
    let market = NeighborhoodMarket::new(&config.neighborhoods);
    let pop = AgentPopulation::initialize(&config.population, market.neighborhoods(), &RngBank::new(1)).unwrap();
    assert_eq!(pop.wealth_gini(), 0.0);
}

proptest! {
    #[test]
    fn gini_stays_in_unit_interval(values in prop::collection::vec(0.0_f64..1e6, 0..200)) {
        let g = gini(&values);
        prop_assert!((0.0..=1.0).contains(&g));
    }

    #[test]
    fn gini_is_scale_invariant(
        values in prop::collection::vec(0.0_f64..1e4, 1..100),
        scale in 0.01_f64..100.0,
    ) {
        let scaled: Vec<f64> = values.iter().map(|v| v * scale).collect();
        prop_assert!((gini(&values) - gini(&scaled)).abs() < 1e-9);
    }

    #[test]
    fn gini_of_constant_values_is_zero(value in 0.0_f64..1e6, n in 1_usize..50) {
        prop_assert_eq!(gini(&vec![value; n]), 0.0);
    }
}
