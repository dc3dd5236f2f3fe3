//! Configuration loading and validation.

use polisee_core::config::SimConfig;

fn data_dir() -> String {
    format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn shipped_data_matches_builtin_defaults() {
    let loaded = SimConfig::load(&data_dir()).expect("load data/");
    assert_eq!(loaded, SimConfig::default(), "data/*.json drifted from SimConfig::default()");
}

#[test]
fn config_survives_json_round_trip() {
    let config = SimConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: SimConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);
}

#[test]
fn missing_directory_is_an_error() {
    assert!(SimConfig::load("/nonexistent/polisee-data").is_err());
}

#[test]
fn validation_rejects_bad_tables() {
    let mut dup = SimConfig::default();
    dup.neighborhoods[1].name = dup.neighborhoods[0].name.clone();
    assert!(dup.validate().is_err(), "duplicate names must be rejected");

    let mut price = SimConfig::default();
    price.neighborhoods[2].reference_price = 0.0;
    assert!(price.validate().is_err());

    let mut peers = SimConfig::default_test();
    peers.population.peers_min = 6;
    assert!(peers.validate().is_err());

    assert!(SimConfig::default().validate().is_ok());
}
