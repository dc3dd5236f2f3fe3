//! Narrative text and recommendations.

use polisee_core::{
    analysis::{analyze, Alert, AlertKind, Analysis, Metrics, Severity, UciBand},
    config::SimConfig,
    narrative::{explain, recommendation, to_layman, LAYMAN_PHRASES, NO_ALERT_COMPLIANCE, NO_ALERT_PRICE},
    request::{simulate, SimulationRequest},
    snapshot::SimulationPoint,
};

fn point(step: u64) -> SimulationPoint {
    SimulationPoint {
        step,
        avg_price: 10.5,
        gini: 0.4,
        compliance_rate: 0.82,
        avg_stress: 0.3,
        total_demand: 900.0,
    }
}

fn alert(kind: AlertKind) -> Alert {
    Alert {
        kind,
        severity: Severity::Low,
        mechanism: match kind {
            AlertKind::PriceSpiral => {
                "Rapid price acceleration detected (score=0.40); prices may spiral if unchecked".into()
            }
            AlertKind::ComplianceBreakdown => {
                "Compliance instability detected; may indicate shadow-market behaviors".into()
            }
            _ => "Inequality is improving while stress rises".into(),
        },
    }
}

fn assert_plain(layman: &str) {
    for (technical, _) in LAYMAN_PHRASES {
        assert!(!layman.contains(technical), "layman text still contains {technical:?}: {layman}");
    }
}

#[test]
fn quiet_run_reads_as_stable() {
    let history = vec![point(1), point(2)];
    let explanation = explain(&analyze(&history), &history);
    assert!(explanation.technical.starts_with(NO_ALERT_PRICE));
    assert!(explanation.technical.contains(NO_ALERT_COMPLIANCE));
    assert!(explanation.technical.contains("Latest avg price: 10.50. Latest compliance: 82%."));
    assert!(explanation.recommendations.is_empty());
    assert_plain(&explanation.layman);
}

#[test]
fn recommendations_are_deduplicated_in_category_order() {
    let analysis = Analysis {
        unintended_consequence_index: 0.65,
        band: UciBand::Critical,
        alerts: vec![
            alert(AlertKind::ComplianceBreakdown),
            alert(AlertKind::PriceSpiral),
            alert(AlertKind::ComplianceBreakdown),
        ],
        metrics: Metrics::default(),
    };
    let explanation = explain(&analysis, &[point(1)]);
    assert_eq!(
        explanation.recommendations,
        vec![
            recommendation(AlertKind::PriceSpiral).to_string(),
            recommendation(AlertKind::ComplianceBreakdown).to_string(),
        ]
    );
    assert!(explanation.technical.contains("(critical)"));
    assert!(explanation.layman.contains("(serious concern)"));
    assert_plain(&explanation.layman);
}

#[test]
fn layman_rewrites_every_alert_mechanism() {
    let text = to_layman(
        "Elevated price volatility observed; market instability may be emerging. Consider phased implementation.",
    );
    assert_eq!(
        text,
        "Prices are jumping around a lot; sellers may struggle to keep things steady. \
         Rolling the policy out gradually could help."
    );
}

#[test]
fn binding_cap_response_is_fully_explained() {
    let request: SimulationRequest = serde_json::from_str(
        r#"{"policy_type":"food_price_ceiling","params":{"price_cap":1.0},"steps":24,"seed":3}"#,
    )
    .unwrap();
    let response = simulate(&request, &SimConfig::default_test()).unwrap();

    assert_eq!(response.history.len(), 24);
    assert_eq!(response.neighborhoods.len(), 5);
    assert_eq!(response.seed, 3);
    assert!(response
        .analysis
        .alerts
        .iter()
        .any(|a| a.kind == AlertKind::ComplianceBreakdown));
    assert!(response
        .recommendations
        .contains(&recommendation(AlertKind::ComplianceBreakdown).to_string()));
    assert_plain(&response.explanation.layman);

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["analysis"]["alerts"][0]["type"].is_string());
    assert!(json["explanation"]["layman"].is_string());
}

#[test]
fn explaining_twice_gives_the_same_text() {
    let history: Vec<SimulationPoint> = (1..=8u64)
        .map(|step| SimulationPoint {
            avg_price: 10.0 + (step * step) as f64 * 0.5,
            compliance_rate: if step % 2 == 0 { 0.9 } else { 0.5 },
            ..point(step)
        })
        .collect();
    let analysis = analyze(&history);
    assert!(!analysis.alerts.is_empty(), "history should raise alerts");

    let first = explain(&analysis, &history);
    let second = explain(&analyze(&history), &history);
    assert_eq!(first, second, "explain must be a pure function of its inputs");
    assert_eq!(first.layman, second.layman);
    assert_eq!(first.recommendations, second.recommendations);
}
