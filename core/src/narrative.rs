//! Narrative text for a completed analysis.
//!
//! The technical text is assembled from alert mechanisms and metrics.
//! The layman text is the technical text passed through LAYMAN_PHRASES,
//! applied in table order, every occurrence replaced.

use crate::{
    analysis::{AlertKind, Analysis},
    snapshot::SimulationPoint,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const NO_ALERT_PRICE: &str = "Price behavior appears within expected bounds for this scenario.";
pub const NO_ALERT_COMPLIANCE: &str = "Compliance levels are stable in recent steps.";

/// Technical phrase -> plain phrase. Order matters: a phrase that
/// contains another must come before it. No plain phrase may contain
/// any technical phrase.
pub const LAYMAN_PHRASES: &[(&str, &str)] = &[
    ("Rapid price acceleration detected", "Prices are rising faster and faster"),
    ("prices may spiral if unchecked", "costs could run away unless something changes"),
    ("Elevated price volatility observed", "Prices are jumping around a lot"),
    ("market instability may be emerging", "sellers may struggle to keep things steady"),
    ("Consider phased implementation", "Rolling the policy out gradually could help"),
    ("Compliance instability detected", "More people are bending the rules"),
    ("may indicate shadow-market behaviors", "some may be turning to under-the-table deals"),
    ("Inequality is improving while stress rises", "The gap between rich and poor is narrowing, but households feel more squeezed"),
    ("Price behavior appears within expected bounds for this scenario", "Prices look normal for this kind of policy"),
    ("Compliance levels are stable in recent steps", "Most people keep following the rules"),
    ("Unintended consequence index", "Overall side-effect score"),
    ("price_acceleration", "price speed-up"),
    ("compliance_instability", "rule-bending swings"),
    ("gini_drift", "inequality change"),
    ("volatility", "price swings"),
    ("(score=", "(strength "),
    ("Metrics:", "Key numbers:"),
    ("Latest avg price", "Current average price"),
    ("Latest compliance", "Share of people following the rules"),
    ("(benign)", "(low concern)"),
    ("(moderate)", "(some concern)"),
    ("(critical)", "(serious concern)"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub technical: String,
    pub layman: String,
    pub recommendations: Vec<String>,
}

pub fn recommendation(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::PriceSpiral => "Target supply-side measures or temporary price supports for essentials.",
        AlertKind::MarketInstability => "Consider phased implementation and monitoring to avoid sudden shocks.",
        AlertKind::ComplianceBreakdown => "Increase enforcement visibility and reduce incentives for evasion.",
        AlertKind::EquityStressDivergence => {
            "Expand supply of essentials so equity gains are not offset by shortages."
        }
    }
}

pub fn explain(analysis: &Analysis, history: &[SimulationPoint]) -> Explanation {
    let technical = technical_text(analysis, history);
    let layman = to_layman(&technical);
    let kinds: BTreeSet<AlertKind> = analysis.alerts.iter().map(|a| a.kind).collect();
    Explanation {
        technical,
        layman,
        recommendations: kinds.into_iter().map(|k| recommendation(k).to_string()).collect(),
    }
}

fn technical_text(analysis: &Analysis, history: &[SimulationPoint]) -> String {
    let mut parts: Vec<String> = if analysis.alerts.is_empty() {
        vec![NO_ALERT_PRICE.to_string(), NO_ALERT_COMPLIANCE.to_string()]
    } else {
        analysis.alerts.iter().map(|a| format!("{}.", a.mechanism)).collect()
    };

    let m = &analysis.metrics;
    parts.push(format!(
        "Metrics: price_acceleration={:.4}, volatility={:.4}, compliance_instability={:.4}, gini_drift={:.4}.",
        m.price_acceleration, m.volatility, m.compliance_instability, m.gini_drift
    ));
    parts.push(format!(
        "Unintended consequence index: {:.2} ({}).",
        analysis.unintended_consequence_index,
        analysis.band.as_str()
    ));
    if let Some(last) = history.last() {
        parts.push(format!(
            "Latest avg price: {:.2}. Latest compliance: {:.0}%.",
            last.avg_price,
            last.compliance_rate * 100.0
        ));
    }
    parts.join(" ")
}

/// Rewrite technical text with the plain-language phrase table.
pub fn to_layman(technical: &str) -> String {
    LAYMAN_PHRASES
        .iter()
        .fold(technical.to_string(), |text, (from, to)| text.replace(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_phrases_are_free_of_technical_phrases() {
        for (_, plain) in LAYMAN_PHRASES {
            for (technical, _) in LAYMAN_PHRASES {
                assert!(
                    !plain.contains(technical),
                    "plain phrase {plain:?} contains technical phrase {technical:?}"
                );
            }
        }
    }

    #[test]
    fn longer_phrases_come_first() {
        for (i, (earlier, _)) in LAYMAN_PHRASES.iter().enumerate() {
            for (later, _) in &LAYMAN_PHRASES[i + 1..] {
                assert!(
                    !later.contains(earlier),
                    "{later:?} can never match once {earlier:?} has been replaced"
                );
            }
        }
    }

    #[test]
    fn every_occurrence_is_replaced() {
        assert_eq!(
            to_layman("volatility and volatility"),
            "price swings and price swings"
        );
    }
}
