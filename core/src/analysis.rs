//! Post-run diagnostics over a completed history.
//!
//! Everything here is a pure function of the history: derived metrics,
//! the unintended consequence index (UCI) and the alert list. Calling
//! `analyze` twice on the same history yields identical results.

use crate::snapshot::SimulationPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ACCELERATION_THRESHOLD: f64 = 0.15;
pub const VOLATILITY_THRESHOLD: f64 = 0.05;
pub const COMPLIANCE_THRESHOLD: f64 = 0.10;
pub const GINI_DRIFT_THRESHOLD: f64 = 0.05;
/// Least-squares slopes within this distance of zero count as flat.
pub const TREND_TOLERANCE: f64 = 1e-4;

const ACCELERATION_WEIGHT: f64 = 0.35;
const VOLATILITY_WEIGHT: f64 = 0.25;
const COMPLIANCE_WEIGHT: f64 = 0.30;
const GINI_WEIGHT: f64 = 0.10;

pub const MODERATE_CUTOFF: f64 = 0.3;
pub const CRITICAL_CUTOFF: f64 = 0.6;

/// Alert categories in their fixed report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "Price Spiral")]
    PriceSpiral,
    #[serde(rename = "Market Instability")]
    MarketInstability,
    #[serde(rename = "Compliance Breakdown")]
    ComplianceBreakdown,
    #[serde(rename = "Equity-Stress Divergence")]
    EquityStressDivergence,
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PriceSpiral => "Price Spiral",
            Self::MarketInstability => "Market Instability",
            Self::ComplianceBreakdown => "Compliance Breakdown",
            Self::EquityStressDivergence => "Equity-Stress Divergence",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

impl Severity {
    /// Grade a metric by how far past its threshold it sits.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 3.0 {
            Self::Critical
        } else if ratio >= 1.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UciBand {
    Benign,
    Moderate,
    Critical,
}

impl UciBand {
    pub fn from_index(uci: f64) -> Self {
        if uci < MODERATE_CUTOFF {
            Self::Benign
        } else if uci < CRITICAL_CUTOFF {
            Self::Moderate
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Moderate => "moderate",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: Severity,
    pub mechanism: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub price_acceleration: f64,
    pub volatility: f64,
    pub compliance_instability: f64,
    pub gini_drift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub unintended_consequence_index: f64,
    pub band: UciBand,
    pub alerts: Vec<Alert>,
    pub metrics: Metrics,
}

/// Derive metrics, UCI and alerts from a completed history.
pub fn analyze(history: &[SimulationPoint]) -> Analysis {
    let metrics = compute_metrics(history);
    let uci = unintended_consequence_index(&metrics);
    let alerts = detect_alerts(history, &metrics);
    Analysis {
        unintended_consequence_index: uci,
        band: UciBand::from_index(uci),
        alerts,
        metrics,
    }
}

pub fn compute_metrics(history: &[SimulationPoint]) -> Metrics {
    let prices: Vec<f64> = history.iter().map(|p| p.avg_price).collect();
    let compliance: Vec<f64> = history.iter().map(|p| p.compliance_rate).collect();
    Metrics {
        price_acceleration: price_acceleration(&prices),
        volatility: volatility(&prices),
        compliance_instability: std_dev(&compliance),
        gini_drift: match (history.first(), history.last()) {
            (Some(first), Some(last)) => last.gini - first.gini,
            _ => 0.0,
        },
    }
}

/// Weighted composite in [0, 1]; each component saturates at its threshold.
pub fn unintended_consequence_index(m: &Metrics) -> f64 {
    let component = |value: f64, threshold: f64| (value.max(0.0) / threshold).clamp(0.0, 1.0);
    let uci = ACCELERATION_WEIGHT * component(m.price_acceleration, ACCELERATION_THRESHOLD)
        + VOLATILITY_WEIGHT * component(m.volatility, VOLATILITY_THRESHOLD)
        + COMPLIANCE_WEIGHT * component(m.compliance_instability, COMPLIANCE_THRESHOLD)
        + GINI_WEIGHT * component(m.gini_drift, GINI_DRIFT_THRESHOLD);
    if uci.is_finite() { uci.clamp(0.0, 1.0) } else { 1.0 }
}

fn detect_alerts(history: &[SimulationPoint], m: &Metrics) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let prices: Vec<f64> = history.iter().map(|p| p.avg_price).collect();

    // A decelerating fall also has a positive second difference.
    if m.price_acceleration > ACCELERATION_THRESHOLD && mean_change(&prices) > 0.0 {
        alerts.push(Alert {
            kind: AlertKind::PriceSpiral,
            severity: Severity::from_ratio(m.price_acceleration / ACCELERATION_THRESHOLD),
            mechanism: format!(
                "Rapid price acceleration detected (score={:.2}); prices may spiral if unchecked",
                m.price_acceleration
            ),
        });
    }
    if m.volatility > VOLATILITY_THRESHOLD {
        alerts.push(Alert {
            kind: AlertKind::MarketInstability,
            severity: Severity::from_ratio(m.volatility / VOLATILITY_THRESHOLD),
            mechanism: "Elevated price volatility observed; market instability may be emerging. \
                        Consider phased implementation"
                .into(),
        });
    }
    if m.compliance_instability > COMPLIANCE_THRESHOLD {
        alerts.push(Alert {
            kind: AlertKind::ComplianceBreakdown,
            severity: Severity::from_ratio(m.compliance_instability / COMPLIANCE_THRESHOLD),
            mechanism: "Compliance instability detected; may indicate shadow-market behaviors".into(),
        });
    }

    let gini: Vec<f64> = history.iter().map(|p| p.gini).collect();
    let stress: Vec<f64> = history.iter().map(|p| p.avg_stress).collect();
    if slope(&gini) < -TREND_TOLERANCE && slope(&stress) > TREND_TOLERANCE {
        alerts.push(Alert {
            kind: AlertKind::EquityStressDivergence,
            severity: Severity::Medium,
            mechanism: "Inequality is improving while stress rises".into(),
        });
    }

    alerts
}

/// Mean second difference relative to the mean level, in percent.
fn price_acceleration(prices: &[f64]) -> f64 {
    if prices.len() < 3 {
        return 0.0;
    }
    let level = mean(prices);
    if level <= 0.0 {
        return 0.0;
    }
    let second: Vec<f64> = prices.windows(3).map(|w| w[2] - 2.0 * w[1] + w[0]).collect();
    mean(&second) / level * 100.0
}

/// Mean first difference: positive when prices rise on average.
fn mean_change(prices: &[f64]) -> f64 {
    let first: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    mean(&first)
}

/// Population std-dev of step-to-step fractional price changes.
fn volatility(prices: &[f64]) -> f64 {
    let changes: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    std_dev(&changes)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    (values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Least-squares slope against the index.
fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    num / den
}
