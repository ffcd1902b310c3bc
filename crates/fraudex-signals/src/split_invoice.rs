//! Split-invoice detection.
//!
//! A purchase that would need senior sign-off is broken into several invoices,
//! each kept just under the approval threshold. The detector looks for two or
//! more amounts in the band `[0.80 × T, 0.99 × T)` of a threshold `T` whose
//! combined total exceeds `T`.

use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, SignalError, SignalResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::extract::{amounts_by_offset, cents, compile_all, format_currency, round_to, AMOUNT};

/// Detector identifier.
pub const SPLIT_INVOICE: &str = "split_invoice";

/// Lower edge of the "just under" band, as a fraction of the threshold.
const BAND_LOW: f64 = 0.80;
/// Upper (exclusive) edge of the band.
const BAND_HIGH: f64 = 0.99;

/// Configuration for [`SplitInvoiceDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitInvoiceConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_split_weight")]
    pub weight: f64,
    /// Approval thresholds to test against.
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f64>,
}

fn default_split_weight() -> f64 {
    1.3
}

fn default_thresholds() -> Vec<f64> {
    vec![5_000.0, 10_000.0, 25_000.0, 50_000.0, 100_000.0]
}

impl Default for SplitInvoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_split_weight(),
            thresholds: default_thresholds(),
        }
    }
}

/// Two or more amounts sitting just under one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCluster {
    pub threshold: f64,
    pub amounts: Vec<f64>,
    pub total: f64,
}

impl ThresholdCluster {
    /// Whether a single combined invoice would have crossed the threshold.
    pub fn is_suspicious(&self) -> bool {
        self.total > self.threshold
    }
}

/// Find clusters of ≥ 2 amounts in `[0.80 × T, 0.99 × T)` for each threshold `T`.
pub fn find_threshold_clusters(amounts: &[f64], thresholds: &[f64]) -> Vec<ThresholdCluster> {
    thresholds
        .iter()
        .filter_map(|&threshold| {
            let lower = threshold * BAND_LOW;
            let upper = threshold * BAND_HIGH;
            let members: Vec<f64> = amounts
                .iter()
                .copied()
                .filter(|a| (lower..upper).contains(a))
                .collect();
            (members.len() >= 2).then(|| ThresholdCluster {
                threshold,
                total: members.iter().sum(),
                amounts: members,
            })
        })
        .collect()
}

/// Flags amounts clustered just below approval thresholds.
pub struct SplitInvoiceDetector {
    weight: f64,
    thresholds: Vec<f64>,
    invoice_patterns: Vec<Regex>,
    bare_amount: Regex,
}

impl SplitInvoiceDetector {
    /// Create a detector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight or an empty or
    /// non-positive threshold list.
    pub fn new(config: &SplitInvoiceConfig) -> Result<Self> {
        let weight = validate_weight(SPLIT_INVOICE, config.weight)?;
        if config.thresholds.is_empty() {
            return Err(SignalError::Config(
                "split_invoice thresholds must not be empty".to_string(),
            ));
        }
        if let Some(bad) = config
            .thresholds
            .iter()
            .find(|t| !t.is_finite() || **t <= 0.0)
        {
            return Err(SignalError::Config(format!(
                "split_invoice thresholds must be positive, got {bad}"
            )));
        }

        let mut patterns = compile_all([
            (
                "invoice_numbered",
                format!(r"(?i)\b(?:invoice|inv|bill)[#:\s-]*\d+[^\d]*\$?\s*(?P<amount>{AMOUNT})"),
            ),
            (
                "invoice_then_dollar",
                format!(r"(?i)\b(?:invoice|inv|bill)[^$]*\$\s*(?P<amount>{AMOUNT})"),
            ),
            (
                "dollar_then_invoice",
                format!(r"(?i)\$\s*(?P<amount>{AMOUNT})[^\d]*\b(?:invoice|inv|bill)"),
            ),
            ("bare_dollar", format!(r"\$\s*(?P<amount>{AMOUNT})")),
        ])?;
        let bare_amount = patterns.pop().ok_or_else(|| {
            SignalError::Config("split_invoice bare amount pattern missing".to_string())
        })?;

        Ok(Self {
            weight,
            thresholds: config.thresholds.clone(),
            invoice_patterns: patterns,
            bare_amount,
        })
    }

    /// Distinct invoice amounts in ascending order.
    ///
    /// Combines invoice-labelled amounts, bare dollar amounts between 100 and
    /// 1,000,000, and pre-extracted amounts.
    pub fn extract_amounts(&self, context: &AnalysisContext) -> Vec<f64> {
        let labelled = self
            .invoice_patterns
            .iter()
            .flat_map(|re| amounts_by_offset(&context.text, std::slice::from_ref(re)))
            .map(|(_, v)| v);
        let bare = amounts_by_offset(&context.text, std::slice::from_ref(&self.bare_amount))
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| (100.0..=1_000_000.0).contains(v));

        let mut amounts: Vec<f64> = labelled
            .chain(bare)
            .chain(context.amounts.iter().copied())
            .filter(|v| v.is_finite())
            .collect();
        amounts.sort_by(f64::total_cmp);
        amounts.dedup_by(|a, b| cents(*a) == cents(*b));
        amounts
    }
}

impl Detector for SplitInvoiceDetector {
    fn name(&self) -> &'static str {
        SPLIT_INVOICE
    }

    fn description(&self) -> &'static str {
        "Invoice splitting pattern detection"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let amounts = self.extract_amounts(context);

        if amounts.len() < 2 {
            return Ok(SignalResult::new(SPLIT_INVOICE, self.weight, 0.0, 0.3)
                .with_indicator("amounts_found", amounts.len())
                .with_explanation("Insufficient data for split invoice analysis."));
        }

        let clusters = find_threshold_clusters(&amounts, &self.thresholds);
        let suspicious: Vec<&ThresholdCluster> =
            clusters.iter().filter(|c| c.is_suspicious()).collect();
        let split_count = suspicious.len();
        let suspicious_amounts: usize = suspicious.iter().map(|c| c.amounts.len()).sum();

        let (score, confidence) = if split_count >= 3 || suspicious_amounts >= 6 {
            (40.0, 0.9)
        } else if split_count >= 2 || suspicious_amounts >= 4 {
            (30.0, 0.8)
        } else if split_count >= 1 || suspicious_amounts >= 2 {
            (20.0, 0.7)
        } else {
            (0.0, 0.6)
        };

        let explanation = if score > 0.0 {
            let details = suspicious
                .iter()
                .take(3)
                .map(|c| {
                    format!(
                        "${} threshold: {} invoices totaling ${}",
                        format_currency(c.threshold, 0),
                        c.amounts.len(),
                        format_currency(c.total, 2)
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "Potential invoice splitting detected: {suspicious_amounts} amounts cluster just \
                 below approval thresholds. {details}. This pattern may indicate intentional \
                 splitting to circumvent approval controls."
            )
        } else {
            "No invoice splitting patterns detected.".to_string()
        };

        let clusters_json: Vec<_> = clusters
            .iter()
            .map(|c| {
                json!({
                    "threshold": c.threshold,
                    "amounts_below": c.amounts,
                    "count": c.amounts.len(),
                    "total_if_combined": round_to(c.total, 2),
                })
            })
            .collect();
        let splits_json: Vec<_> = suspicious
            .iter()
            .map(|c| {
                json!({
                    "threshold": c.threshold,
                    "split_amounts": c.amounts,
                    "combined_total": round_to(c.total, 2),
                    "exceeds_by": round_to(c.total - c.threshold, 2),
                })
            })
            .collect();

        Ok(SignalResult::new(SPLIT_INVOICE, self.weight, score, confidence)
            .with_indicator("amounts_analyzed", amounts.len())
            .with_indicator("total_suspicious_amounts", suspicious_amounts)
            .with_indicator("suspicious_splits", splits_json)
            .with_indicator("clusters_below_threshold", clusters_json)
            .with_indicator("thresholds_checked", self.thresholds.clone())
            .with_explanation(explanation))
    }
}
