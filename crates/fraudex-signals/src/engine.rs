//! Detector ensemble orchestration and weighted risk aggregation.
//!
//! [`SignalEngine`] runs every registered detector against one
//! [`AnalysisContext`], isolates failures, and folds the results into a single
//! [`AggregatedRiskResult`].
//!
//! # Aggregation
//!
//! Only detectors with a score above zero take part:
//!
//! ```text
//! risk_score = floor(min(Σ(score × weight × confidence) / Σ(weight), 100))
//! confidence = mean(confidence)
//! ```
//!
//! When nothing triggers the score is 0 with confidence 0.5.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use fraudex_core::{
    validate_weight, AggregatedRiskResult, AnalysisContext, Detector, DetectorBreakdown, Result,
    RiskLevel, RiskSignals, SignalError, SignalResult, TopFactor,
};
use serde::{Deserialize, Serialize};

use crate::benford::{BenfordConfig, BenfordDetector, BENFORD};
use crate::bid_rigging::{BidRiggingConfig, BidRiggingDetector, BID_RIGGING};
use crate::extract::round_to;
use crate::keywords::{KeywordConfig, KeywordDetector, KEYWORDS};
use crate::round_numbers::{RoundNumberConfig, RoundNumberDetector, ROUND_NUMBERS};
use crate::split_invoice::{SplitInvoiceConfig, SplitInvoiceDetector, SPLIT_INVOICE};
use crate::urgency::{UrgencyConfig, UrgencyDetector, URGENCY};
use crate::velocity::{VelocityConfig, VelocityDetector, VELOCITY};

/// Maximum number of top factors and recommendations reported.
const MAX_TOP_FACTORS: usize = 5;
const MAX_RECOMMENDATIONS: usize = 5;
/// Number of detectors named in the explanation.
const EXPLAINED_FACTORS: usize = 3;
/// Indicators copied into each top factor.
const KEY_INDICATORS: usize = 3;

const NO_INDICATORS_EXPLANATION: &str =
    "No significant corruption or fraud indicators detected by automated analysis.";

const ESCALATION_RECOMMENDATION: &str = "Flag for immediate supervisor review before any approval.";
const FORENSIC_RECOMMENDATION: &str = "Consider forensic audit of related transactions and parties.";

/// Remediation advice per detector, in the order recommendations are listed.
const DETECTOR_RECOMMENDATIONS: &[(&str, &str)] = &[
    (
        BENFORD,
        "Verify numerical data sources and check for potential data entry errors or manipulation.",
    ),
    (
        SPLIT_INVOICE,
        "Review related invoices for potential unauthorized splitting to avoid approval thresholds.",
    ),
    (
        BID_RIGGING,
        "Investigate vendor relationships and review bidding history for potential collusion.",
    ),
    (
        ROUND_NUMBERS,
        "Request supporting documentation for round-number amounts; verify against actual costs.",
    ),
    (
        KEYWORDS,
        "Escalate for legal/compliance review due to concerning language patterns.",
    ),
    (
        URGENCY,
        "Maintain normal approval process despite urgency pressure; verify legitimacy of deadlines.",
    ),
    (
        VELOCITY,
        "Review timing patterns; consider whether after-hours/weekend activity is justified.",
    ),
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the full detector ensemble.
///
/// Detectors are registered in field order; disabled detectors are skipped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub benford: BenfordConfig,
    #[serde(default)]
    pub round_numbers: RoundNumberConfig,
    #[serde(default)]
    pub split_invoice: SplitInvoiceConfig,
    #[serde(default)]
    pub bid_rigging: BidRiggingConfig,
    #[serde(default)]
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub urgency: UrgencyConfig,
    #[serde(default)]
    pub velocity: VelocityConfig,
}

// ---------------------------------------------------------------------------
// SignalEngine
// ---------------------------------------------------------------------------

/// Ordered detector ensemble.
///
/// The engine holds no mutable state; a single instance can serve concurrent
/// [`analyze`](Self::analyze) calls.
pub struct SignalEngine {
    detectors: Vec<Box<dyn Detector>>,
}

impl std::fmt::Debug for SignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEngine")
            .field("detectors", &self.detector_names())
            .finish()
    }
}

impl SignalEngine {
    /// Create an engine over an explicit detector list, run in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Config`] if the list is empty, two detectors
    /// share a name, or a detector reports a negative or non-finite weight.
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Result<Self> {
        if detectors.is_empty() {
            return Err(SignalError::Config(
                "signal engine requires at least one detector".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for detector in &detectors {
            validate_weight(detector.name(), detector.weight())?;
            if !seen.insert(detector.name()) {
                return Err(SignalError::Config(format!(
                    "duplicate detector name '{}'",
                    detector.name()
                )));
            }
        }
        Ok(Self { detectors })
    }

    /// Build the ensemble described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Config`] if any detector rejects its
    /// configuration or every detector is disabled.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
        if config.benford.enabled {
            detectors.push(Box::new(BenfordDetector::new(&config.benford)?));
        }
        if config.round_numbers.enabled {
            detectors.push(Box::new(RoundNumberDetector::new(&config.round_numbers)?));
        }
        if config.split_invoice.enabled {
            detectors.push(Box::new(SplitInvoiceDetector::new(&config.split_invoice)?));
        }
        if config.bid_rigging.enabled {
            detectors.push(Box::new(BidRiggingDetector::new(&config.bid_rigging)?));
        }
        if config.keywords.enabled {
            detectors.push(Box::new(KeywordDetector::new(&config.keywords)?));
        }
        if config.urgency.enabled {
            detectors.push(Box::new(UrgencyDetector::new(&config.urgency)?));
        }
        if config.velocity.enabled {
            detectors.push(Box::new(VelocityDetector::new(&config.velocity)?));
        }
        Self::new(detectors)
    }

    /// The seven built-in detectors with their default weights.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in pattern fails to compile.
    pub fn with_default_detectors() -> Result<Self> {
        Self::from_config(&EngineConfig::default())
    }

    /// Analyze plain text with the default ensemble.
    ///
    /// # Errors
    ///
    /// See [`with_default_detectors`](Self::with_default_detectors).
    pub fn from_text(text: &str) -> Result<AggregatedRiskResult> {
        Ok(Self::with_default_detectors()?.analyze(&AnalysisContext::new(text)))
    }

    /// Detector names in registration order.
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Registered detectors in run order.
    pub fn detectors(&self) -> impl Iterator<Item = &(dyn Detector + 'static)> + '_ {
        self.detectors.iter().map(|d| d.as_ref())
    }

    /// Number of registered detectors.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Always `false`; construction rejects an empty ensemble.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector and aggregate the results.
    ///
    /// Never fails: a detector that returns an error or panics contributes a
    /// zero-score, zero-confidence result carrying an `error` indicator.
    pub fn analyze(&self, context: &AnalysisContext) -> AggregatedRiskResult {
        let detector_results: Vec<SignalResult> = self
            .detectors
            .iter()
            .map(|d| run_detector(d.as_ref(), context))
            .collect();
        self.aggregate(detector_results)
    }

    fn aggregate(&self, detector_results: Vec<SignalResult>) -> AggregatedRiskResult {
        let mut contributing: Vec<&SignalResult> =
            detector_results.iter().filter(|r| r.is_triggered()).collect();

        let total_weight: f64 = contributing.iter().map(|r| r.weight).sum();
        let (risk_score, confidence) = if total_weight > 0.0 {
            let weighted: f64 = contributing.iter().map(|r| r.contribution()).sum();
            let raw = f64::min(weighted / total_weight, 100.0);
            let mean_confidence = contributing.iter().map(|r| r.confidence).sum::<f64>()
                / contributing.len() as f64;
            (raw.floor() as u8, mean_confidence)
        } else {
            (0, 0.5)
        };
        let risk_level = RiskLevel::from_score(risk_score);

        // Stable sort keeps registration order on ties.
        contributing.sort_by(|a, b| b.contribution().total_cmp(&a.contribution()));
        let top_factors: Vec<TopFactor> = contributing
            .iter()
            .take(MAX_TOP_FACTORS)
            .map(|r| top_factor(r))
            .collect();

        let explanation = build_explanation(risk_score, risk_level, &top_factors);
        let recommendations = build_recommendations(&top_factors, risk_level);

        let detector_breakdown: BTreeMap<String, DetectorBreakdown> = detector_results
            .iter()
            .map(|r| {
                (
                    r.detector_name.clone(),
                    DetectorBreakdown {
                        score: r.score,
                        weight: r.weight,
                        confidence: r.confidence,
                        indicators: r.indicators.clone(),
                    },
                )
            })
            .collect();

        let confidence = round_to(confidence, 2);
        let signals = RiskSignals {
            risk_level,
            confidence,
            top_factors: top_factors.clone(),
            recommendations: recommendations.clone(),
            detectors_run: self.detectors.len(),
            detectors_triggered: contributing.len(),
            detector_breakdown,
        };

        tracing::debug!(
            risk_score,
            risk_level = %risk_level,
            confidence,
            detectors_triggered = contributing.len(),
            "Signal analysis complete"
        );

        AggregatedRiskResult {
            risk_score,
            risk_level,
            confidence,
            signals,
            explanation,
            top_factors,
            detector_results,
            recommendations,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run one detector, converting errors and panics into a failed result.
fn run_detector(detector: &dyn Detector, context: &AnalysisContext) -> SignalResult {
    let name = detector.name();
    match catch_unwind(AssertUnwindSafe(|| detector.detect(context))) {
        Ok(Ok(result)) => {
            tracing::debug!(
                detector = name,
                score = result.score,
                confidence = result.confidence,
                "Detector completed"
            );
            result
        }
        Ok(Err(err)) => {
            let reason = match err {
                SignalError::Detector(msg) => msg,
                other => other.to_string(),
            };
            tracing::warn!(detector = name, error = %reason, "Detector failed");
            SignalResult::failed(name, detector.weight(), &reason)
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            tracing::warn!(detector = name, error = %reason, "Detector panicked");
            SignalResult::failed(name, detector.weight(), &format!("panicked: {reason}"))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

fn top_factor(result: &SignalResult) -> TopFactor {
    TopFactor {
        detector: result.detector_name.clone(),
        score_contribution: round_to(result.score * result.weight, 1),
        confidence: round_to(result.confidence, 2),
        explanation: result.explanation.clone(),
        key_indicators: result
            .indicators
            .iter()
            .take(KEY_INDICATORS)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn build_explanation(risk_score: u8, risk_level: RiskLevel, top_factors: &[TopFactor]) -> String {
    if risk_score == 0 {
        return NO_INDICATORS_EXPLANATION.to_string();
    }
    let names = top_factors
        .iter()
        .take(EXPLAINED_FACTORS)
        .map(|f| f.detector.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut explanation = format!(
        "Risk score {risk_score}/100 ({risk_level}). Top contributing factors: {names}. "
    );
    if let Some(first) = top_factors.first() {
        explanation.push_str(&first.explanation);
    }
    explanation
}

fn build_recommendations(top_factors: &[TopFactor], risk_level: RiskLevel) -> Vec<String> {
    let mut recommendations: Vec<String> = DETECTOR_RECOMMENDATIONS
        .iter()
        .filter(|(name, _)| top_factors.iter().any(|f| f.detector == *name))
        .map(|(_, advice)| advice.to_string())
        .collect();

    if risk_level.is_elevated() {
        recommendations.insert(0, ESCALATION_RECOMMENDATION.to_string());
        recommendations.push(FORENSIC_RECOMMENDATION.to_string());
    }
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}
