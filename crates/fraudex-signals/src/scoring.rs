//! Case-level scoring entry points.
//!
//! Thin wrappers over [`SignalEngine::analyze`] producing the shapes the case
//! workflow persists: a `(score, signals, explanation)` triple for the quick
//! path, and a [`DetailedRiskAssessment`] when the caller has pre-extracted
//! amounts, dates or entities.

use fraudex_core::{
    AggregatedRiskResult, AnalysisContext, Indicators, RiskLevel, RiskSignals, SignalResult,
    TopFactor,
};
use serde::{Deserialize, Serialize};

use crate::engine::SignalEngine;

/// One detector's entry in [`FullAnalysis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSummary {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    pub confidence: f64,
    pub explanation: String,
    pub indicators: Indicators,
}

impl From<SignalResult> for DetectorSummary {
    fn from(result: SignalResult) -> Self {
        Self {
            name: result.detector_name,
            score: result.score,
            weight: result.weight,
            confidence: result.confidence,
            explanation: result.explanation,
            indicators: result.indicators,
        }
    }
}

/// Every detector's output, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullAnalysis {
    pub detectors_run: usize,
    pub detector_results: Vec<DetectorSummary>,
}

/// Full assessment for a context with pre-extracted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRiskAssessment {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub explanation: String,
    pub top_factors: Vec<TopFactor>,
    pub recommendations: Vec<String>,
    pub signals: RiskSignals,
    pub full_analysis: FullAnalysis,
}

impl From<AggregatedRiskResult> for DetailedRiskAssessment {
    fn from(result: AggregatedRiskResult) -> Self {
        let detector_results: Vec<DetectorSummary> = result
            .detector_results
            .into_iter()
            .map(DetectorSummary::from)
            .collect();
        Self {
            risk_score: result.risk_score,
            risk_level: result.risk_level,
            confidence: result.confidence,
            explanation: result.explanation,
            top_factors: result.top_factors,
            recommendations: result.recommendations,
            signals: result.signals,
            full_analysis: FullAnalysis {
                detectors_run: detector_results.len(),
                detector_results,
            },
        }
    }
}

/// Score plain text, returning `(risk_score, signals, explanation)`.
pub fn compute_risk_score(engine: &SignalEngine, text: &str) -> (u8, RiskSignals, String) {
    let result = engine.analyze(&AnalysisContext::new(text));
    (result.risk_score, result.signals, result.explanation)
}

/// Score a fully populated context.
pub fn compute_risk_score_detailed(
    engine: &SignalEngine,
    context: &AnalysisContext,
) -> DetailedRiskAssessment {
    engine.analyze(context).into()
}
