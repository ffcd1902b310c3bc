//! Core types, traits, and errors for fraudex
//!
//! This crate contains the foundational types shared by every fraudex component:
//! the read-only [`AnalysisContext`] handed to detectors, the per-detector
//! [`SignalResult`], the engine-level [`AggregatedRiskResult`], and the
//! [`Detector`] trait that every heuristic analyzer implements.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Loosely-typed evidence attached to a result, in insertion order.
pub type Indicators = Map<String, Value>;

// ---------------------------------------------------------------------------
// Analysis input
// ---------------------------------------------------------------------------

/// Immutable input bundle for a single analysis run.
///
/// Only `text` is required. The remaining fields are filled by external
/// extractors when available; detectors merge them with whatever they can
/// scan out of the text themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Plain text produced by the upstream text-extraction collaborator.
    pub text: String,
    /// Pre-extracted numeric values. Not read by current detectors.
    #[serde(default)]
    pub numbers: Vec<f64>,
    /// Pre-extracted monetary amounts.
    #[serde(default)]
    pub amounts: Vec<f64>,
    /// Pre-extracted ISO-formatted dates.
    #[serde(default)]
    pub dates: Vec<String>,
    /// Entities (vendors, people, companies). Not read by current detectors.
    #[serde(default)]
    pub entities: Vec<Map<String, Value>>,
    /// Relationships between entities. Not read by current detectors.
    #[serde(default)]
    pub relationships: Vec<Map<String, Value>>,
    /// Auxiliary key/value context (document type, source, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AnalysisContext {
    /// Create a text-only context.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach pre-extracted numbers.
    pub fn with_numbers(mut self, numbers: Vec<f64>) -> Self {
        self.numbers = numbers;
        self
    }

    /// Attach pre-extracted monetary amounts.
    pub fn with_amounts(mut self, amounts: Vec<f64>) -> Self {
        self.amounts = amounts;
        self
    }

    /// Attach pre-extracted ISO dates.
    pub fn with_dates(mut self, dates: Vec<String>) -> Self {
        self.dates = dates;
        self
    }

    /// Attach extracted entities.
    pub fn with_entities(mut self, entities: Vec<Map<String, Value>>) -> Self {
        self.entities = entities;
        self
    }

    /// Attach extracted relationships.
    pub fn with_relationships(mut self, relationships: Vec<Map<String, Value>>) -> Self {
        self.relationships = relationships;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Severity & risk level
// ---------------------------------------------------------------------------

/// Severity attached to an individual pattern a detector found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Weak signal.
    Low,
    /// Worth a reviewer's attention.
    Medium,
    /// Strong signal.
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Coarse risk bucket derived from the aggregated risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Score below 25.
    Low,
    /// Score 25–49.
    Medium,
    /// Score 50–74.
    High,
    /// Score 75 and above.
    Critical,
}

impl RiskLevel {
    /// Classify a 0–100 risk score.
    pub fn from_score(score: u8) -> Self {
        match score {
            75..=u8::MAX => Self::Critical,
            50..=74 => Self::High,
            25..=49 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Whether this level calls for escalation (high or critical).
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Lowercase name as persisted by downstream layers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Low" | "low" | "LOW" => Ok(Self::Low),
            "Medium" | "medium" | "MEDIUM" => Ok(Self::Medium),
            "High" | "high" | "HIGH" => Ok(Self::High),
            "Critical" | "critical" | "CRITICAL" => Ok(Self::Critical),
            _ => Err(format!("unknown risk level: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Detector output
// ---------------------------------------------------------------------------

/// Output of a single detector for a single context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    /// Detector identifier, unique within an ensemble.
    pub detector_name: String,
    /// Raw contribution, always within 0–100.
    pub score: f64,
    /// Aggregation multiplier configured on the detector.
    pub weight: f64,
    /// Self-assessed reliability, always within 0–1.
    pub confidence: f64,
    /// Supporting evidence for explainability.
    pub indicators: Indicators,
    /// Human-readable summary of what was found.
    pub explanation: String,
}

impl SignalResult {
    /// Create a result, clamping `score` to 0–100 and `confidence` to 0–1.
    ///
    /// Non-finite inputs are treated as zero.
    pub fn new(detector_name: impl Into<String>, weight: f64, score: f64, confidence: f64) -> Self {
        Self {
            detector_name: detector_name.into(),
            score: clamp_finite(score, 0.0, 100.0),
            weight,
            confidence: clamp_finite(confidence, 0.0, 1.0),
            indicators: Indicators::new(),
            explanation: String::new(),
        }
    }

    /// Synthetic zero-score, zero-confidence result for a detector that failed.
    pub fn failed(detector_name: impl Into<String>, weight: f64, reason: &str) -> Self {
        Self::new(detector_name, weight, 0.0, 0.0)
            .with_indicator("error", reason)
            .with_explanation(format!("Detector error: {reason}"))
    }

    /// Record a piece of evidence.
    pub fn with_indicator(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.indicators.insert(key.into(), value.into());
        self
    }

    /// Set the explanation text.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Whether this result contributes to aggregation.
    pub fn is_triggered(&self) -> bool {
        self.score > 0.0
    }

    /// Ranking key used to order contributing factors.
    pub fn contribution(&self) -> f64 {
        self.score * self.weight * self.confidence
    }

    /// Whether the detector failed rather than producing an assessment.
    pub fn is_error(&self) -> bool {
        self.indicators.contains_key("error")
    }
}

fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

// ---------------------------------------------------------------------------
// Aggregated output
// ---------------------------------------------------------------------------

/// A contributing detector selected for prominent display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopFactor {
    /// Detector name.
    pub detector: String,
    /// `score × weight`, rounded to one decimal place.
    pub score_contribution: f64,
    /// Detector confidence, rounded to two decimal places.
    pub confidence: f64,
    /// The detector's own explanation.
    pub explanation: String,
    /// First three indicators the detector recorded.
    pub key_indicators: Indicators,
}

/// Per-detector entry of [`RiskSignals::detector_breakdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorBreakdown {
    pub score: f64,
    pub weight: f64,
    pub confidence: f64,
    pub indicators: Indicators,
}

/// Persisted summary of an analysis.
///
/// Field names are stable: the case workflow stores this mapping verbatim and
/// the analytics layer reads `detector_breakdown[name].score` across many
/// stored results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub top_factors: Vec<TopFactor>,
    pub recommendations: Vec<String>,
    pub detectors_run: usize,
    pub detectors_triggered: usize,
    pub detector_breakdown: BTreeMap<String, DetectorBreakdown>,
}

/// The engine's single output for one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRiskResult {
    /// Overall risk score, 0–100.
    pub risk_score: u8,
    /// Bucket derived from `risk_score`.
    pub risk_level: RiskLevel,
    /// Mean confidence across triggered detectors (0.5 if none triggered).
    pub confidence: f64,
    /// Summary mapping for downstream persistence.
    pub signals: RiskSignals,
    /// Human-readable summary.
    pub explanation: String,
    /// Up to five contributing detectors, strongest first.
    pub top_factors: Vec<TopFactor>,
    /// Every detector's result in registration order, including zero scores.
    pub detector_results: Vec<SignalResult>,
    /// Up to five remediation suggestions.
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Detector trait
// ---------------------------------------------------------------------------

/// A heuristic analyzer in the signal ensemble.
///
/// Implementations are immutable after construction: `detect` may be called
/// concurrently from many threads and must depend only on `context` and the
/// detector's own configuration. Insufficient data is not an error; return a
/// zero-score, low-confidence [`SignalResult`] instead.
pub trait Detector: Send + Sync {
    /// Identifier used in results, unique within an ensemble.
    fn name(&self) -> &'static str;

    /// Short human-readable description.
    fn description(&self) -> &'static str;

    /// Aggregation multiplier.
    fn weight(&self) -> f64;

    /// Analyze `context` and produce this detector's assessment.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults the detector cannot recover from. The
    /// engine converts any error into a zero-confidence result.
    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult>;
}

/// Check that a configured detector weight is finite and non-negative.
///
/// # Errors
///
/// Returns [`SignalError::Config`] naming the detector otherwise.
pub fn validate_weight(detector: &str, weight: f64) -> Result<f64> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(weight)
    } else {
        Err(SignalError::Config(format!(
            "detector '{detector}' weight must be a non-negative finite number, got {weight}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum SignalError {
    /// A detector could not complete its analysis.
    #[error("Detector error: {0}")]
    Detector(String),

    /// Invalid detector or engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `std::result::Result<T, SignalError>`.
pub type Result<T> = std::result::Result<T, SignalError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
