//! Urgency and pressure language detection.
//!
//! Requests that lean on deadlines, authority or threatened consequences are
//! a common way to get a payment past normal review.

use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, SignalResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::{compile, round_to};

/// Detector identifier.
pub const URGENCY: &str = "urgency";

const MAX_SCORE: f64 = 25.0;
const SCORE_PER_WEIGHT: f64 = 5.0;

/// `(name, pattern, weight)` for every urgency pattern.
const URGENCY_PATTERNS: &[(&str, &str, f64)] = &[
    // Direct urgency
    (
        "urgent",
        r"\b(urgent|urgently|asap|immediately|right away|right now)\b",
        1.5,
    ),
    ("rush", r"\b(rush|rushed|expedite|expedited)\b", 1.3),
    (
        "critical_deadline",
        r"\b(critical|crucial|essential|vital)\s+(deadline|timeline|timing)",
        1.4,
    ),
    // Time pressure
    (
        "same_day",
        r"\b(today|tonight|this morning|this afternoon|within hours?)\b",
        1.2,
    ),
    (
        "end_of_day",
        r"\b(by\s+(?:end of|close of)\s+(?:day|business))\b",
        1.3,
    ),
    (
        "deadline_near",
        r"\b(deadline\s+(?:is\s+)?(?:today|tomorrow|approaching))\b",
        1.4,
    ),
    // Approval pressure
    (
        "must_approve",
        r"\b(must\s+(?:be\s+)?approv(?:e|ed)|needs?\s+(?:immediate\s+)?approval)\b",
        1.5,
    ),
    (
        "approve_now",
        r"\b(approve\s+(?:now|immediately|today|asap))\b",
        1.6,
    ),
    (
        "skip_review",
        r"\b(skip\s+(?:the\s+)?review|bypass\s+(?:normal\s+)?process)\b",
        1.8,
    ),
    // Consequences
    (
        "consequence",
        r"\b(or\s+else|otherwise|consequences?|penalty|penalized)\b",
        1.4,
    ),
    (
        "lose_deal",
        r"\b(lose\s+(?:the\s+)?(?:deal|contract|opportunity))\b",
        1.5,
    ),
    (
        "missed_deadline",
        r"\b(miss(?:ed)?\s+(?:the\s+)?deadline)\b",
        1.3,
    ),
    // Authority pressure
    (
        "executive_demand",
        r"\b((?:ceo|cfo|president|director|boss)\s+(?:wants?|needs?|demands?))\b",
        1.4,
    ),
    (
        "executive_priority",
        r"\b(executive\s+(?:order|request|priority))\b",
        1.3,
    ),
    (
        "do_not_delay",
        r"\b(do\s+not\s+(?:question|delay|wait))\b",
        1.7,
    ),
];

/// Configuration for [`UrgencyDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgencyConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_urgency_weight")]
    pub weight: f64,
}

fn default_urgency_weight() -> f64 {
    0.9
}

impl Default for UrgencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_urgency_weight(),
        }
    }
}

struct UrgencyPattern {
    name: &'static str,
    regex: Regex,
    weight: f64,
}

/// Flags urgent or pressuring language.
pub struct UrgencyDetector {
    weight: f64,
    patterns: Vec<UrgencyPattern>,
}

impl UrgencyDetector {
    /// Create a detector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight.
    pub fn new(config: &UrgencyConfig) -> Result<Self> {
        let patterns = URGENCY_PATTERNS
            .iter()
            .map(|&(name, pattern, weight)| {
                Ok(UrgencyPattern {
                    name,
                    regex: compile(name, &format!("(?i){pattern}"))?,
                    weight,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            weight: validate_weight(URGENCY, config.weight)?,
            patterns,
        })
    }

    /// Number of urgency patterns checked.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Detector for UrgencyDetector {
    fn name(&self) -> &'static str {
        URGENCY
    }

    fn description(&self) -> &'static str {
        "Urgency and pressure language detection"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let mut total_matches = 0usize;
        let mut total_weight = 0.0;
        let mut matched_patterns: Vec<&str> = Vec::new();
        let mut phrases: Vec<String> = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(&context.text) {
                total_matches += 1;
                total_weight += pattern.weight;
                if !matched_patterns.contains(&pattern.name) {
                    matched_patterns.push(pattern.name);
                }
                let phrase = m.as_str().to_lowercase();
                if !phrases.contains(&phrase) {
                    phrases.push(phrase);
                }
            }
        }

        if total_matches == 0 {
            return Ok(SignalResult::new(URGENCY, self.weight, 0.0, 0.7)
                .with_explanation("No urgent or pressuring language detected."));
        }

        let score = f64::min(total_weight * SCORE_PER_WEIGHT, MAX_SCORE);
        let confidence = f64::min(0.5 + matched_patterns.len() as f64 * 0.1, 0.85);

        phrases.truncate(5);
        let explanation = format!(
            "Detected {total_matches} instances of urgent/pressuring language: \"{}\". \
             Unusual urgency may indicate an attempt to bypass normal review processes.",
            phrases.join(", ")
        );

        Ok(SignalResult::new(URGENCY, self.weight, score, confidence)
            .with_indicator("total_matches", total_matches)
            .with_indicator("unique_patterns", matched_patterns.len())
            .with_indicator("weighted_score", round_to(total_weight, 2))
            .with_indicator("sample_phrases", phrases)
            .with_indicator("patterns_matched", matched_patterns)
            .with_explanation(explanation))
    }
}
