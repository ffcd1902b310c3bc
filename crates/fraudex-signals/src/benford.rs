//! Benford's Law leading-digit analysis.
//!
//! In many naturally occurring datasets the leading digit `d` appears with
//! probability `log10(1 + 1/d)`. Fabricated figures tend to drift away from
//! that curve. The detector measures the drift two ways:
//!
//! - **MAD**: mean absolute deviation between observed and expected
//!   frequencies across the nine digit buckets.
//! - **χ²**: goodness-of-fit statistic over digit counts, 8 degrees of freedom.
//!
//! | Condition | Score | Confidence |
//! |-----------|-------|------------|
//! | MAD > 0.03 or χ² > 20.09 | 35 | 0.85 |
//! | MAD > 0.02 or χ² > 15.51 | 20 | 0.75 |
//! | MAD > 0.015 | 10 | 0.60 |

use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, SignalError, SignalResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::extract::{compile, round_to};

/// Detector identifier.
pub const BENFORD: &str = "benford";

/// χ² critical value for df = 8 at p = 0.05.
pub const CHI_SQUARED_CRITICAL_05: f64 = 15.51;
/// χ² critical value for df = 8 at p = 0.01.
pub const CHI_SQUARED_CRITICAL_01: f64 = 20.09;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for [`BenfordDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenfordConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_benford_weight")]
    pub weight: f64,
    /// Minimum number of leading digits required before testing.
    #[serde(default = "default_min_numbers")]
    pub min_numbers: usize,
}

fn default_benford_weight() -> f64 {
    1.2
}

fn default_min_numbers() -> usize {
    20
}

impl Default for BenfordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_benford_weight(),
            min_numbers: default_min_numbers(),
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Expected Benford frequency of leading digit `digit` (1–9).
pub fn expected_frequency(digit: u8) -> f64 {
    (1.0 + 1.0 / f64::from(digit)).log10()
}

/// Leading digit of a value ≥ 10, or `None` for smaller or non-finite values.
pub fn leading_digit(value: f64) -> Option<u8> {
    if !value.is_finite() || value < 10.0 {
        return None;
    }
    let integral = format!("{:.0}", value.trunc());
    integral
        .bytes()
        .find(|b| (b'1'..=b'9').contains(b))
        .map(|b| b - b'0')
}

/// Mean absolute deviation of observed frequencies (index 0 = digit 1).
pub fn mean_absolute_deviation(observed: &[f64; 9]) -> f64 {
    let total: f64 = (1..=9u8)
        .map(|d| (observed[usize::from(d - 1)] - expected_frequency(d)).abs())
        .sum();
    total / 9.0
}

/// χ² statistic of digit counts against the Benford expectation for `n` samples.
pub fn chi_squared(counts: &[usize; 9], n: usize) -> f64 {
    (1..=9u8)
        .map(|d| {
            let expected = expected_frequency(d) * n as f64;
            if expected > 0.0 {
                let observed = counts[usize::from(d - 1)] as f64;
                (observed - expected).powi(2) / expected
            } else {
                0.0
            }
        })
        .sum()
}

// ---------------------------------------------------------------------------
// BenfordDetector
// ---------------------------------------------------------------------------

/// Flags leading-digit distributions that deviate from Benford's Law.
pub struct BenfordDetector {
    weight: f64,
    min_numbers: usize,
    number_re: Regex,
}

impl BenfordDetector {
    /// Create a detector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight or a zero
    /// `min_numbers`.
    pub fn new(config: &BenfordConfig) -> Result<Self> {
        let weight = validate_weight(BENFORD, config.weight)?;
        if config.min_numbers == 0 {
            return Err(SignalError::Config(
                "benford min_numbers must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            weight,
            min_numbers: config.min_numbers,
            number_re: compile("benford_number", r"\b\d+(?:\.\d+)?\b")?,
        })
    }

    /// Leading digits of numbers ≥ 10 in the text, then of pre-extracted amounts.
    pub fn leading_digits(&self, context: &AnalysisContext) -> Vec<u8> {
        let text = context.text.replace(',', "");
        let from_text = self
            .number_re
            .find_iter(&text)
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .filter_map(leading_digit);
        let from_amounts = context.amounts.iter().copied().filter_map(leading_digit);
        from_text.chain(from_amounts).collect()
    }

    fn result(&self, score: f64, confidence: f64) -> SignalResult {
        SignalResult::new(BENFORD, self.weight, score, confidence)
    }
}

impl Detector for BenfordDetector {
    fn name(&self) -> &'static str {
        BENFORD
    }

    fn description(&self) -> &'static str {
        "Benford's Law leading digit analysis"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let digits = self.leading_digits(context);
        let n = digits.len();

        if n < self.min_numbers {
            return Ok(self
                .result(0.0, 0.3)
                .with_indicator("sample_size", n)
                .with_indicator("min_required", self.min_numbers)
                .with_explanation(format!(
                    "Insufficient numbers for Benford analysis ({n} found, need {}).",
                    self.min_numbers
                )));
        }

        let mut counts = [0usize; 9];
        for d in &digits {
            counts[usize::from(d - 1)] += 1;
        }
        let mut observed = [0.0f64; 9];
        for (freq, count) in observed.iter_mut().zip(counts) {
            *freq = count as f64 / n as f64;
        }

        let mad = mean_absolute_deviation(&observed);
        let chi_sq = chi_squared(&counts, n);

        let (score, confidence) = if mad > 0.03 || chi_sq > CHI_SQUARED_CRITICAL_01 {
            (35.0, 0.85)
        } else if mad > 0.02 || chi_sq > CHI_SQUARED_CRITICAL_05 {
            (20.0, 0.75)
        } else if mad > 0.015 {
            (10.0, 0.6)
        } else {
            (0.0, 0.7)
        };

        let explanation = if score > 0.0 {
            format!(
                "Benford's Law deviation detected: MAD={mad:.4}, χ²={chi_sq:.2}. \
                 The distribution of leading digits deviates significantly from expected \
                 patterns, which may indicate fabricated or manipulated numbers."
            )
        } else {
            format!(
                "Leading digit distribution follows Benford's Law (MAD={mad:.4}, \
                 χ²={chi_sq:.2}). No anomaly detected."
            )
        };

        // Stable sort keeps lower digits first on equal deviation.
        let mut deviations: Vec<(u8, f64)> = (1..=9u8)
            .map(|d| (d, observed[usize::from(d - 1)] - expected_frequency(d)))
            .collect();
        deviations.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        let top_deviations: Vec<Value> = deviations
            .iter()
            .take(3)
            .map(|(d, dev)| json!({ "digit": d, "deviation": round_to(*dev, 4) }))
            .collect();

        let observed_distribution: Map<String, Value> = (1..=9u8)
            .map(|d| {
                (
                    d.to_string(),
                    json!(round_to(observed[usize::from(d - 1)], 4)),
                )
            })
            .collect();
        let expected_distribution: Map<String, Value> = (1..=9u8)
            .map(|d| (d.to_string(), json!(round_to(expected_frequency(d), 4))))
            .collect();

        tracing::trace!(n, mad, chi_sq, "Benford statistics computed");

        Ok(self
            .result(score, confidence)
            .with_indicator("sample_size", n)
            .with_indicator("mean_absolute_deviation", round_to(mad, 5))
            .with_indicator("chi_squared", round_to(chi_sq, 3))
            .with_indicator("observed_distribution", observed_distribution)
            .with_indicator("expected_distribution", expected_distribution)
            .with_indicator("top_deviations", top_deviations)
            .with_explanation(explanation))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BenfordDetector {
        BenfordDetector::new(&BenfordConfig::default()).unwrap()
    }

    /// 50 amounts whose leading digits follow Benford's Law as closely as
    /// whole counts allow.
    fn benford_amounts() -> Vec<f64> {
        let counts = [15, 9, 6, 5, 4, 3, 3, 3, 2];
        let mut amounts = Vec::new();
        for (i, count) in counts.iter().enumerate() {
            let digit = (i + 1) as f64;
            for k in 0..*count {
                amounts.push(digit * 1000.0 + 37.0 * f64::from(k) + 11.0);
            }
        }
        amounts
    }

    #[test]
    fn test_expected_frequencies_sum_to_one() {
        let total: f64 = (1..=9).map(expected_frequency).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((expected_frequency(1) - 0.30103).abs() < 1e-5);
    }

    #[test]
    fn test_leading_digit() {
        assert_eq!(leading_digit(9.99), None);
        assert_eq!(leading_digit(10.0), Some(1));
        assert_eq!(leading_digit(4821.75), Some(4));
        assert_eq!(leading_digit(f64::NAN), None);
    }

    #[test]
    fn test_benford_conforming_scores_zero() {
        let ctx = AnalysisContext::new("").with_amounts(benford_amounts());
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.indicators["sample_size"], json!(50));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_all_nines_scores_high() {
        let amounts: Vec<f64> = (0..50).map(|i| 900.0 + f64::from(i)).collect();
        let ctx = AnalysisContext::new("").with_amounts(amounts);
        let result = detector().detect(&ctx).unwrap();
        assert!(result.score >= 35.0);
        assert!(result.confidence >= 0.85);
        let top = result.indicators["top_deviations"].as_array().unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0]["digit"], json!(9));
    }

    #[test]
    fn test_insufficient_sample() {
        let ctx = AnalysisContext::new("Totals were 120, 340 and 560.");
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.indicators["sample_size"], json!(3));
        assert_eq!(result.indicators["min_required"], json!(20));
        assert!(result.explanation.contains("Insufficient"));
    }

    #[test]
    fn test_text_numbers_below_ten_ignored() {
        let d = detector();
        let ctx = AnalysisContext::new("items 1 2 3 4.5 0.75 and 12,345 and 67.8");
        assert_eq!(d.leading_digits(&ctx), vec![1, 6]);
    }

    #[test]
    fn test_text_and_amounts_are_merged() {
        let d = detector();
        let ctx = AnalysisContext::new("ledger 310").with_amounts(vec![5.0, 72.0]);
        assert_eq!(d.leading_digits(&ctx), vec![3, 7]);
    }

    #[test]
    fn test_moderate_deviation_tier() {
        // Digit 1 over-represented: 20 of 50 instead of ~15.
        let counts = [20, 8, 6, 4, 3, 3, 2, 2, 2];
        let mut amounts = Vec::new();
        for (i, count) in counts.iter().enumerate() {
            for k in 0..*count {
                amounts.push((i as f64 + 1.0) * 100.0 + f64::from(k));
            }
        }
        let ctx = AnalysisContext::new("").with_amounts(amounts);
        let result = detector().detect(&ctx).unwrap();
        let mad = result.indicators["mean_absolute_deviation"].as_f64().unwrap();
        assert!(mad > 0.015 && mad <= 0.03, "mad = {mad}");
        assert!(result.score >= 10.0 && result.score <= 20.0);
    }

    #[test]
    fn test_zero_min_numbers_rejected() {
        let config = BenfordConfig {
            min_numbers: 0,
            ..BenfordConfig::default()
        };
        assert!(matches!(
            BenfordDetector::new(&config),
            Err(SignalError::Config(_))
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let config = BenfordConfig {
            weight: -1.0,
            ..BenfordConfig::default()
        };
        assert!(BenfordDetector::new(&config).is_err());
    }
}
