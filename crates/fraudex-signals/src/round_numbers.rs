//! Round-number bias detection.
//!
//! Invented invoices and padded estimates are full of figures like
//! `$50,000.00`; amounts that come out of real transactions rarely are.

use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, SignalResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::extract::{amounts_by_offset, compile_all, round_to, AMOUNT};

/// Detector identifier.
pub const ROUND_NUMBERS: &str = "round_numbers";

/// Amounts below this are not considered.
const MIN_AMOUNT: f64 = 100.0;

/// Configuration for [`RoundNumberDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundNumberConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_round_weight")]
    pub weight: f64,
    /// Minimum number of amounts ≥ 100 required.
    #[serde(default = "default_min_amounts")]
    pub min_amounts: usize,
}

fn default_round_weight() -> f64 {
    1.0
}

fn default_min_amounts() -> usize {
    3
}

impl Default for RoundNumberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_round_weight(),
            min_amounts: default_min_amounts(),
        }
    }
}

/// Why an amount counts as round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Roundness {
    ExactThousands,
    ExactHundreds,
    NoCents,
    RepeatedDigit,
    ManyTrailingZeros,
}

impl Roundness {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactThousands => "exact_thousands",
            Self::ExactHundreds => "exact_hundreds",
            Self::NoCents => "no_cents",
            Self::RepeatedDigit => "repeated_digit",
            Self::ManyTrailingZeros => "many_trailing_zeros",
        }
    }
}

/// Classify an amount, checking the strongest form of roundness first.
pub fn classify_roundness(amount: f64) -> Option<Roundness> {
    if !amount.is_finite() || amount < MIN_AMOUNT {
        return None;
    }
    if amount >= 1000.0 && amount % 1000.0 == 0.0 {
        return Some(Roundness::ExactThousands);
    }
    if amount % 100.0 == 0.0 {
        return Some(Roundness::ExactHundreds);
    }
    if amount >= 1000.0 && amount.fract() == 0.0 {
        return Some(Roundness::NoCents);
    }

    let integral = format!("{:.0}", amount.trunc());
    if integral.len() >= 4 {
        let first = integral.as_bytes()[0];
        if integral.bytes().all(|b| b == first) {
            return Some(Roundness::RepeatedDigit);
        }
        let trailing_zeros = integral.len() - integral.trim_end_matches('0').len();
        if trailing_zeros >= 3 {
            return Some(Roundness::ManyTrailingZeros);
        }
    }
    None
}

/// Flags a high share of suspiciously round monetary amounts.
pub struct RoundNumberDetector {
    weight: f64,
    min_amounts: usize,
    amount_patterns: Vec<Regex>,
}

impl RoundNumberDetector {
    /// Create a detector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight.
    pub fn new(config: &RoundNumberConfig) -> Result<Self> {
        Ok(Self {
            weight: validate_weight(ROUND_NUMBERS, config.weight)?,
            min_amounts: config.min_amounts,
            amount_patterns: compile_all([
                ("currency_prefixed", format!(r"\$\s*(?P<amount>{AMOUNT})")),
                (
                    "currency_suffixed",
                    format!(r"(?i)\b(?P<amount>{AMOUNT})\s*(?:USD|dollars?)\b"),
                ),
                (
                    "keyword_adjacent",
                    format!(
                        r"(?i)\b(?:USD|amount|total|sum|payment|invoice)[:\s]+\$?\s*(?P<amount>{AMOUNT})"
                    ),
                ),
            ])?,
        })
    }

    /// Monetary amounts ≥ 100 found in the text, followed by pre-extracted amounts.
    pub fn extract_amounts(&self, context: &AnalysisContext) -> Vec<f64> {
        amounts_by_offset(&context.text, &self.amount_patterns)
            .into_iter()
            .map(|(_, v)| v)
            .chain(context.amounts.iter().copied())
            .filter(|a| *a >= MIN_AMOUNT)
            .collect()
    }
}

impl Detector for RoundNumberDetector {
    fn name(&self) -> &'static str {
        ROUND_NUMBERS
    }

    fn description(&self) -> &'static str {
        "Round number bias analysis"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let amounts = self.extract_amounts(context);
        let total = amounts.len();

        if total < self.min_amounts || total == 0 {
            return Ok(SignalResult::new(ROUND_NUMBERS, self.weight, 0.0, 0.3)
                .with_indicator("amounts_found", total)
                .with_indicator("min_required", self.min_amounts)
                .with_explanation(format!(
                    "Insufficient monetary amounts for analysis ({total} found)."
                )));
        }

        let mut round_amounts = Vec::new();
        let mut roundness_types = Map::new();
        for amount in &amounts {
            if let Some(kind) = classify_roundness(*amount) {
                round_amounts.push(*amount);
                let count = roundness_types
                    .entry(kind.as_str())
                    .or_insert(Value::from(0u64));
                *count = Value::from(count.as_u64().unwrap_or(0) + 1);
            }
        }

        let round_count = round_amounts.len();
        let round_ratio = round_count as f64 / total as f64;

        let (mut score, mut confidence) = if round_ratio > 0.8 && round_count >= 5 {
            (30.0, 0.85)
        } else if round_ratio > 0.6 && round_count >= 4 {
            (20.0, 0.75)
        } else if round_ratio > 0.4 && round_count >= 3 {
            (10.0, 0.65)
        } else {
            (0.0, 0.7)
        };

        let exact_thousands = roundness_types
            .get(Roundness::ExactThousands.as_str())
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if exact_thousands >= 3 {
            score += 10.0;
            confidence = f64::min(confidence + 0.1, 1.0);
        }

        let percent = (round_ratio * 100.0).round();
        let explanation = if score > 0.0 {
            let types = roundness_types
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "High prevalence of round numbers: {round_count}/{total} amounts ({percent}%) \
                 are suspiciously round. Types: {types}. This pattern may indicate estimates, \
                 fabricated invoices, or price manipulation."
            )
        } else {
            format!(
                "Amount distribution appears normal: {round_count}/{total} ({percent}%) round \
                 amounts, within expected range."
            )
        };

        let sample: Vec<f64> = round_amounts.iter().take(10).copied().collect();

        Ok(SignalResult::new(ROUND_NUMBERS, self.weight, score, confidence)
            .with_indicator("total_amounts", total)
            .with_indicator("round_amounts", round_count)
            .with_indicator("round_ratio", round_to(round_ratio, 3))
            .with_indicator("roundness_types", roundness_types)
            .with_indicator("sample_round_amounts", sample)
            .with_explanation(explanation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> RoundNumberDetector {
        RoundNumberDetector::new(&RoundNumberConfig::default()).unwrap()
    }

    #[test]
    fn test_classify_roundness() {
        assert_eq!(classify_roundness(99.0), None);
        assert_eq!(classify_roundness(5000.0), Some(Roundness::ExactThousands));
        assert_eq!(classify_roundness(700.0), Some(Roundness::ExactHundreds));
        assert_eq!(classify_roundness(1234.0), Some(Roundness::NoCents));
        assert_eq!(classify_roundness(1111.5), Some(Roundness::RepeatedDigit));
        assert_eq!(
            classify_roundness(25000.5),
            Some(Roundness::ManyTrailingZeros)
        );
        assert_eq!(classify_roundness(1234.56), None);
        assert_eq!(classify_roundness(345.0), None);
    }

    #[test]
    fn test_all_round_thousands() {
        let ctx = AnalysisContext::new("Payments: $1000, $2000, $3000, $4000, $5000");
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.indicators["round_ratio"], json!(1.0));
        assert!(result.score >= 30.0);
        // Five exact-thousand amounts add the bonus on top of the ratio tier.
        assert_eq!(result.score, 40.0);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_mostly_round_tier() {
        let ctx = AnalysisContext::new("").with_amounts(vec![400.0, 700.0, 800.0, 900.0, 123.45]);
        let result = detector().detect(&ctx).unwrap();
        // 4 of 5 round: ratio 0.8 is not above 0.8, so the 20-point tier applies.
        assert_eq!(result.score, 20.0);
        assert_eq!(result.confidence, 0.75);
    }

    #[test]
    fn test_mostly_round_with_thousands_bonus() {
        let ctx = AnalysisContext::new("")
            .with_amounts(vec![1_000.0, 2_000.0, 3_000.0, 4_000.0, 1_234.56]);
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.score, 30.0);
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert_eq!(result.indicators["roundness_types"]["exact_thousands"], json!(4));
    }

    #[test]
    fn test_thousands_bonus_on_low_ratio() {
        let ctx = AnalysisContext::new("").with_amounts(vec![
            1_000.0, 2_000.0, 3_000.0, 123.45, 234.56, 345.67, 456.78, 567.89,
        ]);
        let result = detector().detect(&ctx).unwrap();
        // 3 of 8 round stays in the zero tier; three exact thousands still add 10.
        assert_eq!(result.score, 10.0);
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_written_amount_counted_once() {
        let d = detector();
        let ctx = AnalysisContext::new("Invoice total: $12,500.00 and 300 USD");
        assert_eq!(d.extract_amounts(&ctx), vec![12500.0, 300.0]);
    }

    #[test]
    fn test_precise_amounts_not_flagged() {
        let ctx = AnalysisContext::new("Charges of $1,234.56, $2,987.12, $845.33 and $4,021.90.");
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.indicators["round_amounts"], json!(0));
        assert!(result.explanation.contains("appears normal"));
    }

    #[test]
    fn test_insufficient_amounts() {
        let ctx = AnalysisContext::new("One payment of $5000.").with_amounts(vec![50.0]);
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.indicators["amounts_found"], json!(1));
    }

    #[test]
    fn test_pre_extracted_amounts_used() {
        let ctx = AnalysisContext::new("").with_amounts(vec![400.0, 800.0, 900.0, 123.45]);
        let result = detector().detect(&ctx).unwrap();
        // 3 of 4 round: ratio 0.75 with three round amounts lands in the 10-point tier.
        assert_eq!(result.score, 10.0);
        assert_eq!(result.indicators["roundness_types"]["exact_hundreds"], json!(3));
    }
}
