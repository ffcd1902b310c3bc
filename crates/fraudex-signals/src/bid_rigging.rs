//! Bid-rigging and collusion pattern detection.
//!
//! Extracts bid amounts (with the bidding vendor where one is named) and looks
//! for five independent coordination patterns:
//!
//! | Pattern | Score |
//! |---------|-------|
//! | Identical bid amounts | 25 |
//! | Pairs of bids within 1% of each other | 20 |
//! | More than half the bids on round thousands | 10 |
//! | Losing bids within a 5% band, apart from the winner | 30 |
//! | The same spacing between sorted bids recurring | 15 |
//!
//! Pattern scores are summed (capped at 100); each detected pattern adds 0.1
//! to a 0.6 base confidence, capped at 0.95.

use std::collections::BTreeMap;

use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, SignalResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extract::{cents, compile_all, parse_amount, round_to, AMOUNT};

/// Detector identifier.
pub const BID_RIGGING: &str = "bid_rigging";

/// Words that mark a document as procurement-related.
const BID_CONTEXT_KEYWORDS: &[&str] = &[
    "bid",
    "quote",
    "proposal",
    "tender",
    "rfp",
    "rfq",
    "procurement",
];

/// Configuration for [`BidRiggingDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRiggingConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_bid_weight")]
    pub weight: f64,
}

fn default_bid_weight() -> f64 {
    1.4
}

impl Default for BidRiggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_bid_weight(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bid extraction
// ---------------------------------------------------------------------------

/// A bid pulled out of the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Bidding vendor, when the text names one.
    pub vendor: Option<String>,
    pub amount: f64,
    /// The matched source text.
    pub raw: String,
}

/// Coordination patterns, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidPattern {
    IdenticalBids,
    SuspiciouslyCloseBids,
    ExcessiveRoundBids,
    ComplementaryBids,
    SequentialBids,
}

impl BidPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdenticalBids => "identical_bids",
            Self::SuspiciouslyCloseBids => "suspiciously_close_bids",
            Self::ExcessiveRoundBids => "excessive_round_bids",
            Self::ComplementaryBids => "complementary_bids",
            Self::SequentialBids => "sequential_bids",
        }
    }

    /// Fixed score contribution of this pattern.
    pub fn score(self) -> f64 {
        match self {
            Self::IdenticalBids => 25.0,
            Self::ComplementaryBids => 30.0,
            Self::SuspiciouslyCloseBids => 20.0,
            Self::SequentialBids => 15.0,
            Self::ExcessiveRoundBids => 10.0,
        }
    }
}

/// One detected pattern with its evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternFinding {
    pub pattern: BidPattern,
    pub description: String,
    pub details: Value,
}

impl PatternFinding {
    fn to_json(&self) -> Value {
        json!({
            "type": self.pattern.as_str(),
            "description": self.description,
            "details": self.details,
        })
    }
}

/// Run all five pattern checks over a set of bid amounts.
///
/// Fewer than two bids cannot show coordination and yield no findings.
pub fn detect_bid_patterns(amounts: &[f64]) -> Vec<PatternFinding> {
    if amounts.len() < 2 {
        return Vec::new();
    }

    let mut unique: Vec<f64> = amounts.to_vec();
    unique.sort_by(f64::total_cmp);
    unique.dedup_by(|a, b| cents(*a) == cents(*b));

    [
        identical_bids(amounts),
        close_bids(&unique),
        round_bids(amounts),
        complementary_bids(amounts),
        sequential_bids(&unique),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Amounts bid more than once, in first-seen order.
fn identical_bids(amounts: &[f64]) -> Option<PatternFinding> {
    let mut counts: Vec<(i64, f64, usize)> = Vec::new();
    for &amount in amounts {
        let key = cents(amount);
        match counts.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.2 += 1,
            None => counts.push((key, amount, 1)),
        }
    }
    let identical: Vec<Value> = counts
        .iter()
        .filter(|(_, _, n)| *n > 1)
        .map(|(_, amount, n)| json!([amount, n]))
        .collect();
    (!identical.is_empty()).then(|| PatternFinding {
        pattern: BidPattern::IdenticalBids,
        description: format!("Found {} identical bid amounts", identical.len()),
        details: Value::from(identical),
    })
}

/// Every pair of distinct amounts within 1% of the lower one.
fn close_bids(unique_sorted: &[f64]) -> Option<PatternFinding> {
    let mut pairs = Vec::new();
    for (i, &low) in unique_sorted.iter().enumerate() {
        if low <= 0.0 {
            continue;
        }
        for &high in &unique_sorted[i + 1..] {
            let diff_pct = (high - low).abs() / low;
            if diff_pct < 0.01 {
                pairs.push((low, high, diff_pct));
            }
        }
    }
    (!pairs.is_empty()).then(|| PatternFinding {
        pattern: BidPattern::SuspiciouslyCloseBids,
        description: format!(
            "Found {} pairs of bids within 1% of each other",
            pairs.len()
        ),
        details: pairs
            .iter()
            .take(5)
            .map(|(a, b, pct)| json!([a, b, round_to(*pct, 4)]))
            .collect(),
    })
}

/// More than half of all bids are whole thousands.
fn round_bids(amounts: &[f64]) -> Option<PatternFinding> {
    let round: Vec<f64> = amounts
        .iter()
        .copied()
        .filter(|a| *a >= 1000.0 && cents(*a) % 100_000 == 0)
        .collect();
    (round.len() * 2 > amounts.len()).then(|| PatternFinding {
        pattern: BidPattern::ExcessiveRoundBids,
        description: format!(
            "{}/{} bids are round thousands",
            round.len(),
            amounts.len()
        ),
        details: Value::from(round),
    })
}

/// Losing bids packed into a narrow band while the winner stands apart.
fn complementary_bids(amounts: &[f64]) -> Option<PatternFinding> {
    if amounts.len() < 3 {
        return None;
    }
    let mut sorted = amounts.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (&highest, others) = sorted.split_last()?;
    let (&lowest_other, &highest_other) = (others.first()?, others.last()?);

    if highest <= 0.0 || cents(highest) == cents(highest_other) {
        return None;
    }
    let spread = (highest_other - lowest_other) / highest;
    (spread < 0.05 && others.len() >= 2).then(|| PatternFinding {
        pattern: BidPattern::ComplementaryBids,
        description: "Losing bids suspiciously clustered, suggesting rotation scheme".to_string(),
        details: json!({
            "winning_bid": highest,
            "losing_bids": others,
            "losing_spread_pct": round_to(spread, 4),
        }),
    })
}

/// The most common positive gap between consecutive distinct bids, seen ≥ 2 times.
fn sequential_bids(unique_sorted: &[f64]) -> Option<PatternFinding> {
    let diffs: Vec<i64> = unique_sorted
        .windows(2)
        .map(|w| cents(w[1]) - cents(w[0]))
        .collect();
    if diffs.len() < 2 {
        return None;
    }

    let mut counts: Vec<(i64, usize)> = Vec::new();
    for diff in diffs.into_iter().filter(|d| *d > 0) {
        match counts.iter_mut().find(|(d, _)| *d == diff) {
            Some(entry) => entry.1 += 1,
            None => counts.push((diff, 1)),
        }
    }
    // First-seen difference wins ties.
    let (diff, occurrences) = counts
        .iter()
        .copied()
        .fold(None, |best: Option<(i64, usize)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })?;

    let common_difference = diff as f64 / 100.0;
    (occurrences >= 2).then(|| PatternFinding {
        pattern: BidPattern::SequentialBids,
        description: format!("Bids follow arithmetic pattern (diff={common_difference})"),
        details: json!({
            "common_difference": common_difference,
            "occurrences": occurrences,
        }),
    })
}

// ---------------------------------------------------------------------------
// BidRiggingDetector
// ---------------------------------------------------------------------------

/// Flags bid sets that look coordinated.
pub struct BidRiggingDetector {
    weight: f64,
    bid_patterns: Vec<Regex>,
}

impl BidRiggingDetector {
    /// Create a detector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight.
    pub fn new(config: &BidRiggingConfig) -> Result<Self> {
        Ok(Self {
            weight: validate_weight(BID_RIGGING, config.weight)?,
            bid_patterns: compile_all([
                (
                    "labelled_bid",
                    format!(
                        r"(?i)\b(?:bid|quote|proposal|offer)[#:\s]*(?:from\s+)?(?P<vendor>[A-Za-z\s&]+)?[:\s]*\$?\s*(?P<amount>{AMOUNT})"
                    ),
                ),
                (
                    "vendor_dollar",
                    format!(
                        r"(?i)(?P<vendor>[A-Za-z\s&]+)\s*(?:bid|quote|proposal)?[:\s]+\$\s*(?P<amount>{AMOUNT})"
                    ),
                ),
                (
                    "vendor_id",
                    format!(
                        r"(?i)\bvendor\s*[#:\s]*(?P<vendor>\d+|[A-Za-z]+)[:\s]*\$?\s*(?P<amount>{AMOUNT})"
                    ),
                ),
            ])?,
        })
    }

    /// Bids found in the text, one per written amount, in text order.
    pub fn extract_bids(&self, text: &str) -> Vec<Bid> {
        let mut by_offset: BTreeMap<usize, Bid> = BTreeMap::new();
        for regex in &self.bid_patterns {
            for caps in regex.captures_iter(text) {
                let Some(amount_match) = caps.name("amount") else {
                    continue;
                };
                let Some(amount) = parse_amount(amount_match.as_str()) else {
                    continue;
                };
                let vendor = caps
                    .name("vendor")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|v| !v.is_empty());
                let raw = caps.get(0).map_or("", |m| m.as_str()).trim().to_string();
                by_offset
                    .entry(amount_match.start())
                    .or_insert(Bid { vendor, amount, raw });
            }
        }
        by_offset.into_values().collect()
    }

    fn has_bid_context(text: &str) -> bool {
        let lower = text.to_lowercase();
        BID_CONTEXT_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }
}

impl Detector for BidRiggingDetector {
    fn name(&self) -> &'static str {
        BID_RIGGING
    }

    fn description(&self) -> &'static str {
        "Bid rigging and collusion pattern detection"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let bids = self.extract_bids(&context.text);
        let has_context = Self::has_bid_context(&context.text);

        if bids.is_empty() {
            let result = if has_context {
                SignalResult::new(BID_RIGGING, self.weight, 0.0, 0.4)
                    .with_indicator("bid_context", true)
                    .with_indicator("bids_extracted", 0)
                    .with_explanation(
                        "Bidding context found but no structured bid data extracted.",
                    )
            } else {
                SignalResult::new(BID_RIGGING, self.weight, 0.0, 0.5)
                    .with_indicator("bid_context", false)
                    .with_explanation("No bidding/procurement context detected.")
            };
            return Ok(result);
        }

        let amounts: Vec<f64> = bids.iter().map(|b| b.amount).collect();
        let findings = detect_bid_patterns(&amounts);

        let mut score = 0.0;
        let mut confidence: f64 = 0.6;
        for finding in &findings {
            score += finding.pattern.score();
            confidence = (confidence + 0.1).min(0.95);
        }
        let score = f64::min(score, 100.0);

        let pattern_names: Vec<&str> = findings.iter().map(|f| f.pattern.as_str()).collect();
        let explanation = if score > 0.0 {
            let descriptions = findings
                .iter()
                .take(3)
                .map(|f| f.description.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "Potential bid rigging indicators: {}. {descriptions}. These patterns may \
                 indicate collusion or bid manipulation.",
                pattern_names.join(", ")
            )
        } else {
            "No bid rigging patterns detected in the extracted bid data.".to_string()
        };

        let mut unique = amounts.clone();
        unique.sort_by(f64::total_cmp);
        unique.dedup_by(|a, b| cents(*a) == cents(*b));

        let risk_indicators: Vec<Value> = findings.iter().map(PatternFinding::to_json).collect();

        Ok(SignalResult::new(BID_RIGGING, self.weight, score, confidence)
            .with_indicator("bids_analyzed", bids.len())
            .with_indicator("patterns_detected", pattern_names)
            .with_indicator("risk_indicators", risk_indicators)
            .with_indicator(
                "bid_summary",
                json!({ "count": bids.len(), "unique_amounts": unique.len() }),
            )
            .with_indicator("bids", serde_json::to_value(&bids)?)
            .with_explanation(explanation))
    }
}
