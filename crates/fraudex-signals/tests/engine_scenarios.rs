//! End-to-end scenarios for the signal engine.
//!
//! Each scenario feeds a realistic document through the default ensemble (or
//! a single detector) and checks the properties downstream layers rely on:
//! score and confidence bounds, ranking of top factors, failure isolation and
//! the persisted `signals` shape.

use fraudex_core::{
    AnalysisContext, Detector, Result, RiskLevel, SignalError, SignalResult,
};
use fraudex_signals::benford::expected_frequency;
use fraudex_signals::{
    compute_risk_score, format_report, BenfordConfig, BenfordDetector, EngineConfig,
    KeywordDetector, RoundNumberConfig, RoundNumberDetector, SignalEngine, SplitInvoiceConfig,
    SplitInvoiceDetector,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const PROCUREMENT_MEMO: &str = "\
RFP 2024-17 bid summary, prepared 03/29/2024.

Bid from Acme Construction: $98,100
Bid from Beta Builders: $99,050
Bid from Gamma Works: $97,900
Bid from Delta Group: $131,450

Invoice #4410 - $9,500.00 for site survey, dated 2024-03-30.
Invoice #4411 - $9,750.00 for permits, dated 2024-03-30.
Invoice #4412 - $9,200.00 for materials, dated 2024-03-30.

The director wants this approved today. Please skip the review; the usual
gift for the committee has been arranged through our intermediary offshore.
";

const BENIGN_TEXT: &str = "Minutes of the weekly planning meeting. The team reviewed the \
                           roadmap and agreed to revisit staffing next quarter.";

fn engine() -> SignalEngine {
    SignalEngine::with_default_detectors().unwrap()
}

fn assert_bounds(result: &SignalResult) {
    assert!(
        (0.0..=100.0).contains(&result.score),
        "{} score out of range: {}",
        result.detector_name,
        result.score
    );
    assert!(
        (0.0..=1.0).contains(&result.confidence),
        "{} confidence out of range: {}",
        result.detector_name,
        result.confidence
    );
}

/// `count` amounts whose leading digit is `digit`, all at least 10.
fn amounts_with_leading(digit: u32, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| f64::from(digit) * 100.0 + 13.0 + i as f64)
        .collect()
}

struct BrokenDetector;

impl Detector for BrokenDetector {
    fn name(&self) -> &'static str {
        "broken"
    }
    fn description(&self) -> &'static str {
        "fails on every input"
    }
    fn weight(&self) -> f64 {
        2.0
    }
    fn detect(&self, _context: &AnalysisContext) -> Result<SignalResult> {
        Err(SignalError::Detector("upstream parser unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Whole-ensemble scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_procurement_memo() {
    let result = engine().analyze(&AnalysisContext::new(PROCUREMENT_MEMO));

    assert_eq!(result.detector_results.len(), 7);
    result.detector_results.iter().for_each(assert_bounds);
    assert!(result.risk_score > 0);
    assert!(result.top_factors.len() <= 5);

    // Strongest contribution: complementary and close bids around one outlier.
    assert_eq!(result.top_factors[0].detector, "bid_rigging");
    let bids = &result.signals.detector_breakdown["bid_rigging"];
    let patterns = bids.indicators["patterns_detected"].as_array().unwrap();
    assert!(patterns.contains(&json!("complementary_bids")));
    assert!(patterns.contains(&json!("suspiciously_close_bids")));

    for name in ["split_invoice", "keywords", "urgency", "velocity"] {
        assert!(
            result.signals.detector_breakdown[name].score > 0.0,
            "{name} should trigger on the memo"
        );
    }
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.starts_with("Investigate vendor relationships")));
    assert!(result.explanation.contains("bid_rigging"));
}

#[test]
fn test_top_factors_ranked_by_contribution() {
    let result = engine().analyze(&AnalysisContext::new(PROCUREMENT_MEMO));
    let contribution = |name: &str| {
        result
            .detector_results
            .iter()
            .find(|r| r.detector_name == name)
            .map(SignalResult::contribution)
            .unwrap()
    };
    let ranked: Vec<f64> = result
        .top_factors
        .iter()
        .map(|f| contribution(&f.detector))
        .collect();
    assert!(ranked.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_benign_text() {
    let result = engine().analyze(&AnalysisContext::new(BENIGN_TEXT));
    assert_eq!(result.risk_score, 0);
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert_eq!(result.confidence, 0.5);
    assert!(result.top_factors.is_empty());
    assert!(result.recommendations.is_empty());
    result.detector_results.iter().for_each(assert_bounds);
}

#[test]
fn test_pathological_inputs_do_not_fail() {
    let engine = engine();
    for text in [
        "",
        "$$$$$$ ,,,, .... 0000",
        "9999999999999999999999999999999999999999",
        "Invoice Invoice Invoice $ $ $",
        "ééé 🙂 bribe 🙂 ééé",
    ] {
        let result = engine.analyze(&AnalysisContext::new(text));
        assert_eq!(result.detector_results.len(), 7);
        result.detector_results.iter().for_each(assert_bounds);
        assert!(result.risk_score <= 100);
    }
}

#[test]
fn test_failing_detector_does_not_abort_batch() {
    let keywords = KeywordDetector::new(&Default::default()).unwrap();
    let engine = SignalEngine::new(vec![Box::new(BrokenDetector), Box::new(keywords)]).unwrap();

    let result = engine.analyze(&AnalysisContext::new("A bribe and a kickback were paid."));
    let broken = &result.detector_results[0];
    assert_eq!(broken.score, 0.0);
    assert_eq!(broken.confidence, 0.0);
    assert_eq!(broken.indicators["error"], json!("upstream parser unavailable"));

    // 40 · 1.0 · 0.7 / 1.0; the broken detector's weight is not counted.
    assert_eq!(result.risk_score, 28);
    assert_eq!(result.risk_level, RiskLevel::Medium);
    assert_eq!(result.signals.detector_breakdown["broken"].confidence, 0.0);
}

#[test]
fn test_signals_shape_is_stable() {
    let (_, signals, _) = compute_risk_score(&engine(), PROCUREMENT_MEMO);
    let value = serde_json::to_value(&signals).unwrap();
    for key in [
        "risk_level",
        "confidence",
        "top_factors",
        "recommendations",
        "detectors_triggered",
        "detector_breakdown",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    let factor = &value["top_factors"][0];
    for key in [
        "detector",
        "score_contribution",
        "confidence",
        "explanation",
        "key_indicators",
    ] {
        assert!(factor.get(key).is_some(), "top factor missing {key}");
    }
    let breakdown = &value["detector_breakdown"]["velocity"];
    for key in ["score", "weight", "confidence", "indicators"] {
        assert!(breakdown.get(key).is_some(), "breakdown missing {key}");
    }
}

#[test]
fn test_report_from_memo() {
    let (_, signals, _) = compute_risk_score(&engine(), PROCUREMENT_MEMO);
    let report = format_report(&signals, Some("Vendors share a registered address."));
    assert!(report.starts_with("## Risk Analysis Report"));
    assert!(report.contains("**1. Bid Rigging**"));
    assert!(report.contains("### Narrative Analysis\n\nVendors share a registered address."));
}

#[test]
fn test_custom_keywords_through_config_do_not_leak() {
    let mut config = EngineConfig::default();
    config
        .keywords
        .custom_keywords
        .insert("bribery".to_string(), vec!["sweetener".to_string()]);
    let custom = SignalEngine::from_config(&config).unwrap();
    let plain = engine();

    let ctx = AnalysisContext::new("A sweetener was added to the contract.");
    assert!(custom.analyze(&ctx).risk_score > 0);
    assert_eq!(plain.analyze(&ctx).risk_score, 0);
}

// ---------------------------------------------------------------------------
// Detector-level properties
// ---------------------------------------------------------------------------

#[test]
fn test_benford_conforming_sample_scores_zero() {
    // 50 amounts whose leading digits follow log10(1 + 1/d) as closely as
    // whole counts allow: 15, 9, 6, 5, 4, 3, 3, 3, 2.
    let counts = [15usize, 9, 6, 5, 4, 3, 3, 3, 2];
    let amounts: Vec<f64> = counts
        .iter()
        .zip(1u32..)
        .flat_map(|(&n, digit)| amounts_with_leading(digit, n))
        .collect();
    assert_eq!(amounts.len(), 50);
    for (d, &n) in (1u8..).zip(&counts) {
        assert!((n as f64 - 50.0 * expected_frequency(d)).abs() < 1.0);
    }

    let detector = BenfordDetector::new(&BenfordConfig::default()).unwrap();
    let result = detector
        .detect(&AnalysisContext::default().with_amounts(amounts))
        .unwrap();
    assert_eq!(result.score, 0.0);
    assert_eq!(result.indicators["sample_size"], json!(50));
}

#[test]
fn test_benford_all_nines() {
    let detector = BenfordDetector::new(&BenfordConfig::default()).unwrap();
    let result = detector
        .detect(&AnalysisContext::default().with_amounts(amounts_with_leading(9, 50)))
        .unwrap();
    assert!(result.score >= 35.0);
    assert!(result.confidence >= 0.85);
}

#[test]
fn test_round_numbers_all_round() {
    let detector = RoundNumberDetector::new(&RoundNumberConfig::default()).unwrap();
    let result = detector
        .detect(&AnalysisContext::new(
            "Payments: $1000, $2000, $3000, $4000, $5000",
        ))
        .unwrap();
    assert_eq!(result.indicators["round_ratio"], json!(1.0));
    assert!(result.score >= 30.0);
}

#[test]
fn test_split_invoice_near_threshold() {
    let detector = SplitInvoiceDetector::new(&SplitInvoiceConfig::default()).unwrap();

    let from_text = detector
        .detect(&AnalysisContext::new(
            "Invoice #101: $4,800.00\nInvoice #102: $4,900.00",
        ))
        .unwrap();
    let from_amounts = detector
        .detect(&AnalysisContext::default().with_amounts(vec![4_800.0, 4_900.0]))
        .unwrap();

    for result in [&from_text, &from_amounts] {
        assert!(result.score >= 20.0);
        let splits = result.indicators["suspicious_splits"].as_array().unwrap();
        assert!(!splits.is_empty());
        assert_eq!(splits[0]["threshold"], json!(5000.0));
        assert_eq!(splits[0]["combined_total"], json!(9700.0));
    }
}

#[test]
fn test_keyword_bribery_pair() {
    let result = engine().analyze(&AnalysisContext::new(
        "The memo mentions a bribe and a kickback.",
    ));
    assert_eq!(result.signals.detector_breakdown["keywords"].score, 40.0);
}
