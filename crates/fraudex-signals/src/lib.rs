//! Heuristic fraud and corruption signal detectors for fraudex
//!
//! This crate provides an ensemble of independent detectors that each inspect
//! a document's text (plus any pre-extracted amounts and dates) for one family
//! of red flags, and a [`SignalEngine`] that combines their results into a
//! single weighted risk assessment.
//!
//! | Detector | Looks for | Default weight |
//! |----------|-----------|----------------|
//! | [`BenfordDetector`] | leading digits that drift from Benford's Law | 1.2 |
//! | [`RoundNumberDetector`] | an excess of round monetary amounts | 1.0 |
//! | [`SplitInvoiceDetector`] | invoices split to stay under approval limits | 1.3 |
//! | [`BidRiggingDetector`] | identical, complementary or sequential bids | 1.4 |
//! | [`KeywordDetector`] | bribery, concealment and conflict vocabulary | 1.0 |
//! | [`UrgencyDetector`] | pressure to skip review | 0.9 |
//! | [`VelocityDetector`] | weekend, same-day and month-end clustering | 0.8 |
//!
//! # Example
//!
//! ```
//! use fraudex_core::AnalysisContext;
//! use fraudex_signals::SignalEngine;
//!
//! let engine = SignalEngine::with_default_detectors().unwrap();
//! let result = engine.analyze(&AnalysisContext::new("A kickback was arranged."));
//! assert!(result.risk_score > 0);
//! assert_eq!(result.top_factors[0].detector, "keywords");
//! ```

pub mod benford;
pub mod bid_rigging;
pub mod engine;
mod extract;
pub mod keywords;
pub mod report;
pub mod round_numbers;
pub mod scoring;
pub mod split_invoice;
pub mod urgency;
pub mod velocity;

pub use benford::{BenfordConfig, BenfordDetector};
pub use bid_rigging::{BidRiggingConfig, BidRiggingDetector};
pub use engine::{EngineConfig, SignalEngine};
pub use keywords::{KeywordConfig, KeywordDetector};
pub use report::format_report;
pub use round_numbers::{RoundNumberConfig, RoundNumberDetector};
pub use scoring::{compute_risk_score, compute_risk_score_detailed, DetailedRiskAssessment};
pub use split_invoice::{SplitInvoiceConfig, SplitInvoiceDetector};
pub use urgency::{UrgencyConfig, UrgencyDetector};
pub use velocity::{VelocityConfig, VelocityDetector};

/// Serde default for every detector's `enabled` flag.
pub(crate) fn default_enabled() -> bool {
    true
}
