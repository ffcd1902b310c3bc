//! Suspicious keyword and phrase detection.
//!
//! Terms are grouped into weighted categories. Each category scores
//! `unique terms matched × 10 × category weight`, and the detector total is
//! capped at 50 so vocabulary alone can never dominate the ensemble.

use std::collections::BTreeMap;

use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, SignalError, SignalResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::extract::{compile, context_window, round_to};

/// Detector identifier.
pub const KEYWORDS: &str = "keywords";

/// Characters of surrounding text kept with each hit.
const CONTEXT_RADIUS: usize = 50;

/// Weight given to categories introduced through custom keywords.
const CUSTOM_CATEGORY_WEIGHT: f64 = 1.0;

const MAX_SCORE: f64 = 50.0;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// A named, weighted list of terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCategory {
    pub name: String,
    pub weight: f64,
    pub terms: Vec<String>,
}

impl KeywordCategory {
    fn new(name: &str, weight: f64, terms: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            weight,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Append terms not already present (compared case-insensitively).
    fn extend_terms(&mut self, terms: &[String]) {
        for term in terms {
            let term = term.trim();
            if !self.terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                self.terms.push(term.to_string());
            }
        }
    }
}

/// The built-in categories. Every call returns freshly owned data.
pub fn default_categories() -> Vec<KeywordCategory> {
    vec![
        KeywordCategory::new(
            "bribery",
            2.0,
            &[
                "bribe",
                "kickback",
                "payoff",
                "grease payment",
                "facilitation payment",
                "under the table",
                "cash payment",
                "gift",
                "gratuity",
                "inducement",
            ],
        ),
        KeywordCategory::new(
            "concealment",
            1.8,
            &[
                "off-book",
                "undisclosed",
                "hidden",
                "secret",
                "confidential arrangement",
                "side agreement",
                "unofficial",
                "unrecorded",
                "destroy records",
            ],
        ),
        KeywordCategory::new(
            "pressure",
            1.5,
            &[
                "must approve",
                "no questions",
                "bypass",
                "override",
                "expedite approval",
                "special handling",
                "exception",
                "waive requirement",
                "ignore policy",
            ],
        ),
        KeywordCategory::new(
            "shell_entities",
            1.7,
            &[
                "shell company",
                "nominee",
                "offshore",
                "bearer shares",
                "trust account",
                "intermediary",
                "proxy",
                "front company",
                "special purpose vehicle",
            ],
        ),
        KeywordCategory::new(
            "conflicts",
            1.6,
            &[
                "conflict of interest",
                "related party",
                "family member",
                "personal relationship",
                "undisclosed relationship",
                "competing interest",
                "self-dealing",
            ],
        ),
        KeywordCategory::new(
            "financial_irregularity",
            1.9,
            &[
                "cash only",
                "no receipt",
                "no invoice",
                "falsified",
                "inflated",
                "duplicate payment",
                "phantom",
                "fictitious",
                "overbilling",
            ],
        ),
    ]
}

/// Configuration for [`KeywordDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_keyword_weight")]
    pub weight: f64,
    /// Extra terms per category. Unknown categories are added with weight 1.0.
    #[serde(default)]
    pub custom_keywords: BTreeMap<String, Vec<String>>,
}

fn default_keyword_weight() -> f64 {
    1.0
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_keyword_weight(),
            custom_keywords: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// KeywordDetector
// ---------------------------------------------------------------------------

/// A single keyword occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub keyword: String,
    /// Byte offset of the match in the analysed text.
    pub position: usize,
    pub context: String,
}

struct CompiledCategory {
    category: KeywordCategory,
    matchers: Vec<Regex>,
}

/// Flags corruption-related vocabulary.
pub struct KeywordDetector {
    weight: f64,
    categories: Vec<CompiledCategory>,
}

impl KeywordDetector {
    /// Build a detector with the default categories merged with any
    /// custom keywords from the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight, an empty
    /// category name, or an empty term.
    pub fn new(config: &KeywordConfig) -> Result<Self> {
        let weight = validate_weight(KEYWORDS, config.weight)?;
        let mut categories = default_categories();

        for (name, terms) in &config.custom_keywords {
            if name.trim().is_empty() {
                return Err(SignalError::Config(
                    "Custom keyword category name must not be empty".to_string(),
                ));
            }
            if let Some(term) = terms.iter().find(|t| t.trim().is_empty()) {
                return Err(SignalError::Config(format!(
                    "Custom keyword category '{name}' contains an empty term ({term:?})"
                )));
            }
            match categories.iter_mut().find(|c| &c.name == name) {
                Some(existing) => existing.extend_terms(terms),
                None => {
                    let mut added = KeywordCategory {
                        name: name.clone(),
                        weight: CUSTOM_CATEGORY_WEIGHT,
                        terms: Vec::new(),
                    };
                    added.extend_terms(terms);
                    categories.push(added);
                }
            }
        }

        let categories = categories
            .into_iter()
            .map(|category| {
                let matchers = category
                    .terms
                    .iter()
                    .map(|term| {
                        compile(
                            &format!("{}:{term}", category.name),
                            &format!(r"(?i)\b{}\b", regex::escape(term)),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledCategory { category, matchers })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { weight, categories })
    }

    /// The categories this instance searches for, in scoring order.
    pub fn categories(&self) -> impl Iterator<Item = &KeywordCategory> {
        self.categories.iter().map(|c| &c.category)
    }

    /// All hits of one category, grouped by term in list order.
    fn find_hits(category: &CompiledCategory, text: &str) -> Vec<KeywordHit> {
        let mut hits = Vec::new();
        for (term, regex) in category.category.terms.iter().zip(&category.matchers) {
            for m in regex.find_iter(text) {
                hits.push(KeywordHit {
                    keyword: term.clone(),
                    position: m.start(),
                    context: context_window(text, m.start(), m.end(), CONTEXT_RADIUS)
                        .to_string(),
                });
            }
        }
        hits
    }
}

impl Detector for KeywordDetector {
    fn name(&self) -> &'static str {
        KEYWORDS
    }

    fn description(&self) -> &'static str {
        "Suspicious keyword and phrase detection"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let mut all_hits: Vec<KeywordHit> = Vec::new();
        let mut category_details = Map::new();
        let mut summaries = Vec::new();
        let mut raw_score = 0.0;

        for compiled in &self.categories {
            let hits = Self::find_hits(compiled, &context.text);
            if hits.is_empty() {
                continue;
            }

            let mut unique_terms: Vec<&str> = Vec::new();
            for hit in &hits {
                if !unique_terms.contains(&hit.keyword.as_str()) {
                    unique_terms.push(hit.keyword.as_str());
                }
            }
            let contribution = unique_terms.len() as f64 * 10.0 * compiled.category.weight;
            raw_score += contribution;

            let shown = unique_terms.iter().take(3).copied().collect::<Vec<_>>().join(", ");
            let ellipsis = if unique_terms.len() > 3 { "..." } else { "" };
            summaries.push(format!("{}: {shown}{ellipsis}", compiled.category.name));

            category_details.insert(
                compiled.category.name.clone(),
                json!({
                    "keywords_found": unique_terms,
                    "score_contribution": round_to(contribution, 2),
                }),
            );
            all_hits.extend(hits);
        }

        if all_hits.is_empty() {
            let checked: Vec<&str> = self.categories().map(|c| c.name.as_str()).collect();
            return Ok(SignalResult::new(KEYWORDS, self.weight, 0.0, 0.7)
                .with_indicator("categories_checked", checked)
                .with_explanation("No suspicious keywords detected."));
        }

        let triggered: Vec<String> = category_details.keys().cloned().collect();
        let score = f64::min(raw_score, MAX_SCORE);
        let confidence = f64::min(0.6 + triggered.len() as f64 * 0.1, 0.95);

        let explanation = format!(
            "Found {} suspicious keyword occurrences across {} categories: {}.",
            all_hits.len(),
            triggered.len(),
            summaries.join("; ")
        );

        let samples: Vec<Value> = all_hits
            .iter()
            .take(10)
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, serde_json::Error>>()?;

        Ok(SignalResult::new(KEYWORDS, self.weight, score, confidence)
            .with_indicator("total_matches", all_hits.len())
            .with_indicator("categories_triggered", triggered)
            .with_indicator("category_details", category_details)
            .with_indicator("sample_matches", samples)
            .with_explanation(explanation))
    }
}
