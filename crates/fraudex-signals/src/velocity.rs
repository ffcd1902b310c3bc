//! Transaction velocity and timing anomaly detection.
//!
//! Looks at when dated activity happens rather than how much of it there is:
//! weekend-heavy activity, several entries on one calendar day, and a bias
//! towards the last days of the month.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use fraudex_core::{validate_weight, AnalysisContext, Detector, Result, Severity, SignalResult};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extract::{compile, round_to};

/// Detector identifier.
pub const VELOCITY: &str = "velocity";

const MAX_SCORE: f64 = 30.0;
const MAX_CONFIDENCE: f64 = 0.8;

const MONTHS: &str = "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";

/// Configuration for [`VelocityDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Include the detector in the ensemble.
    #[serde(default = "crate::default_enabled")]
    pub enabled: bool,
    /// Aggregation weight.
    #[serde(default = "default_velocity_weight")]
    pub weight: f64,
}

fn default_velocity_weight() -> f64 {
    0.8
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_velocity_weight(),
        }
    }
}

// ---------------------------------------------------------------------------
// Date extraction
// ---------------------------------------------------------------------------

/// Field order of a textual date form.
#[derive(Debug, Clone, Copy)]
enum DateLayout {
    /// `03/15/2024`, `03-15-2024`
    MonthDayYear,
    /// `2024-03-15`
    YearMonthDay,
    /// `March 15, 2024`
    NameDayYear,
    /// `15 March 2024`
    DayNameYear,
}

/// A date found in the text or supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedEntry {
    pub date: NaiveDate,
    pub raw: String,
}

impl DatedEntry {
    pub fn is_weekend(&self) -> bool {
        matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn date_from_captures(layout: DateLayout, caps: &Captures<'_>) -> Option<NaiveDate> {
    let group = |i: usize| caps.get(i).map(|m| m.as_str());
    let number = |i: usize| group(i).and_then(|s| s.parse::<u32>().ok());

    let (year, month, day) = match layout {
        DateLayout::MonthDayYear => (number(3)?, number(1)?, number(2)?),
        DateLayout::YearMonthDay => (number(1)?, number(2)?, number(3)?),
        DateLayout::NameDayYear => (number(3)?, month_from_name(group(1)?)?, number(2)?),
        DateLayout::DayNameYear => (number(3)?, month_from_name(group(2)?)?, number(1)?),
    };
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Parse a caller-supplied ISO date or timestamp.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

// ---------------------------------------------------------------------------
// Timing analysis
// ---------------------------------------------------------------------------

/// Timing patterns reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingPattern {
    HighWeekendActivity,
    DateClustering,
    MonthEndClustering,
}

impl TimingPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighWeekendActivity => "high_weekend_activity",
            Self::DateClustering => "date_clustering",
            Self::MonthEndClustering => "month_end_clustering",
        }
    }
}

/// One timing anomaly.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingFinding {
    pub pattern: TimingPattern,
    pub description: String,
    pub severity: Severity,
}

fn severity_points(severity: Severity) -> f64 {
    match severity {
        Severity::High => 15.0,
        Severity::Medium => 10.0,
        Severity::Low => 5.0,
    }
}

/// Weekend share, same-day clusters and month-end bias over a set of dates.
pub fn analyze_timing(entries: &[DatedEntry]) -> Vec<TimingFinding> {
    if entries.len() < 2 {
        return Vec::new();
    }
    let total = entries.len();
    let mut findings = Vec::new();

    let weekend = entries.iter().filter(|e| e.is_weekend()).count();
    let weekend_ratio = weekend as f64 / total as f64;
    if weekend_ratio > 0.3 {
        findings.push(TimingFinding {
            pattern: TimingPattern::HighWeekendActivity,
            description: format!(
                "{weekend}/{total} ({:.0}%) dates are weekends",
                weekend_ratio * 100.0
            ),
            severity: if weekend_ratio > 0.5 {
                Severity::Medium
            } else {
                Severity::Low
            },
        });
    }

    let clustered: Vec<(NaiveDate, usize)> = day_counts(entries)
        .into_iter()
        .filter(|(_, n)| *n >= 3)
        .collect();
    if !clustered.is_empty() {
        let days = clustered
            .iter()
            .take(3)
            .map(|(d, n)| format!("{} ({n})", d.format("%Y-%m-%d")))
            .collect::<Vec<_>>()
            .join(", ");
        findings.push(TimingFinding {
            pattern: TimingPattern::DateClustering,
            description: format!("Multiple entries on same day: {days}"),
            severity: Severity::Medium,
        });
    }

    let month_end = entries.iter().filter(|e| e.date.day() >= 28).count();
    if month_end as f64 > total as f64 * 0.4 {
        findings.push(TimingFinding {
            pattern: TimingPattern::MonthEndClustering,
            description: format!("{month_end}/{total} dates are month-end"),
            severity: Severity::Low,
        });
    }

    findings
}

/// Occurrences per calendar day, in first-seen order.
fn day_counts(entries: &[DatedEntry]) -> Vec<(NaiveDate, usize)> {
    let mut counts: Vec<(NaiveDate, usize)> = Vec::new();
    for entry in entries {
        match counts.iter_mut().find(|(d, _)| *d == entry.date) {
            Some(slot) => slot.1 += 1,
            None => counts.push((entry.date, 1)),
        }
    }
    counts
}

// ---------------------------------------------------------------------------
// VelocityDetector
// ---------------------------------------------------------------------------

/// Flags unusual timing in dated activity.
pub struct VelocityDetector {
    weight: f64,
    date_patterns: Vec<(DateLayout, Regex)>,
}

impl VelocityDetector {
    /// Create a detector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid weight.
    pub fn new(config: &VelocityConfig) -> Result<Self> {
        let defs = [
            (
                DateLayout::MonthDayYear,
                "month_day_year",
                r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b".to_string(),
            ),
            (
                DateLayout::YearMonthDay,
                "year_month_day",
                r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b".to_string(),
            ),
            (
                DateLayout::NameDayYear,
                "name_day_year",
                format!(r"(?i)\b({MONTHS})[a-z]*\s+(\d{{1,2}}),?\s+(\d{{4}})\b"),
            ),
            (
                DateLayout::DayNameYear,
                "day_name_year",
                format!(r"(?i)\b(\d{{1,2}})\s+({MONTHS})[a-z]*\s+(\d{{4}})\b"),
            ),
        ];
        let date_patterns = defs
            .into_iter()
            .map(|(layout, name, pattern)| Ok((layout, compile(name, &pattern)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            weight: validate_weight(VELOCITY, config.weight)?,
            date_patterns,
        })
    }

    /// Dates found in the text (pattern by pattern), then the caller's dates.
    pub fn extract_dates(&self, context: &AnalysisContext) -> Vec<DatedEntry> {
        let mut entries = Vec::new();
        for (layout, regex) in &self.date_patterns {
            for caps in regex.captures_iter(&context.text) {
                if let Some(date) = date_from_captures(*layout, &caps) {
                    entries.push(DatedEntry {
                        date,
                        raw: caps.get(0).map_or("", |m| m.as_str()).to_string(),
                    });
                }
            }
        }
        entries.extend(context.dates.iter().filter_map(|raw| {
            parse_iso_date(raw).map(|date| DatedEntry {
                date,
                raw: raw.clone(),
            })
        }));
        entries
    }
}

impl Detector for VelocityDetector {
    fn name(&self) -> &'static str {
        VELOCITY
    }

    fn description(&self) -> &'static str {
        "Transaction velocity and timing anomaly detection"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn detect(&self, context: &AnalysisContext) -> Result<SignalResult> {
        let entries = self.extract_dates(context);
        if entries.len() < 2 {
            return Ok(SignalResult::new(VELOCITY, self.weight, 0.0, 0.4)
                .with_indicator("dates_found", entries.len())
                .with_explanation("Insufficient date data for velocity analysis."));
        }

        let findings = analyze_timing(&entries);

        let mut score = 0.0;
        let mut confidence = 0.5;
        for finding in &findings {
            score += severity_points(finding.severity);
            confidence += 0.1;
        }
        let score = f64::min(score, MAX_SCORE);
        let confidence = f64::min(confidence, MAX_CONFIDENCE);

        let pattern_names: Vec<&str> = findings.iter().map(|f| f.pattern.as_str()).collect();
        let explanation = if findings.is_empty() {
            "No significant timing anomalies detected.".to_string()
        } else {
            let descriptions = findings
                .iter()
                .take(3)
                .map(|f| f.description.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "Timing anomalies detected: {}. {descriptions}.",
                pattern_names.join(", ")
            )
        };

        let weekend = entries.iter().filter(|e| e.is_weekend()).count();
        let risk_indicators: Vec<Value> = findings
            .iter()
            .map(|f| {
                json!({
                    "type": f.pattern.as_str(),
                    "description": f.description,
                    "severity": f.severity,
                })
            })
            .collect();

        Ok(SignalResult::new(VELOCITY, self.weight, score, confidence)
            .with_indicator("dates_analyzed", entries.len())
            .with_indicator("unique_dates", day_counts(&entries).len())
            .with_indicator(
                "weekend_ratio",
                round_to(weekend as f64 / entries.len() as f64, 3),
            )
            .with_indicator("patterns_detected", pattern_names)
            .with_indicator("risk_indicators", risk_indicators)
            .with_explanation(explanation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> VelocityDetector {
        VelocityDetector::new(&VelocityConfig::default()).unwrap()
    }

    fn entry(y: i32, m: u32, d: u32) -> DatedEntry {
        DatedEntry {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            raw: String::new(),
        }
    }

    #[test]
    fn test_extract_all_layouts() {
        let ctx = AnalysisContext::new(
            "Paid 03/15/2024, again 2024-03-16, then March 17, 2024 and 18 Mar 2024.",
        );
        let dates: Vec<NaiveDate> = detector()
            .extract_dates(&ctx)
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 17).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
            ]
        );
    }

    #[test]
    fn test_invalid_and_out_of_range_dates_skipped() {
        let ctx = AnalysisContext::new("02/30/2024 and 13/01/2024 and 01/01/1850");
        assert!(detector().extract_dates(&ctx).is_empty());
    }

    #[test]
    fn test_parse_iso_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1);
        assert_eq!(parse_iso_date("2024-06-01"), expected);
        assert_eq!(parse_iso_date("2024-06-01T10:30:00Z"), expected);
        assert_eq!(parse_iso_date("2024-06-01T10:30:00+02:00"), expected);
        assert_eq!(parse_iso_date("2024-06-01T10:30:00"), expected);
        assert_eq!(parse_iso_date("June first"), None);
    }

    #[test]
    fn test_insufficient_dates() {
        let result = detector()
            .detect(&AnalysisContext::new("Signed on 2024-01-10."))
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.4);
        assert_eq!(result.indicators["dates_found"], json!(1));
    }

    #[test]
    fn test_weekday_spread_is_clean() {
        // Mon 2024-03-04 .. Thu 2024-03-07
        let ctx = AnalysisContext::new("").with_dates(vec![
            "2024-03-04".into(),
            "2024-03-05".into(),
            "2024-03-06".into(),
            "2024-03-07".into(),
        ]);
        let result = detector().detect(&ctx).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.indicators["weekend_ratio"], json!(0.0));
    }

    #[test]
    fn test_weekend_severity() {
        // Sat, Sun, Mon: 2/3 weekend -> medium
        let findings = analyze_timing(&[entry(2024, 3, 9), entry(2024, 3, 10), entry(2024, 3, 11)]);
        assert_eq!(findings[0].pattern, TimingPattern::HighWeekendActivity);
        assert_eq!(findings[0].severity, Severity::Medium);

        // Sat, Mon, Tue: 1/3 weekend -> low
        let findings = analyze_timing(&[entry(2024, 3, 9), entry(2024, 3, 11), entry(2024, 3, 12)]);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[test]
    fn test_all_patterns_score_and_caps() {
        // Sat 2024-03-30 three times plus Sun 2024-03-31: weekend, same-day, month-end.
        let ctx = AnalysisContext::new("").with_dates(vec![
            "2024-03-30".into(),
            "2024-03-30".into(),
            "2024-03-30T23:10:00Z".into(),
            "2024-03-31".into(),
        ]);
        let result = detector().detect(&ctx).unwrap();
        // medium 10 + medium 10 + low 5
        assert_eq!(result.score, 25.0);
        assert!((result.confidence - 0.8).abs() < 1e-9);
        assert_eq!(
            result.indicators["patterns_detected"],
            json!(["high_weekend_activity", "date_clustering", "month_end_clustering"])
        );
        assert_eq!(result.indicators["unique_dates"], json!(2));
        assert_eq!(result.indicators["risk_indicators"][1]["severity"], json!("medium"));
    }

    #[test]
    fn test_month_end_needs_over_forty_percent() {
        let findings = analyze_timing(&[
            entry(2024, 2, 28),
            entry(2024, 2, 13),
            entry(2024, 2, 14),
            entry(2024, 2, 15),
            entry(2024, 2, 29),
        ]);
        // 2/5 = 40% is not above the bar.
        assert!(findings
            .iter()
            .all(|f| f.pattern != TimingPattern::MonthEndClustering));
    }
}
