//! Text extraction helpers shared by the detectors.
//!
//! Detectors compile their patterns once at construction through [`compile`]
//! and use the helpers here to pull monetary amounts and context windows out
//! of free text.

use std::collections::BTreeMap;

use fraudex_core::{Result, SignalError};
use regex::Regex;

/// Monetary amount: comma-grouped (`1,234.56`) or plain (`1234.56`).
///
/// The grouped form is tried first so that `1,234` is not read as `1`.
pub(crate) const AMOUNT: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d{2})?|\d+(?:\.\d{2})?";

/// Compile a named pattern, mapping failures to a configuration error.
pub(crate) fn compile(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| SignalError::Config(format!("Failed to compile pattern '{name}': {e}")))
}

/// Compile `(name, pattern)` pairs in order.
pub(crate) fn compile_all<'a>(
    defs: impl IntoIterator<Item = (&'a str, String)>,
) -> Result<Vec<Regex>> {
    defs.into_iter()
        .map(|(name, pattern)| compile(name, &pattern))
        .collect()
}

/// Parse an extracted amount, ignoring thousands separators.
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Amounts captured by the `amount` group of any pattern, in text order.
///
/// When several patterns capture a number starting at the same offset, the
/// first pattern wins so one written amount is never counted twice.
pub(crate) fn amounts_by_offset(text: &str, patterns: &[Regex]) -> Vec<(usize, f64)> {
    let mut by_offset = BTreeMap::new();
    for regex in patterns {
        for caps in regex.captures_iter(text) {
            let Some(m) = caps.name("amount") else {
                continue;
            };
            if let Some(value) = parse_amount(m.as_str()) {
                by_offset.entry(m.start()).or_insert(value);
            }
        }
    }
    by_offset.into_iter().collect()
}

/// Integer cents, used to compare amounts without float noise.
pub(crate) fn cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Up to `radius` characters either side of `start..end`, trimmed.
pub(crate) fn context_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = if radius == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map_or(0, |(i, _)| i)
    };
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    text[from..to].trim()
}

/// Format a currency value with thousands separators, e.g. `9,700.00`.
pub(crate) fn format_currency(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Round to a fixed number of decimal places for reporting.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dollar_pattern() -> Regex {
        compile("dollar", &format!(r"\$\s*(?P<amount>{AMOUNT})")).unwrap()
    }

    #[test]
    fn test_amount_prefers_grouped_form() {
        let found = amounts_by_offset("Paid $1,234.56 and $5000", &[dollar_pattern()]);
        let values: Vec<f64> = found.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1234.56, 5000.0]);
    }

    #[test]
    fn test_same_offset_counted_once() {
        let keyword = compile(
            "keyword",
            &format!(r"(?i)\btotal[:\s]+\$?\s*(?P<amount>{AMOUNT})"),
        )
        .unwrap();
        let found = amounts_by_offset("Total: $7,500", &[dollar_pattern(), keyword]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, 7500.0);
    }

    #[test]
    fn test_compile_error_is_config_error() {
        let err = compile("broken", r"(unclosed").unwrap_err();
        assert!(matches!(err, SignalError::Config(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12,500.00"), Some(12500.0));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_cents() {
        assert_eq!(cents(4800.0), 480_000);
        assert_eq!(cents(0.1 + 0.2), 30);
    }

    #[test]
    fn test_context_window_is_char_safe() {
        let text = "ééééé bribe ééééé";
        let start = text.find("bribe").unwrap();
        let window = context_window(text, start, start + 5, 3);
        assert_eq!(window, "éé bribe éé");
    }

    #[test]
    fn test_context_window_clamps_to_text() {
        let text = "a bribe";
        assert_eq!(context_window(text, 2, 7, 50), "a bribe");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(9700.0, 2), "9,700.00");
        assert_eq!(format_currency(5000.0, 0), "5,000");
        assert_eq!(format_currency(100000.0, 0), "100,000");
        assert_eq!(format_currency(999.5, 2), "999.50");
        assert_eq!(format_currency(-1234.0, 0), "-1,234");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 3), 0.123);
        assert_eq!(round_to(18.25, 1), 18.3);
    }
}
