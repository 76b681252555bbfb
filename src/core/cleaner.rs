//! Raw cell -> numeric observation

use crate::types::Cell;
use regex::Regex;
use std::sync::OnceLock;

/// Sentinel used by statistical offices for "not available"
pub const NOT_AVAILABLE: &str = ":";

fn numeric_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)").expect("numeric prefix pattern is valid")
    })
}

/// Clean a raw cell into a number, or `None` when the value is missing.
///
/// Rules, in order:
/// 1. `:` (after trimming) is missing
/// 2. text starting with a number followed by flags (`123p`, `45.6 b`) yields
///    that number; a decimal comma is accepted when no decimal point is present
/// 3. anything else goes through a plain numeric conversion
/// 4. failures and non-finite numbers are missing
pub fn clean_cell(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => n.is_finite().then_some(*n),
        Cell::Text(text) => clean_text(text),
    }
}

/// Text form of [`clean_cell`]
pub fn clean_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == NOT_AVAILABLE {
        return None;
    }

    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replacen(',', ".", 1)
    };

    let parsed = match numeric_prefix().find(&normalized) {
        Some(m) => m.as_str().parse::<f64>().ok(),
        None => normalized.parse::<f64>().ok(),
    };
    parsed.filter(|v| v.is_finite())
}
