use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

static NON_CODE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9A-Z]").unwrap());

/// Uppercases a tax code and strips everything that is not an ASCII digit or capital letter.
///
/// `"1 aj!"` becomes `"1AJ"`. Normalizing an already-normalized code is a no-op.
pub fn normalize_code(code: &str) -> String {
    NON_CODE_CHARS
        .replace_all(&code.to_uppercase(), "")
        .into_owned()
}

/// Parses a human-entered amount, tolerating a comma decimal separator and stray spaces.
///
/// Commas become dots and all whitespace (including non-breaking spaces) is removed
/// before parsing, so `"1 234,56"` parses as `1234.56`.
pub fn coerce_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Converts a JSON number to a `Decimal` through its textual form to avoid binary float drift.
pub fn decimal_from_number(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Rounds to two decimal places, halves away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders a scalar JSON value as text. Strings are returned as-is, numbers and booleans
/// through their JSON representation, everything else as `None`.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text used in warnings to name an entry's original value.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
