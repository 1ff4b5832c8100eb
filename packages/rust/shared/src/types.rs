//! Core domain types: the canonical [`Grant`] record and its normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Grant
// ---------------------------------------------------------------------------

/// A canonical, fully-defaulted grant record.
///
/// Every field is always present regardless of what the upstream source
/// supplied. Build one from raw JSON with [`normalize`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grant {
    /// Award date, free-form as supplied upstream.
    pub date: String,
    /// Awarding agency.
    pub agency: String,
    /// Recipient organization.
    pub recipient: String,
    /// Award value in USD.
    pub value: f64,
    /// Stated savings from cancellation in USD.
    pub savings: f64,
    /// Source link, or empty.
    pub link: String,
    /// Free-text description, may be empty.
    pub description: String,
}

impl Grant {
    /// Normalize a raw upstream record. See [`normalize`].
    pub fn from_raw(raw: &Value) -> Self {
        normalize(raw)
    }
}

/// Map a raw upstream record onto the canonical [`Grant`] schema.
///
/// Never fails. Text fields fall back to `""` and numeric fields to `0.0`
/// when absent, null, of the wrong JSON type, or non-finite. A raw record
/// that is not a JSON object yields an all-default grant.
pub fn normalize(raw: &Value) -> Grant {
    Grant {
        date: text_field(raw, "date"),
        agency: text_field(raw, "agency"),
        recipient: text_field(raw, "recipient"),
        value: number_field(raw, "value"),
        savings: number_field(raw, "savings"),
        link: text_field(raw, "link"),
        description: text_field(raw, "description"),
    }
}

fn text_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn number_field(raw: &Value, key: &str) -> f64 {
    // Numeric strings are rejected on purpose: only real JSON numbers count.
    raw.get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Currency formatting
// ---------------------------------------------------------------------------

/// Format an amount as whole US dollars with thousands separators,
/// e.g. `1234567.8` -> `"$1,234,568"`.
pub fn format_usd(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0".into();
    }

    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
