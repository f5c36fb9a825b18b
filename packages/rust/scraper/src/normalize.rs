//! Field normalization applied to raw table cells.
//!
//! Each helper is a pure `&str -> T` function so the ingest pipeline can
//! compose them per candidate.

use chrono::NaiveDate;
use drugwatch_shared::EventType;

/// Date format used by the decision tables.
pub const DECISION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Entity replacements, applied in order. Later entries see the output of
/// earlier ones, so `&amp;#243;` decodes to `&#243;` and no further.
const ENTITY_TABLE: [(&str, &str); 10] = [
    ("&#243;", "ó"),
    ("&#211;", "Ó"),
    ("&#231;", "ç"),
    ("&#246;", "ö"),
    ("&#252;", "ü"),
    ("&quot;", "\""),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
];

/// Replace the fixed set of HTML character references left in cell text.
///
/// Unknown references pass through untouched.
pub fn decode_entities(text: &str) -> String {
    let mut result = text.to_string();
    for (entity, replacement) in ENTITY_TABLE {
        if result.contains(entity) {
            result = result.replace(entity, replacement);
        }
    }
    result
}

/// Map a free-text Polish decision description onto an [`EventType`].
///
/// Matching is a lowercase substring test in priority order. Anything
/// unrecognised (including empty text) is treated as a withdrawal.
pub fn map_decision_type(text: &str) -> EventType {
    let lower = text.to_lowercase();

    if lower.contains("wycofanie") {
        EventType::Withdrawal
    } else if lower.contains("wstrzymanie") {
        EventType::Suspension
    } else if lower.contains("dopuszczenie") {
        EventType::Registration
    } else if lower.contains("zakaz") {
        // A ban is recorded as a withdrawal.
        EventType::Withdrawal
    } else {
        EventType::Withdrawal
    }
}

/// Parse a decision date cell. Returns `None` for anything that is not
/// `YYYY-MM-DD`.
pub fn parse_decision_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DECISION_DATE_FORMAT).ok()
}

/// `true` for drug names that stand for "no product" (`""` or `"-"`).
pub fn is_placeholder_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed == "-"
}
