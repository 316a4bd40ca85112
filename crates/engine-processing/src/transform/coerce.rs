//! Field coercion shared by every transformer.
//!
//! Counts and amounts default to zero, optional amounts stay null, text is
//! trimmed and capped, ratios are rounded half-up to two places and are
//! zero when the divisor is not positive.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde_json::Value as Json;
use std::str::FromStr;

pub const TEXT_CAP: usize = 200;

/// Nested lookup; JSON `null` reads as absent.
pub fn lookup<'a>(record: &'a Json, path: &[&str]) -> Option<&'a Json> {
    let found = path
        .iter()
        .try_fold(record, |node, key| node.get(key))?;
    (!found.is_null()).then_some(found)
}

/// Parses numbers and numeric strings. Strings may use a decimal comma and
/// space, thin-space or no-break-space digit grouping.
pub fn decimal_of(value: &Json) -> Option<Decimal> {
    match value {
        Json::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        Json::String(s) => parse_decimal(s),
        Json::Bool(b) => Some(Decimal::from(u8::from(*b))),
        _ => None,
    }
}

pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\u{2009}' | '%'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn count(record: &Json, path: &[&str]) -> i64 {
    count_of(lookup(record, path))
}

pub fn count_of(value: Option<&Json>) -> i64 {
    value
        .and_then(decimal_of)
        .and_then(|d| {
            d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .unwrap_or(0)
}

pub fn amount(record: &Json, path: &[&str]) -> Decimal {
    optional_amount(record, path).unwrap_or(Decimal::ZERO)
}

pub fn optional_amount(record: &Json, path: &[&str]) -> Option<Decimal> {
    lookup(record, path).and_then(decimal_of).map(round2)
}

/// `numerator / denominator`, rounded; zero unless the denominator is positive.
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator > Decimal::ZERO {
        round2(numerator / denominator)
    } else {
        Decimal::ZERO
    }
}

pub fn percent(numerator: i64, denominator: i64) -> Decimal {
    ratio(
        Decimal::from(numerator) * Decimal::ONE_HUNDRED,
        Decimal::from(denominator),
    )
}

/// Trimmed text capped at [`TEXT_CAP`] characters. Empty text is absent.
pub fn text(record: &Json, path: &[&str]) -> Option<String> {
    match lookup(record, path)? {
        Json::String(s) => cap(s.trim()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn cap(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(TEXT_CAP).collect())
}

pub fn flag(record: &Json, path: &[&str]) -> bool {
    match lookup(record, path) {
        Some(Json::Bool(b)) => *b,
        Some(Json::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Json::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
        Some(Json::Array(items)) => !items.is_empty(),
        Some(Json::Object(_)) => true,
        _ => false,
    }
}

/// Integer identifier from a number or numeric string. Anything else is absent.
pub fn int_key(record: &Json, path: &[&str]) -> Option<i64> {
    match lookup(record, path)? {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and `dd.mm.yyyy`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).date_naive())
        })
        .or_else(|| NaiveDate::parse_from_str(text, "%d.%m.%Y").ok())
        .or_else(|| text.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

pub fn date(record: &Json, path: &[&str]) -> Option<NaiveDate> {
    lookup(record, path)?.as_str().and_then(parse_date)
}

pub fn timestamp(record: &Json, path: &[&str]) -> Option<DateTime<Utc>> {
    let text = lookup(record, path)?.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    parse_date(text)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
