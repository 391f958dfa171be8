use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::str::FromStr;

/// Largest exponent magnitude accepted from upstream numbers.
const MAX_SCALE: i64 = 1024;

/// Parse a numeric field: decimal strings, `0x` hex strings and JSON numbers.
/// Returns `None` for anything else, including empty strings and values
/// whose exponent is out of range.
pub fn parse_decimal(raw: &Value) -> Option<BigDecimal> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            if let Some(digits) = strip_hex_prefix(s) {
                if digits.is_empty() {
                    return None;
                }
                return BigInt::parse_bytes(digits.as_bytes(), 16).map(|n| BigDecimal::new(n, 0));
            }
            if s.is_empty() || !s.bytes().any(|b| b.is_ascii_digit()) {
                return None;
            }
            BigDecimal::from_str(s).ok().filter(scale_in_range)
        }
        Value::Number(n) => BigDecimal::from_str(&n.to_string())
            .ok()
            .filter(scale_in_range),
        _ => None,
    }
}

fn scale_in_range(value: &BigDecimal) -> bool {
    value.as_bigint_and_exponent().1.abs() <= MAX_SCALE
}

/// Look up a numeric field, defaulting to zero and recording the field as
/// estimated when it is missing or not numeric.
pub fn decimal_field(
    raw: &Value,
    field: &'static str,
    estimated: &mut Vec<String>,
) -> BigDecimal {
    match raw.get(field).and_then(parse_decimal) {
        Some(value) => value,
        None => {
            estimated.push(field.to_string());
            BigDecimal::from(0)
        }
    }
}

/// Convert a base-unit amount (e.g. wei) to display units. `None` when the
/// resulting exponent does not fit.
pub fn from_base_units(amount: &BigDecimal, decimals: u32) -> Option<BigDecimal> {
    let (digits, scale) = amount.as_bigint_and_exponent();
    let scale = scale.checked_add(i64::from(decimals))?;
    Some(BigDecimal::new(digits, scale).normalized())
}

/// Like `decimal_field`, scaled from base units to display units.
pub fn scaled_field(
    raw: &Value,
    field: &'static str,
    decimals: u32,
    estimated: &mut Vec<String>,
) -> BigDecimal {
    match raw
        .get(field)
        .and_then(parse_decimal)
        .and_then(|base_units| from_base_units(&base_units, decimals))
    {
        Some(value) => value,
        None => {
            estimated.push(field.to_string());
            BigDecimal::from(0)
        }
    }
}

/// Parse a non-negative integer from a decimal string, hex string or JSON number.
pub fn parse_integer(raw: &Value) -> Option<i64> {
    let parsed = match raw {
        Value::String(s) => {
            let s = s.trim();
            match strip_hex_prefix(s) {
                Some(digits) => i64::from_str_radix(digits, 16).ok(),
                None => s.parse::<i64>().ok(),
            }
        }
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed.filter(|n| *n >= 0)
}

/// Parse unix seconds (decimal or hex) or an ISO 8601 timestamp into UTC.
/// ISO strings without an offset are taken as UTC.
pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    if let Some(secs) = parse_integer(raw) {
        return DateTime::from_timestamp(secs, 0);
    }

    let s = raw.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `0x` followed by exactly 40 hex digits.
pub fn is_hex_address(s: &str) -> bool {
    match strip_hex_prefix(s) {
        Some(digits) => digits.len() == 40 && hex::decode(digits).is_ok(),
        None => false,
    }
}

/// `0x` followed by an even, non-empty run of hex digits.
pub fn is_hex_hash(s: &str) -> bool {
    match strip_hex_prefix(s) {
        Some(digits) => !digits.is_empty() && hex::decode(digits).is_ok(),
        None => false,
    }
}

/// Lowercase form used for key comparisons and storage.
pub fn address_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// Read a string field, returning an empty string when absent or null.
pub fn string_field<'a>(raw: &'a Value, field: &str) -> &'a str {
    raw.get(field).and_then(Value::as_str).unwrap_or("").trim()
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}
