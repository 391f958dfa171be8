use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::coerce::{self, from_base_units};
use super::types::Wallet;
use crate::error::FetchError;

/// Normalize an `account/balance` result for `address`.
///
/// The payload is either the bare base-unit string Etherscan returns, or an
/// object carrying a `balance` field. A balance that cannot be parsed yields
/// zero flagged as estimated; only an invalid address fails the record.
pub fn normalize_wallet(
    address: &str,
    payload: &Value,
    decimals: u32,
    now: DateTime<Utc>,
) -> Result<Wallet, FetchError> {
    let address = address.trim();
    if !coerce::is_hex_address(address) {
        return Err(FetchError::invalid_field(
            "address",
            format!("'{}' is not a 20-byte hex address", address),
        ));
    }

    let raw_balance = match payload {
        Value::Object(map) => map.get("balance"),
        other => Some(other),
    };

    let mut estimated = Vec::new();
    let balance = match raw_balance
        .and_then(coerce::parse_decimal)
        .and_then(|base_units| from_base_units(&base_units, decimals))
    {
        Some(balance) => balance,
        None => {
            estimated.push("balance".to_string());
            BigDecimal::from(0)
        }
    };

    Ok(Wallet {
        address: address.to_string(),
        balance,
        last_updated: now,
        estimated,
    })
}
