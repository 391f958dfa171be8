use chrono::{DateTime, Utc};
use serde_json::Value;

use super::coerce;
use super::types::{Direction, Transaction};
use crate::error::FetchError;

/// Normalize one `account/txlist` entry for the queried wallet.
///
/// `hash` is the unique key and the only field whose failure rejects the
/// record. Value and gas default to zero, and a missing timestamp falls back
/// to `now`; each defaulted field is listed in `estimated`.
pub fn normalize_transaction(
    wallet_address: &str,
    raw: &Value,
    decimals: u32,
    now: DateTime<Utc>,
) -> Result<Transaction, FetchError> {
    if !raw.is_object() {
        return Err(FetchError::invalid_field(
            "hash",
            "transaction entry is not an object",
        ));
    }

    let hash = coerce::string_field(raw, "hash");
    if !coerce::is_hex_hash(hash) {
        return Err(FetchError::invalid_field(
            "hash",
            format!("'{}' is not a hex transaction hash", hash),
        ));
    }

    let mut estimated = Vec::new();
    let from_address = coerce::string_field(raw, "from").to_string();
    let to_address = coerce::string_field(raw, "to").to_string();

    let value = coerce::scaled_field(raw, "value", decimals, &mut estimated);
    let gas_used = coerce::decimal_field(raw, "gasUsed", &mut estimated);

    let timestamp = match raw
        .get("timeStamp")
        .or_else(|| raw.get("timestamp"))
        .and_then(coerce::parse_timestamp)
    {
        Some(ts) => ts,
        None => {
            estimated.push("timestamp".to_string());
            now
        }
    };

    let block_number = raw.get("blockNumber").and_then(coerce::parse_integer);

    Ok(Transaction {
        tx_hash: hash.to_ascii_lowercase(),
        wallet_address: coerce::address_key(wallet_address),
        direction: Direction::relative_to(wallet_address, &to_address),
        from_address,
        to_address,
        value,
        gas_used,
        timestamp,
        block_number,
        estimated,
    })
}

/// Normalize a `txlist` result. Entries whose hash fails are logged and
/// skipped; the rest of the list is kept.
pub fn normalize_transactions(
    wallet_address: &str,
    payload: &Value,
    decimals: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Transaction>, FetchError> {
    let entries = payload
        .as_array()
        .ok_or_else(|| FetchError::MalformedResponse("txlist result is not an array".into()))?;

    let mut transactions = Vec::with_capacity(entries.len());
    for (index, raw) in entries.iter().enumerate() {
        match normalize_transaction(wallet_address, raw, decimals, now) {
            Ok(tx) => transactions.push(tx),
            Err(e) => {
                tracing::warn!(wallet = %wallet_address, index, error = %e, "Skipping transaction");
            }
        }
    }

    Ok(transactions)
}

/// Normalize an `eth_getTransactionByHash` result, taking gas used from the
/// receipt when one was fetched. The transaction payload carries no gas used
/// of its own, so without a receipt it is estimated.
pub fn normalize_transaction_detail(
    wallet_address: &str,
    raw: &Value,
    receipt: Option<&Value>,
    decimals: u32,
    now: DateTime<Utc>,
) -> Result<Transaction, FetchError> {
    let Value::Object(fields) = raw else {
        return normalize_transaction(wallet_address, raw, decimals, now);
    };

    let mut merged = fields.clone();
    merged.remove("gasUsed");
    if let Some(receipt) = receipt {
        for field in ["gasUsed", "blockNumber"] {
            let missing = merged.get(field).map_or(true, Value::is_null);
            match receipt.get(field) {
                Some(value) if missing && !value.is_null() => {
                    merged.insert(field.to_string(), value.clone());
                }
                _ => {}
            }
        }
    }

    normalize_transaction(wallet_address, &Value::Object(merged), decimals, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::TimeZone;
    use serde_json::json;
    use std::str::FromStr;

    const WALLET: &str = "0x002624Fa55DFf0ca53aF9166B4d44c16a294C4e0";
    const OTHER: &str = "0x00a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3";

    fn raw_tx(hash: &str, from: &str, to: &str) -> Value {
        json!({
            "blockNumber": "1520",
            "timeStamp": "1704067200",
            "hash": hash,
            "from": from,
            "to": to,
            "value": "250000000000000000",
            "gasUsed": "21000",
        })
    }

    #[test]
    fn test_incoming_when_to_matches_wallet() {
        let raw = raw_tx("0xaa", OTHER, &WALLET.to_ascii_uppercase().replace("0X", "0x"));
        let tx = normalize_transaction(WALLET, &raw, 18, Utc::now()).unwrap();
        assert_eq!(tx.direction, Direction::Incoming);
    }

    #[test]
    fn test_outgoing_otherwise() {
        let raw = raw_tx("0xaa", WALLET, OTHER);
        let tx = normalize_transaction(WALLET, &raw, 18, Utc::now()).unwrap();
        assert_eq!(tx.direction, Direction::Outgoing);
    }

    #[test]
    fn test_fields_are_coerced() {
        let raw = raw_tx("0xAbCd", OTHER, WALLET);
        let tx = normalize_transaction(WALLET, &raw, 18, Utc::now()).unwrap();

        assert_eq!(tx.tx_hash, "0xabcd");
        assert_eq!(tx.wallet_address, WALLET.to_ascii_lowercase());
        assert_eq!(tx.to_address, WALLET);
        assert_eq!(tx.value, BigDecimal::from_str("0.25").unwrap());
        assert_eq!(tx.gas_used, BigDecimal::from(21000));
        assert_eq!(tx.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(tx.block_number, Some(1520));
        assert!(tx.estimated.is_empty());
    }

    #[test]
    fn test_missing_non_key_fields_are_estimated() {
        let now = Utc::now();
        let raw = json!({"hash": "0xbeef", "from": OTHER, "to": WALLET, "value": "oops"});
        let tx = normalize_transaction(WALLET, &raw, 18, now).unwrap();

        assert_eq!(tx.value, BigDecimal::from(0));
        assert_eq!(tx.gas_used, BigDecimal::from(0));
        assert_eq!(tx.timestamp, now);
        assert_eq!(tx.block_number, None);
        assert_eq!(tx.estimated, vec!["value", "gasUsed", "timestamp"]);
    }

    #[test]
    fn test_missing_hash_is_invalid_field() {
        let raw = json!({"from": OTHER, "to": WALLET});
        let err = normalize_transaction(WALLET, &raw, 18, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidField { field: "hash", .. }));
    }

    #[test]
    fn test_list_skips_bad_entries() {
        let payload = json!([
            raw_tx("0x01", OTHER, WALLET),
            {"from": OTHER, "to": WALLET},
            "garbage",
            raw_tx("0x02", WALLET, OTHER),
        ]);
        let txs = normalize_transactions(WALLET, &payload, 18, Utc::now()).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].tx_hash, "0x01");
        assert_eq!(txs[0].direction, Direction::Incoming);
        assert_eq!(txs[1].tx_hash, "0x02");
        assert_eq!(txs[1].direction, Direction::Outgoing);
    }

    #[test]
    fn test_list_requires_array() {
        let err = normalize_transactions(WALLET, &json!({"hash": "0x01"}), 18, Utc::now())
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_detail_takes_gas_used_from_receipt() {
        let raw = json!({
            "hash": "0xfeed",
            "from": WALLET,
            "to": OTHER,
            "value": "0xde0b6b3a7640000",
            "gas": "0x186a0",
            "blockNumber": null,
        });
        let receipt = json!({"gasUsed": "0x5208", "blockNumber": "0x5f0", "status": "0x1"});
        let tx =
            normalize_transaction_detail(WALLET, &raw, Some(&receipt), 18, Utc::now()).unwrap();

        assert_eq!(tx.tx_hash, "0xfeed");
        assert_eq!(tx.value, BigDecimal::from(1));
        assert_eq!(tx.gas_used, BigDecimal::from(21000));
        assert_eq!(tx.block_number, Some(1520));
        assert_eq!(tx.direction, Direction::Outgoing);
        assert_eq!(tx.estimated, vec!["timestamp"]);
    }

    #[test]
    fn test_detail_without_receipt_estimates_gas() {
        let raw = json!({"hash": "0xfeed", "from": OTHER, "to": WALLET, "value": "0x0"});
        let tx = normalize_transaction_detail(WALLET, &raw, None, 18, Utc::now()).unwrap();
        assert_eq!(tx.direction, Direction::Incoming);
        assert_eq!(tx.estimated, vec!["gasUsed", "timestamp"]);
    }

    #[test]
    fn test_unknown_hash_is_invalid_field() {
        let err =
            normalize_transaction_detail(WALLET, &Value::Null, None, 18, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidField { field: "hash", .. }));
    }
}
