use chrono::{DateTime, Utc};
use serde_json::Value;

use super::coerce;
use super::types::Block;
use crate::error::FetchError;

/// Normalize an `eth_getBlockByNumber` result.
///
/// Quai blocks keep the work-object header under `woHeader`, so the number
/// and timestamp are looked up there when the top level lacks them. When the
/// payload carries no number at all, `requested` (the number the block was
/// fetched by) keys the record.
pub fn normalize_block(
    raw: &Value,
    requested: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Block, FetchError> {
    if !raw.is_object() {
        return Err(FetchError::invalid_field(
            "block_number",
            "block payload is not an object",
        ));
    }

    let wo_header = raw.get("woHeader");
    let lookup = |field: &str| {
        raw.get(field)
            .filter(|v| !v.is_null())
            .or_else(|| wo_header.and_then(|h| h.get(field)))
    };

    let block_number = lookup("number")
        .or_else(|| lookup("blockNumber"))
        .and_then(coerce::parse_integer)
        .or(requested)
        .ok_or_else(|| FetchError::invalid_field("block_number", "missing or not an integer"))?;

    let mut estimated = Vec::new();

    let tx_count = match raw.get("transactions") {
        Some(Value::Array(txs)) => txs.len() as i64,
        _ => match lookup("transactionCount").and_then(coerce::parse_integer) {
            Some(count) => count,
            None => {
                estimated.push("tx_count".to_string());
                0
            }
        },
    };

    let gas_used = coerce::decimal_field(raw, "gasUsed", &mut estimated);

    let timestamp = match lookup("timestamp")
        .or_else(|| lookup("timeStamp"))
        .and_then(coerce::parse_timestamp)
    {
        Some(ts) => ts,
        None => {
            estimated.push("timestamp".to_string());
            now
        }
    };

    Ok(Block {
        block_number,
        tx_count,
        gas_used,
        timestamp,
        estimated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_proxy_block() {
        let raw = json!({
            "number": "0x1b4",
            "gasUsed": "0x5208",
            "timestamp": "0x65920080",
            "transactions": ["0x01", "0x02", "0x03"],
        });
        let block = normalize_block(&raw, None, Utc::now()).unwrap();

        assert_eq!(block.block_number, 436);
        assert_eq!(block.tx_count, 3);
        assert_eq!(block.gas_used, BigDecimal::from(21000));
        assert_eq!(block.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(block.estimated.is_empty());
    }

    #[test]
    fn test_quai_work_object_header() {
        let raw = json!({
            "woHeader": {"number": "0x10", "timestamp": "0x65920080"},
            "gasUsed": "0x0",
            "transactions": [],
        });
        let block = normalize_block(&raw, None, Utc::now()).unwrap();

        assert_eq!(block.block_number, 16);
        assert_eq!(block.tx_count, 0);
        assert_eq!(block.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_defaults_are_estimated() {
        let now = Utc::now();
        let block = normalize_block(&json!({"blockNumber": "99"}), None, now).unwrap();

        assert_eq!(block.block_number, 99);
        assert_eq!(block.tx_count, 0);
        assert_eq!(block.timestamp, now);
        assert_eq!(block.estimated, vec!["tx_count", "gasUsed", "timestamp"]);
    }

    #[test]
    fn test_missing_number_is_invalid_field() {
        let err = normalize_block(&json!({"gasUsed": "0x1"}), None, Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidField { field: "block_number", .. }));

        let err = normalize_block(&Value::Null, Some(7), Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidField { field: "block_number", .. }));
    }

    #[test]
    fn test_requested_number_keys_a_numberless_payload() {
        let raw = json!({"gasUsed": "0x5208", "transactions": ["0x01"]});
        let block = normalize_block(&raw, Some(1520), Utc::now()).unwrap();
        assert_eq!(block.block_number, 1520);
        assert_eq!(block.tx_count, 1);

        // the payload's own number wins over the requested one
        let raw = json!({"number": "0x10"});
        let block = normalize_block(&raw, Some(1520), Utc::now()).unwrap();
        assert_eq!(block.block_number, 16);
    }
}
