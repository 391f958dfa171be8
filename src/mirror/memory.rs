use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{latest_per_key, MirrorRecord, MirrorStore};
use crate::normalize::{Block, Transaction, Wallet};

/// In-process `MirrorStore` with the same keyed-upsert semantics as Postgres.
#[derive(Default)]
pub struct MemoryMirror {
    tables: Mutex<HashMap<&'static str, BTreeMap<String, Value>>>,
    unavailable: AtomicBool,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, as an unreachable store would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map_or(0, BTreeMap::len)
    }

    fn check(&self) -> eyre::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(eyre::eyre!("memory mirror is unavailable"));
        }
        Ok(())
    }

    fn rows<R: MirrorRecord>(&self) -> eyre::Result<Vec<R>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let Some(table) = tables.get(R::TABLE) else {
            return Ok(Vec::new());
        };
        table
            .values()
            .map(|v| {
                let mut record: Value = v.clone();
                // estimated markers are not part of the stored schema
                record["estimated"] = Value::Array(vec![]);
                serde_json::from_value(record).map_err(Into::into)
            })
            .collect()
    }
}

#[async_trait]
impl MirrorStore for MemoryMirror {
    async fn upsert<R: MirrorRecord>(&self, records: &[R]) -> eyre::Result<u64> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(R::TABLE).or_default();
        let unique = latest_per_key(records);
        for record in &unique {
            table.insert(record.key(), serde_json::to_value(record)?);
        }
        Ok(unique.len() as u64)
    }

    async fn load_wallet(&self, address_key: &str) -> eyre::Result<Option<Wallet>> {
        Ok(self
            .rows::<Wallet>()?
            .into_iter()
            .find(|w| w.key() == address_key)
            .map(|mut w| {
                w.address = w.key();
                w
            }))
    }

    async fn load_transactions(
        &self,
        wallet_key: &str,
        limit: i64,
    ) -> eyre::Result<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = self
            .rows::<Transaction>()?
            .into_iter()
            .filter(|t| t.wallet_address == wallet_key)
            .collect();
        txs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        txs.truncate(limit.max(0) as usize);
        Ok(txs)
    }

    async fn load_transaction(&self, tx_hash: &str) -> eyre::Result<Option<Transaction>> {
        Ok(self
            .rows::<Transaction>()?
            .into_iter()
            .find(|t| t.tx_hash == tx_hash))
    }

    async fn load_latest_blocks(&self, limit: i64) -> eyre::Result<Vec<Block>> {
        let mut blocks = self.rows::<Block>()?;
        blocks.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        blocks.truncate(limit.max(0) as usize);
        Ok(blocks)
    }

    async fn load_block(&self, block_number: i64) -> eyre::Result<Option<Block>> {
        Ok(self
            .rows::<Block>()?
            .into_iter()
            .find(|b| b.block_number == block_number))
    }

    async fn ping(&self) -> eyre::Result<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Direction;
    use bigdecimal::BigDecimal;
    use chrono::{Duration, Utc};

    const WALLET: &str = "0x002624fa55dff0ca53af9166b4d44c16a294c4e0";

    fn tx(hash: &str, value: i64, minutes_ago: i64) -> Transaction {
        Transaction {
            tx_hash: hash.to_string(),
            wallet_address: WALLET.to_string(),
            from_address: "0x1111111111111111111111111111111111111111".to_string(),
            to_address: WALLET.to_string(),
            value: BigDecimal::from(value),
            gas_used: BigDecimal::from(21000),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            direction: Direction::Incoming,
            block_number: Some(1),
            estimated: vec![],
        }
    }

    #[tokio::test]
    async fn test_upserting_same_tx_twice_keeps_one_row_with_latest_fields() {
        let mirror = MemoryMirror::new();
        mirror.upsert(&[tx("0xaa", 1, 0)]).await.unwrap();
        mirror.upsert(&[tx("0xaa", 7, 0)]).await.unwrap();

        assert_eq!(mirror.row_count("transactions"), 1);
        let stored = mirror.load_transactions(WALLET, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, BigDecimal::from(7));
    }

    #[tokio::test]
    async fn test_duplicate_keys_in_one_batch_collapse() {
        let mirror = MemoryMirror::new();
        let written = mirror
            .upsert(&[tx("0xaa", 1, 0), tx("0xbb", 2, 0), tx("0xaa", 3, 0)])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(mirror.row_count("transactions"), 2);
    }

    #[tokio::test]
    async fn test_transactions_newest_first_and_limited() {
        let mirror = MemoryMirror::new();
        mirror
            .upsert(&[tx("0x01", 1, 30), tx("0x02", 2, 10), tx("0x03", 3, 20)])
            .await
            .unwrap();

        let stored = mirror.load_transactions(WALLET, 2).await.unwrap();
        let hashes: Vec<&str> = stored.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x02", "0x03"]);
    }

    #[tokio::test]
    async fn test_wallet_reads_back_by_lowercase_key() {
        let mirror = MemoryMirror::new();
        let wallet = Wallet {
            address: "0x002624Fa55DFf0ca53aF9166B4d44c16a294C4e0".to_string(),
            balance: BigDecimal::from(3),
            last_updated: Utc::now(),
            estimated: vec!["balance".to_string()],
        };
        mirror.upsert(std::slice::from_ref(&wallet)).await.unwrap();

        let stored = mirror.load_wallet(WALLET).await.unwrap().unwrap();
        assert_eq!(stored.address, WALLET);
        assert_eq!(stored.balance, BigDecimal::from(3));
        assert!(stored.estimated.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_reads_back_by_hash() {
        let mirror = MemoryMirror::new();
        mirror.upsert(&[tx("0x01", 1, 0), tx("0x02", 2, 0)]).await.unwrap();

        let stored = mirror.load_transaction("0x02").await.unwrap().unwrap();
        assert_eq!(stored.value, BigDecimal::from(2));
        assert!(mirror.load_transaction("0x03").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let mirror = MemoryMirror::new();
        mirror.set_unavailable(true);
        assert!(mirror.ping().await.is_err());
        assert!(mirror.upsert(&[tx("0xaa", 1, 0)]).await.is_err());
        assert!(mirror.load_latest_blocks(5).await.is_err());
        assert!(mirror.load_transaction("0xaa").await.is_err());
    }
}
