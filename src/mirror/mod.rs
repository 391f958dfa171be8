//! Mirror of normalized records in the hosted relational store.
//!
//! Every record kind goes through the same idempotent upsert keyed by its
//! unique column; the read side serves as the fallback when the explorer is
//! unreachable.

pub mod records;
pub mod repository;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use std::collections::HashMap;

use crate::normalize::{Block, Transaction, Wallet};

pub use repository::PgMirror;

/// A record that can be mirrored: one table, one unique key column.
pub trait MirrorRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    const KEY: &'static str;
    /// Column list in bind order; includes `KEY`.
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> String;

    /// False when any stored value was defaulted during normalization. Such a
    /// record must not replace a mirrored row.
    fn is_complete(&self) -> bool;

    /// Bind one row's values in `COLUMNS` order.
    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Idempotent insert-or-update keyed by `R::KEY`. Returns rows written.
    async fn upsert<R: MirrorRecord>(&self, records: &[R]) -> eyre::Result<u64>;

    async fn load_wallet(&self, address_key: &str) -> eyre::Result<Option<Wallet>>;

    /// Most recent first.
    async fn load_transactions(&self, wallet_key: &str, limit: i64)
        -> eyre::Result<Vec<Transaction>>;

    /// Lookup by lowercase transaction hash.
    async fn load_transaction(&self, tx_hash: &str) -> eyre::Result<Option<Transaction>>;

    /// Highest block number first.
    async fn load_latest_blocks(&self, limit: i64) -> eyre::Result<Vec<Block>>;

    async fn load_block(&self, block_number: i64) -> eyre::Result<Option<Block>>;

    async fn ping(&self) -> eyre::Result<()>;
}

/// Collapse records sharing a key to the last occurrence, keeping first-seen order.
/// A single upsert statement cannot touch the same key twice.
pub fn latest_per_key<R: MirrorRecord>(records: &[R]) -> Vec<&R> {
    let mut position: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<&R> = Vec::with_capacity(records.len());

    for record in records {
        match position.get(&record.key()) {
            Some(&i) => unique[i] = record,
            None => {
                position.insert(record.key(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}
