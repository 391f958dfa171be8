use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use super::{latest_per_key, MirrorRecord, MirrorStore};
use crate::config::{DatabaseConfig, Secrets};
use crate::normalize::{Block, Direction, Transaction, Wallet};

/// Rows per INSERT, to stay within PostgreSQL parameter limits.
const UPSERT_CHUNK: usize = 1000;

/// Mirror backed by the hosted Postgres store.
#[derive(Clone)]
pub struct PgMirror {
    pool: PgPool,
    timeout: Duration,
}

impl PgMirror {
    /// Build a lazily connecting pool; the store is not contacted until first use.
    pub fn connect(config: &DatabaseConfig, secrets: &Secrets) -> eyre::Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let options = PgConnectOptions::from_str(&secrets.store_url)
            .map_err(|e| eyre::eyre!("Invalid store URL: {}", e))?
            .password(&secrets.store_key)
            .options([("statement_timeout", config.timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect_lazy_with(options);

        Ok(Self { pool, timeout })
    }

    pub async fn migrate(&self) -> eyre::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))
    }

    async fn bounded<T, F>(&self, what: &'static str, fut: F) -> eyre::Result<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| eyre::eyre!("Mirror {} failed: {}", what, e)),
            Err(_) => Err(eyre::eyre!(
                "Mirror {} timed out after {:?}",
                what,
                self.timeout
            )),
        }
    }
}

/// The `ON CONFLICT` clause that makes every write an upsert of all columns.
pub fn on_conflict_clause<R: MirrorRecord>() -> String {
    let updates = R::COLUMNS
        .iter()
        .filter(|c| **c != R::KEY)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" ON CONFLICT ({}) DO UPDATE SET {}", R::KEY, updates)
}

/// Multi-row upsert of any record kind.
pub async fn upsert_records<R: MirrorRecord>(mirror: &PgMirror, records: &[R]) -> eyre::Result<u64> {
    let unique = latest_per_key(records);
    let mut written = 0;

    for chunk in unique.chunks(UPSERT_CHUNK) {
        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            format!("INSERT INTO {} ({}) ", R::TABLE, R::COLUMNS.join(", ")),
        );
        query_builder.push_values(chunk.iter().copied(), |mut row, record| {
            record.push_binds(&mut row);
        });
        query_builder.push(on_conflict_clause::<R>());

        let result = mirror
            .bounded("upsert", query_builder.build().execute(&mirror.pool))
            .await?;
        written += result.rows_affected();
    }

    Ok(written)
}

type TransactionRow = (
    String,
    String,
    String,
    String,
    BigDecimal,
    BigDecimal,
    DateTime<Utc>,
    String,
    Option<i64>,
);

fn transaction_from_row(row: TransactionRow) -> Transaction {
    let (
        tx_hash,
        wallet_address,
        from_address,
        to_address,
        value,
        gas_used,
        timestamp,
        direction,
        block_number,
    ) = row;
    let direction = Direction::parse(&direction)
        .unwrap_or_else(|| Direction::relative_to(&wallet_address, &to_address));

    Transaction {
        tx_hash,
        wallet_address,
        from_address,
        to_address,
        value,
        gas_used,
        timestamp,
        direction,
        block_number,
        estimated: vec![],
    }
}

fn block_from_row(
    (block_number, tx_count, gas_used, timestamp): (i64, i64, BigDecimal, DateTime<Utc>),
) -> Block {
    Block {
        block_number,
        tx_count,
        gas_used,
        timestamp,
        estimated: vec![],
    }
}

#[async_trait]
impl MirrorStore for PgMirror {
    async fn upsert<R: MirrorRecord>(&self, records: &[R]) -> eyre::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        upsert_records(self, records).await
    }

    async fn load_wallet(&self, address_key: &str) -> eyre::Result<Option<Wallet>> {
        let row: Option<(String, BigDecimal, DateTime<Utc>)> = self
            .bounded(
                "wallet read",
                sqlx::query_as(
                    "SELECT address, balance, last_updated FROM wallets WHERE address = $1",
                )
                .bind(address_key)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|(address, balance, last_updated)| Wallet {
            address,
            balance,
            last_updated,
            estimated: vec![],
        }))
    }

    async fn load_transactions(
        &self,
        wallet_key: &str,
        limit: i64,
    ) -> eyre::Result<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = self
            .bounded(
                "transaction read",
                sqlx::query_as(
                    "SELECT tx_hash, wallet_address, from_address, to_address, value, gas_used,
                            timestamp, direction, block_number
                     FROM transactions WHERE wallet_address = $1
                     ORDER BY timestamp DESC LIMIT $2",
                )
                .bind(wallet_key)
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.into_iter().map(transaction_from_row).collect())
    }

    async fn load_transaction(&self, tx_hash: &str) -> eyre::Result<Option<Transaction>> {
        let row: Option<TransactionRow> = self
            .bounded(
                "transaction read",
                sqlx::query_as(
                    "SELECT tx_hash, wallet_address, from_address, to_address, value, gas_used,
                            timestamp, direction, block_number
                     FROM transactions WHERE tx_hash = $1",
                )
                .bind(tx_hash)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(transaction_from_row))
    }

    async fn load_latest_blocks(&self, limit: i64) -> eyre::Result<Vec<Block>> {
        let rows: Vec<(i64, i64, BigDecimal, DateTime<Utc>)> = self
            .bounded(
                "block read",
                sqlx::query_as(
                    "SELECT block_number, tx_count, gas_used, timestamp
                     FROM blocks ORDER BY block_number DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.into_iter().map(block_from_row).collect())
    }

    async fn load_block(&self, block_number: i64) -> eyre::Result<Option<Block>> {
        let row: Option<(i64, i64, BigDecimal, DateTime<Utc>)> = self
            .bounded(
                "block read",
                sqlx::query_as(
                    "SELECT block_number, tx_count, gas_used, timestamp
                     FROM blocks WHERE block_number = $1",
                )
                .bind(block_number)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(block_from_row))
    }

    async fn ping(&self) -> eyre::Result<()> {
        self.bounded("ping", sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_conflict_updates_every_non_key_column() {
        assert_eq!(
            on_conflict_clause::<Wallet>(),
            " ON CONFLICT (address) DO UPDATE SET balance = EXCLUDED.balance, \
             last_updated = EXCLUDED.last_updated"
        );
        assert_eq!(
            on_conflict_clause::<Block>(),
            " ON CONFLICT (block_number) DO UPDATE SET tx_count = EXCLUDED.tx_count, \
             gas_used = EXCLUDED.gas_used, timestamp = EXCLUDED.timestamp"
        );
        let tx_clause = on_conflict_clause::<Transaction>();
        assert!(tx_clause.starts_with(" ON CONFLICT (tx_hash) DO UPDATE SET wallet_address"));
        assert!(tx_clause.ends_with("block_number = EXCLUDED.block_number"));
        assert!(!tx_clause.contains("tx_hash = EXCLUDED"));
    }

    #[test]
    fn test_unknown_direction_is_rederived() {
        let wallet = "0x002624fa55dff0ca53af9166b4d44c16a294c4e0".to_string();
        let tx = transaction_from_row((
            "0x01".to_string(),
            wallet.clone(),
            "0x1111111111111111111111111111111111111111".to_string(),
            wallet.to_ascii_uppercase().replace("0X", "0x"),
            BigDecimal::from(1),
            BigDecimal::from(21000),
            Utc::now(),
            "".to_string(),
            None,
        ));
        assert_eq!(tx.direction, Direction::Incoming);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let secrets = Secrets {
            api_key: "k".to_string(),
            store_url: "not a url".to_string(),
            store_key: "s".to_string(),
        };
        assert!(PgMirror::connect(&DatabaseConfig::default(), &secrets).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_within_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let secrets = Secrets {
            api_key: "k".to_string(),
            store_url: format!("postgres://postgres@{}/postgres", addr),
            store_key: "s".to_string(),
        };
        let config = DatabaseConfig {
            timeout_ms: 500,
            ..DatabaseConfig::default()
        };
        let mirror = PgMirror::connect(&config, &secrets).unwrap();

        let started = std::time::Instant::now();
        assert!(mirror.ping().await.is_err());
        assert!(mirror.load_wallet("0x00").await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
