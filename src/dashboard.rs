use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;

use crate::config::Config;
use crate::error::FetchError;
use crate::explorer::{ExplorerSource, Query};
use crate::mirror::{MirrorRecord, MirrorStore};
use crate::normalize::coerce::{self, address_key};
use crate::normalize::{
    derive_network_stats, normalize_block, normalize_transaction_detail, normalize_transactions,
    normalize_wallet, Block, Direction, NetworkStats, Transaction, Wallet,
};

/// Where a piece of dashboard data came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Sourced<T> {
    Live(T),
    /// Served from the mirror because the live fetch failed.
    Stale {
        data: T,
        as_of: DateTime<Utc>,
        cause: FetchError,
    },
}

impl<T> Sourced<T> {
    pub fn data(&self) -> &T {
        match self {
            Sourced::Live(data) | Sourced::Stale { data, .. } => data,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Sourced::Live(_))
    }
}

/// Read result of one dashboard section. `Err` is always `NoDataAvailable`.
pub type Read<T> = Result<Sourced<T>, FetchError>;

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub native_decimals: u32,
    pub latest_blocks: usize,
    pub tx_page_size: u32,
}

impl From<&Config> for DashboardSettings {
    fn from(config: &Config) -> Self {
        Self {
            native_decimals: config.explorer.native_decimals,
            latest_blocks: config.dashboard.latest_blocks,
            tx_page_size: config.dashboard.tx_page_size,
        }
    }
}

/// Counts from a `sync` pass.
#[derive(Debug, Default)]
pub struct SyncResult {
    pub wallet_live: bool,
    pub transactions: usize,
    pub blocks: usize,
}

/// The four dashboard sections for one wallet.
#[derive(Debug)]
pub struct Overview {
    pub address: String,
    pub wallet: Read<Wallet>,
    pub transactions: Read<Vec<Transaction>>,
    pub blocks: Read<Vec<Block>>,
    pub stats: Read<NetworkStats>,
}

/// Composes the explorer, the normalizer and the mirror.
///
/// Each read tries the explorer first and mirrors what it gets, except
/// records carrying estimated fields. On any failure it serves the mirrored
/// copy as stale, and when the mirror has nothing either it reports
/// `NoDataAvailable`.
pub struct Dashboard<U, S> {
    upstream: U,
    mirror: S,
    settings: DashboardSettings,
}

impl<U: ExplorerSource, S: MirrorStore> Dashboard<U, S> {
    pub fn new(upstream: U, mirror: S, settings: DashboardSettings) -> Self {
        Self {
            upstream,
            mirror,
            settings,
        }
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn mirror(&self) -> &S {
        &self.mirror
    }

    pub async fn wallet(&self, address: &str) -> Read<Wallet> {
        let live = self
            .upstream
            .fetch(&Query::Balance {
                address: address.to_string(),
            })
            .await
            .and_then(|payload| {
                normalize_wallet(address, &payload, self.settings.native_decimals, Utc::now())
            });

        match live {
            Ok(wallet) => {
                self.mirror_write(std::slice::from_ref(&wallet)).await;
                Ok(Sourced::Live(wallet))
            }
            Err(cause) => {
                let key = address_key(address);
                self.fall_back(format!("wallet {}", key), cause, async {
                    Ok::<_, eyre::Report>(self
                        .mirror
                        .load_wallet(&key)
                        .await?
                        .map(|mut w| {
                            w.address = address.trim().to_string();
                            (w.last_updated, w)
                        }))
                })
                .await
            }
        }
    }

    pub async fn transactions(&self, address: &str, limit: u32) -> Read<Vec<Transaction>> {
        let query = Query::TxList {
            address: address.to_string(),
            start_block: 0,
            end_block: None,
            page: 1,
            offset: limit,
        };
        let live = self.upstream.fetch(&query).await.and_then(|payload| {
            normalize_transactions(
                address,
                &payload,
                self.settings.native_decimals,
                Utc::now(),
            )
        });

        match live {
            Ok(txs) => {
                self.mirror_write(&txs).await;
                Ok(Sourced::Live(txs))
            }
            Err(cause) => {
                let key = address_key(address);
                self.fall_back(format!("transactions of {}", key), cause, async {
                    let txs = self.mirror.load_transactions(&key, limit as i64).await?;
                    Ok::<_, eyre::Report>(newest(&txs, |t| t.timestamp).map(|as_of| (as_of, txs)))
                })
                .await
            }
        }
    }

    pub async fn latest_blocks(&self, count: usize) -> Read<Vec<Block>> {
        match self.fetch_latest_blocks(count).await {
            Ok(blocks) => {
                self.mirror_write(&blocks).await;
                Ok(Sourced::Live(blocks))
            }
            Err(cause) => {
                self.fall_back("latest blocks".to_string(), cause, async {
                    let blocks = self.mirror.load_latest_blocks(count as i64).await?;
                    Ok::<_, eyre::Report>(newest(&blocks, |b| b.timestamp).map(|as_of| (as_of, blocks)))
                })
                .await
            }
        }
    }

    pub async fn block(&self, number: u64) -> Read<Block> {
        let live = self
            .upstream
            .fetch(&Query::BlockByNumber { number })
            .await
            .and_then(|payload| normalize_block(&payload, Some(number as i64), Utc::now()));

        match live {
            Ok(block) => {
                self.mirror_write(std::slice::from_ref(&block)).await;
                Ok(Sourced::Live(block))
            }
            Err(cause) => {
                self.fall_back(format!("block {}", number), cause, async {
                    Ok::<_, eyre::Report>(self
                        .mirror
                        .load_block(number as i64)
                        .await?
                        .map(|b| (b.timestamp, b)))
                })
                .await
            }
        }
    }

    /// One transaction by hash, seen from `wallet`. The receipt is fetched
    /// best effort for gas used. The mirror fallback finds any mirrored copy
    /// of the hash, whichever wallet's list it came from.
    pub async fn transaction(&self, wallet: &str, hash: &str) -> Read<Transaction> {
        let key = hash.trim().to_ascii_lowercase();
        let live = match self
            .upstream
            .fetch(&Query::TxByHash { hash: key.clone() })
            .await
        {
            Ok(payload) => {
                let receipt = if payload.is_null() {
                    None
                } else {
                    self.upstream
                        .fetch(&Query::TxReceipt { hash: key.clone() })
                        .await
                        .ok()
                };
                normalize_transaction_detail(
                    wallet,
                    &payload,
                    receipt.as_ref(),
                    self.settings.native_decimals,
                    Utc::now(),
                )
            }
            Err(e) => Err(e),
        };

        match live {
            Ok(tx) => {
                // rows are keyed to a wallet's list, so only its own transactions go in
                let wallet_key = address_key(wallet);
                if address_key(&tx.from_address) == wallet_key
                    || address_key(&tx.to_address) == wallet_key
                {
                    self.mirror_write(std::slice::from_ref(&tx)).await;
                }
                Ok(Sourced::Live(tx))
            }
            Err(cause) => {
                self.fall_back(format!("transaction {}", key), cause, async {
                    Ok::<_, eyre::Report>(self.mirror.load_transaction(&key).await?.map(|mut t| {
                        t.wallet_address = address_key(wallet);
                        t.direction = Direction::relative_to(wallet, &t.to_address);
                        (t.timestamp, t)
                    }))
                })
                .await
            }
        }
    }

    /// Stats over already resolved blocks and transactions. Gas price is only
    /// asked for when the window is live. Without transactions the active
    /// address count is zero.
    pub async fn network_stats(
        &self,
        blocks: &Read<Vec<Block>>,
        transactions: &Read<Vec<Transaction>>,
    ) -> Read<NetworkStats> {
        let recent: &[Transaction] = match transactions {
            Ok(read) => read.data().as_slice(),
            Err(_) => &[],
        };

        match blocks {
            Ok(Sourced::Live(window)) => {
                let gas_price = self.gas_price().await;
                Ok(Sourced::Live(derive_network_stats(
                    window,
                    recent,
                    gas_price.as_ref(),
                    true,
                    Utc::now(),
                )))
            }
            Ok(Sourced::Stale { data, as_of, cause }) => Ok(Sourced::Stale {
                data: derive_network_stats(data, recent, None, false, Utc::now()),
                as_of: *as_of,
                cause: cause.clone(),
            }),
            Err(_) => Err(FetchError::NoDataAvailable("network stats".to_string())),
        }
    }

    pub async fn overview(&self, address: &str) -> Overview {
        let wallet = self.wallet(address).await;
        let transactions = self
            .transactions(address, self.settings.tx_page_size)
            .await;
        let blocks = self.latest_blocks(self.settings.latest_blocks).await;
        let stats = self.network_stats(&blocks, &transactions).await;

        Overview {
            address: address.to_string(),
            wallet,
            transactions,
            blocks,
            stats,
        }
    }

    /// Fetch and mirror the reference data once.
    pub async fn sync(&self, address: &str) -> SyncResult {
        let wallet = self.wallet(address).await;
        let transactions = self
            .transactions(address, self.settings.tx_page_size)
            .await;
        let blocks = self.latest_blocks(self.settings.latest_blocks).await;

        let result = SyncResult {
            wallet_live: matches!(wallet, Ok(Sourced::Live(_))),
            transactions: live_count(&transactions),
            blocks: live_count(&blocks),
        };

        tracing::info!(
            wallet = %address,
            wallet_live = result.wallet_live,
            transactions = result.transactions,
            blocks = result.blocks,
            "Reference data sync complete"
        );
        result
    }

    async fn fetch_latest_blocks(&self, count: usize) -> Result<Vec<Block>, FetchError> {
        let tip = self.upstream.fetch(&Query::BlockNumber).await?;
        let tip = coerce::parse_integer(&tip).ok_or_else(|| {
            FetchError::MalformedResponse(format!("block number '{}' is not an integer", tip))
        })? as u64;

        let mut blocks = Vec::with_capacity(count);
        for number in (0..=tip).rev().take(count) {
            let block = self
                .upstream
                .fetch(&Query::BlockByNumber { number })
                .await
                .and_then(|payload| normalize_block(&payload, Some(number as i64), Utc::now()));

            match block {
                Ok(block) => blocks.push(block),
                Err(e @ FetchError::InvalidField { .. }) => {
                    tracing::warn!(block = number, error = %e, "Skipping block");
                }
                Err(e) if blocks.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        block = number,
                        fetched = blocks.len(),
                        error = %e,
                        "Block window cut short"
                    );
                    break;
                }
            }
        }

        Ok(blocks)
    }

    async fn gas_price(&self) -> Option<BigDecimal> {
        self.upstream
            .fetch(&Query::GasPrice)
            .await
            .ok()
            .and_then(|payload| coerce::parse_decimal(&payload))
    }

    /// Records with estimated fields would overwrite a good mirrored row with
    /// defaults, so they are left out.
    async fn mirror_write<R: MirrorRecord>(&self, records: &[R]) {
        let complete: Vec<R> = records.iter().filter(|r| r.is_complete()).cloned().collect();
        let skipped = records.len() - complete.len();
        if skipped > 0 {
            tracing::debug!(table = R::TABLE, skipped, "Not mirroring estimated records");
        }
        if complete.is_empty() {
            return;
        }
        match self.mirror.upsert(&complete).await {
            Ok(rows) => tracing::debug!(table = R::TABLE, rows, "Mirrored records"),
            Err(e) => tracing::warn!(
                table = R::TABLE,
                error = %e,
                "Mirror write failed, serving live data"
            ),
        }
    }

    async fn fall_back<T, F>(&self, subject: String, cause: FetchError, mirrored: F) -> Read<T>
    where
        F: Future<Output = eyre::Result<Option<(DateTime<Utc>, T)>>>,
    {
        tracing::warn!(subject = %subject, cause = %cause, "Live fetch failed, reading mirror");

        match mirrored.await {
            Ok(Some((as_of, data))) => {
                tracing::info!(subject = %subject, %as_of, "Serving stale mirrored data");
                Ok(Sourced::Stale { data, as_of, cause })
            }
            Ok(None) => Err(FetchError::NoDataAvailable(subject)),
            Err(e) => {
                tracing::error!(subject = %subject, error = %e, "Mirror read failed");
                Err(FetchError::NoDataAvailable(subject))
            }
        }
    }
}

fn live_count<T>(read: &Read<Vec<T>>) -> usize {
    match read {
        Ok(Sourced::Live(records)) => records.len(),
        _ => 0,
    }
}

fn newest<T>(items: &[T], timestamp: impl Fn(&T) -> DateTime<Utc>) -> Option<DateTime<Utc>> {
    items.iter().map(timestamp).max()
}
