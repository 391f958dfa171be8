use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dashboard::{Overview, Read, Sourced};
use crate::error::FetchError;
use crate::normalize::{Block, Direction, NetworkStats, Transaction, Wallet};

// ============================================================
// Query params
// ============================================================

#[derive(Debug, Deserialize)]
pub struct AddressParam {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParam {
    pub limit: Option<u32>,
}

// ============================================================
// Sections
// ============================================================

/// One dashboard section in exactly one of three display states.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Section<T> {
    Live {
        data: T,
    },
    Stale {
        data: T,
        as_of: DateTime<Utc>,
        cause: FetchError,
    },
    Unavailable {
        reason: String,
    },
}

impl<T> Section<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Live { data } | Section::Stale { data, .. } => Some(data),
            Section::Unavailable { .. } => None,
        }
    }

    pub fn state(&self) -> &'static str {
        match self {
            Section::Live { .. } => "live",
            Section::Stale { .. } => "stale",
            Section::Unavailable { .. } => "unavailable",
        }
    }
}

impl<T> From<Read<T>> for Section<T> {
    fn from(read: Read<T>) -> Self {
        match read {
            Ok(Sourced::Live(data)) => Section::Live { data },
            Ok(Sourced::Stale { data, as_of, cause }) => Section::Stale { data, as_of, cause },
            Err(e) => Section::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_reachable: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockActivity {
    pub block_number: i64,
    pub tx_count: i64,
}

/// Chart data for the wallet and the latest blocks window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub incoming: usize,
    pub outgoing: usize,
    /// Oldest block first.
    pub tx_per_block: Vec<BlockActivity>,
}

impl ActivitySummary {
    pub fn compute(transactions: Option<&Vec<Transaction>>, blocks: Option<&Vec<Block>>) -> Self {
        let (incoming, outgoing) = transactions
            .map(|txs| {
                txs.iter().fold((0, 0), |(i, o), tx| match tx.direction {
                    Direction::Incoming => (i + 1, o),
                    Direction::Outgoing => (i, o + 1),
                })
            })
            .unwrap_or((0, 0));

        let mut tx_per_block: Vec<BlockActivity> = blocks
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|b| BlockActivity {
                        block_number: b.block_number,
                        tx_count: b.tx_count,
                    })
                    .collect()
            })
            .unwrap_or_default();
        tx_per_block.sort_by_key(|b| b.block_number);

        Self {
            incoming,
            outgoing,
            tx_per_block,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub address: String,
    pub wallet: Section<Wallet>,
    pub transactions: Section<Vec<Transaction>>,
    pub blocks: Section<Vec<Block>>,
    pub stats: Section<NetworkStats>,
    pub activity: ActivitySummary,
    pub refresh_secs: u64,
    pub generated_at: DateTime<Utc>,
}

impl DashboardView {
    pub fn new(overview: Overview, refresh_secs: u64) -> Self {
        let transactions = Section::from(overview.transactions);
        let blocks = Section::from(overview.blocks);
        let activity = ActivitySummary::compute(transactions.data(), blocks.data());

        Self {
            address: overview.address,
            wallet: overview.wallet.into(),
            transactions,
            blocks,
            stats: overview.stats.into(),
            activity,
            refresh_secs,
            generated_at: Utc::now(),
        }
    }
}
