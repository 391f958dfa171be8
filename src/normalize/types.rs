use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a transaction relative to the queried wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// `to_address` equal to the wallet (case-insensitive) is incoming, anything else outgoing.
    pub fn relative_to(wallet_address: &str, to_address: &str) -> Self {
        if !to_address.is_empty() && to_address.eq_ignore_ascii_case(wallet_address.trim()) {
            Direction::Incoming
        } else {
            Direction::Outgoing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "incoming" => Some(Direction::Incoming),
            "outgoing" => Some(Direction::Outgoing),
            _ => None,
        }
    }
}

/// Native balance of one wallet, in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Address as supplied by the caller; `key()` is the lowercase form.
    pub address: String,
    pub balance: BigDecimal,
    pub last_updated: DateTime<Utc>,
    /// Fields that were defaulted during normalization.
    #[serde(default)]
    pub estimated: Vec<String>,
}

impl Wallet {
    pub fn key(&self) -> String {
        self.address.to_ascii_lowercase()
    }
}

/// A wallet transaction. `wallet_address` and `tx_hash` are stored lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_hash: String,
    pub wallet_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value: BigDecimal,
    pub gas_used: BigDecimal,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub block_number: Option<i64>,
    #[serde(default)]
    pub estimated: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_number: i64,
    pub tx_count: i64,
    pub gas_used: BigDecimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub estimated: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkStatus {
    Healthy,
    Syncing,
    Offline,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkStatus::Healthy => "Healthy",
            NetworkStatus::Syncing => "Syncing",
            NetworkStatus::Offline => "Offline",
        }
    }
}

/// Per-request aggregate over the latest blocks window. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub latest_block: Option<i64>,
    pub blocks_sampled: usize,
    pub total_transactions: i64,
    /// Distinct sender and recipient addresses across the recent transactions.
    pub active_addresses: usize,
    pub avg_gas_used: BigDecimal,
    pub tx_per_second: f64,
    pub gas_price_gwei: Option<BigDecimal>,
    pub status: NetworkStatus,
    pub computed_at: DateTime<Utc>,
}
