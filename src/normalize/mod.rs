//! Pure conversion of raw explorer payloads into the internal record shapes.

pub mod block;
pub mod coerce;
pub mod stats;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use block::normalize_block;
pub use stats::derive_network_stats;
pub use transaction::{normalize_transaction, normalize_transaction_detail, normalize_transactions};
pub use types::{Block, Direction, NetworkStats, NetworkStatus, Transaction, Wallet};
pub use wallet::normalize_wallet;
