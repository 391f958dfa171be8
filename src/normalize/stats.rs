use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::coerce::{address_key, from_base_units};
use super::types::{Block, NetworkStats, NetworkStatus, Transaction};

/// Aggregate a window of blocks into network stats.
///
/// `gas_price_wei` comes from `eth_gasPrice` when the explorer answered it.
/// `transactions` are the recent transactions the active address count is
/// taken over. A window built from mirrored blocks reports `Offline`; an
/// empty window reports `Syncing`.
pub fn derive_network_stats(
    blocks: &[Block],
    transactions: &[Transaction],
    gas_price_wei: Option<&BigDecimal>,
    live: bool,
    now: DateTime<Utc>,
) -> NetworkStats {
    let total_transactions: i64 = blocks.iter().map(|b| b.tx_count).sum();

    let avg_gas_used = if blocks.is_empty() {
        BigDecimal::from(0)
    } else {
        let total_gas = blocks
            .iter()
            .fold(BigDecimal::from(0), |acc, b| acc + &b.gas_used);
        (total_gas / BigDecimal::from(blocks.len() as u64)).round(2)
    };

    // The span covers the intervals after the oldest block, so its own
    // transactions are not counted.
    let oldest = blocks.iter().min_by_key(|b| b.timestamp);
    let newest = blocks.iter().map(|b| b.timestamp).max();
    let tx_per_second = match (oldest, newest) {
        (Some(oldest), Some(newest)) if newest > oldest.timestamp => {
            let span = (newest - oldest.timestamp).num_seconds().max(1);
            (total_transactions - oldest.tx_count) as f64 / span as f64
        }
        _ => 0.0,
    };

    let active_addresses = transactions
        .iter()
        .flat_map(|tx| [tx.from_address.as_str(), tx.to_address.as_str()])
        .filter(|address| !address.is_empty())
        .map(address_key)
        .collect::<HashSet<_>>()
        .len();

    let status = if !live {
        NetworkStatus::Offline
    } else if blocks.is_empty() {
        NetworkStatus::Syncing
    } else {
        NetworkStatus::Healthy
    };

    NetworkStats {
        latest_block: blocks.iter().map(|b| b.block_number).max(),
        blocks_sampled: blocks.len(),
        total_transactions,
        active_addresses,
        avg_gas_used,
        tx_per_second,
        gas_price_gwei: gas_price_wei.and_then(|wei| from_base_units(wei, 9)),
        status,
        computed_at: now,
    }
}
