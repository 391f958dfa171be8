use sqlx::query_builder::Separated;
use sqlx::Postgres;

use super::MirrorRecord;
use crate::normalize::{Block, Transaction, Wallet};

impl MirrorRecord for Wallet {
    const TABLE: &'static str = "wallets";
    const KEY: &'static str = "address";
    const COLUMNS: &'static [&'static str] = &["address", "balance", "last_updated"];

    fn key(&self) -> String {
        Wallet::key(self)
    }

    fn is_complete(&self) -> bool {
        self.estimated.is_empty()
    }

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.key())
            .push_bind(&self.balance)
            .push_bind(self.last_updated);
    }
}

impl MirrorRecord for Transaction {
    const TABLE: &'static str = "transactions";
    const KEY: &'static str = "tx_hash";
    const COLUMNS: &'static [&'static str] = &[
        "tx_hash",
        "wallet_address",
        "from_address",
        "to_address",
        "value",
        "gas_used",
        "timestamp",
        "direction",
        "block_number",
    ];

    fn key(&self) -> String {
        self.tx_hash.clone()
    }

    fn is_complete(&self) -> bool {
        self.estimated.is_empty()
    }

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.tx_hash)
            .push_bind(&self.wallet_address)
            .push_bind(&self.from_address)
            .push_bind(&self.to_address)
            .push_bind(&self.value)
            .push_bind(&self.gas_used)
            .push_bind(self.timestamp)
            .push_bind(self.direction.as_str())
            .push_bind(self.block_number);
    }
}

impl MirrorRecord for Block {
    const TABLE: &'static str = "blocks";
    const KEY: &'static str = "block_number";
    const COLUMNS: &'static [&'static str] = &["block_number", "tx_count", "gas_used", "timestamp"];

    fn key(&self) -> String {
        self.block_number.to_string()
    }

    fn is_complete(&self) -> bool {
        self.estimated.is_empty()
    }

    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.block_number)
            .push_bind(self.tx_count)
            .push_bind(&self.gas_used)
            .push_bind(self.timestamp);
    }
}
