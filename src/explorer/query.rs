/// The query kinds the dashboard issues against the explorer API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Balance {
        address: String,
    },
    TxList {
        address: String,
        start_block: u64,
        end_block: Option<u64>,
        page: u32,
        offset: u32,
    },
    BlockNumber,
    BlockByNumber {
        number: u64,
    },
    GasPrice,
    TxByHash {
        hash: String,
    },
    TxReceipt {
        hash: String,
    },
}

impl Query {
    pub fn module(&self) -> &'static str {
        match self {
            Query::Balance { .. } | Query::TxList { .. } => "account",
            Query::BlockNumber
            | Query::BlockByNumber { .. }
            | Query::GasPrice
            | Query::TxByHash { .. }
            | Query::TxReceipt { .. } => "proxy",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Query::Balance { .. } => "balance",
            Query::TxList { .. } => "txlist",
            Query::BlockNumber => "eth_blockNumber",
            Query::BlockByNumber { .. } => "eth_getBlockByNumber",
            Query::GasPrice => "eth_gasPrice",
            Query::TxByHash { .. } => "eth_getTransactionByHash",
            Query::TxReceipt { .. } => "eth_getTransactionReceipt",
        }
    }

    /// Query-string parameters, excluding the API key.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("module", self.module().to_string()),
            ("action", self.action().to_string()),
        ];

        match self {
            Query::Balance { address } => {
                params.push(("address", address.clone()));
                params.push(("tag", "latest".to_string()));
            }
            Query::TxList {
                address,
                start_block,
                end_block,
                page,
                offset,
            } => {
                params.push(("address", address.clone()));
                params.push(("startblock", start_block.to_string()));
                params.push((
                    "endblock",
                    end_block.map_or_else(|| "latest".to_string(), |b| b.to_string()),
                ));
                params.push(("page", page.to_string()));
                params.push(("offset", offset.to_string()));
                params.push(("sort", "desc".to_string()));
            }
            Query::BlockByNumber { number } => {
                params.push(("tag", format!("0x{:x}", number)));
                params.push(("boolean", "false".to_string()));
            }
            Query::TxByHash { hash } | Query::TxReceipt { hash } => {
                params.push(("txhash", hash.clone()));
            }
            Query::BlockNumber | Query::GasPrice => {}
        }

        params
    }
}
