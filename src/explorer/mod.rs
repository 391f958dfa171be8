pub mod client;
pub mod envelope;
pub mod query;

pub use client::{ExplorerClient, ExplorerSource};
pub use query::Query;
