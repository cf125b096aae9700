//! Upstream RPC client and cache (spec §2 component B, §4.2).
//!
//! A single multiplexed `jsonrpsee` WebSocket connection per process, with
//! automatic reconnect/backoff and TTL caching for the read-mostly queries
//! the rest of the core leans on hardest (balance, computor list).

mod client;
mod error;
mod types;

pub use client::RpcClient;
pub use error::RpcError;
pub use types::{BalanceInfo, BobLog, ComputorsResponse, EpochInfo, NewTickEvent};
