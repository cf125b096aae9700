//! Periodic analytics snapshotter (spec §2 component F, §4.5).
//!
//! Every 5 minutes the worker tries to emit one more immutable row per
//! snapshot kind (holder, network, burn, miner-flow), tiling fixed 4-hour
//! wall-clock windows across the store's tick history. On startup it runs
//! the same "emit next row" loop as a catch-up pass before settling into
//! steady-state cadence.

mod burn;
mod error;
mod holder;
mod miner_flow;
mod network;
mod window;
mod worker;

pub use burn::emit_next_burn_row;
pub use error::AnalyticsError;
pub use holder::emit_next_holder_row;
pub use miner_flow::emit_next_miner_flow_row;
pub use network::emit_next_network_row;
pub use window::{next_window, Window, WINDOW_WIDTH};
pub use worker::{spawn_analytics_snapshotter, SnapshotterWorker};
