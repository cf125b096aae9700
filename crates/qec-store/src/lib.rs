//! Append-oriented columnar store (spec §2 component A, §6 "Store tables").
//!
//! Backed by ClickHouse via the `clickhouse` crate: an async, native-HTTP
//! client with typed row (de)serialization over `serde`, chosen because no
//! repo in the reference corpus runs an OLAP store — see `DESIGN.md`.
//! Every worker crate talks to the store only through the methods here;
//! `schema` row shapes never leak past this crate's boundary.

mod analytics_ops;
mod epoch_ops;
mod error;
mod flow_ops;
mod push_ops;
pub mod schema;
mod snapshot_ops;
mod store;
mod tick_ops;

pub use analytics_ops::{BurnAggregates, NetworkAggregates, SnapshotKind};
pub use error::StoreError;
pub use flow_ops::{FlowHopInsert, FlowStateRow};
pub use push_ops::PushSubscriptionRecord;
pub use store::{Store, MAX_BATCH_ROWS};
pub use tick_ops::TickStamp;
