//! Ambient stack shared by every worker crate: structured logging init,
//! TTL caching, fixed-backoff retry, and Prometheus metrics registration.
//! None of this is domain logic — it's the plumbing every background
//! worker in this core reaches for the same way the teacher binary's
//! `strata-common`/`strata-sync` crates do.

pub mod logging;
pub mod metrics;
pub mod retry;
pub mod ttl_cache;

pub use retry::retry_with_fixed_backoff;
pub use ttl_cache::TtlCache;
