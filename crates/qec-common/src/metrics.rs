use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// Count of analytics snapshot rows emitted, keyed by kind
    /// (holder/network/burn/miner_flow). Spec §4.5 [SUPPLEMENT].
    pub static ref SNAPSHOTS_EMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "snapshots_emitted_total",
        "Number of analytics snapshot rows emitted, by kind",
        &["kind"]
    )
    .expect("metric registration is infallible outside of duplicate registration bugs");

    /// Wall-clock time to emit one analytics snapshot row, by kind.
    pub static ref SNAPSHOT_EMIT_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "snapshot_emit_duration_seconds",
        "Time to compute and insert one analytics snapshot row, by kind",
        &["kind"]
    )
    .expect("metric registration is infallible outside of duplicate registration bugs");

    /// Count of RPC client reconnects, observable alongside the
    /// `is_connected()` status (spec §4.2 [SUPPLEMENT]).
    pub static ref RPC_RECONNECTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rpc_reconnects_total",
        "Number of times the upstream RPC client has reconnected",
        &["reason"]
    )
    .expect("metric registration is infallible outside of duplicate registration bugs");
}
