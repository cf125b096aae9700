//! Continuous multi-hop emission flow tracker (spec §2 component G, §4.6 —
//! "the hardest subsystem").
//!
//! Per emission epoch, every unit of newly-minted currency is tracked from
//! the 676 computors outward through up to 10 hops until it lands on an
//! exchange or smart contract (terminal) or remains pending. State is kept
//! in a `(address, origin)`-keyed ledger so cycles in the flow graph and
//! multi-origin attribution are both handled without double-counting.
//! Processing is continuous across windows: an intermediary that received
//! funds in a prior cycle but hasn't spent them stays active until it does.
//!
//! This crate deliberately does not implement the legacy single-window
//! hop-tracker the original system also carries — it doesn't track state
//! across windows and is explicitly superseded (spec §9 open questions).

mod error;
mod init;
mod process;
mod state;
mod validator;
mod visualization;
mod window;
mod worker;

pub use error::FlowError;
pub use init::initialize_emission_epoch;
pub use state::{AddressType, ClassificationSets, PendingEntry};
pub use validator::{validate_conservation, ValidationReport};
pub use visualization::{build_visualization, FlowEdge, FlowGraph, FlowNode};
pub use window::run_window_pass;
pub use worker::{spawn_flow_tracker, FlowTrackerWorker};

/// `maxHops` (spec §4.6): an intermediary more than 10 hops from a computor
/// stops being tracked forward even if not yet terminal.
pub const MAX_HOPS: u32 = 10;
