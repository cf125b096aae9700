//! Shared domain types for the Qubic explorer ingestion core.
//!
//! Every other crate in this workspace depends on this one and none of its
//! types know anything about RPC transport, storage engines, or background
//! tasks — that separation is what lets `qec-store`, `qec-rpc-client`, and
//! the worker crates evolve independently.

pub mod identity;
mod log;
mod snapshot;

pub use log::{CustomMessageOpcode, Log, LogType};
pub use snapshot::{
    AssetRecordKind, AssetSnapshot, BalanceSnapshot, EmissionImportMarker, SpectrumImportMarker,
    UniverseImportMarker,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 60-character base-26 Qubic identity, stored as raw ASCII bytes rather
/// than `String` so it is `Copy` and fits inline in hot-path structs (ticks
/// carry thousands of these).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 60]);

impl Address {
    pub const LEN: usize = 60;

    /// The canonical burn/zero address (all-`A` payload, see [`identity`]).
    pub fn burn() -> Self {
        identity::identity(&identity::BURN_PUBLIC_KEY)
    }

    pub fn as_str(&self) -> &str {
        // Safe: every byte is ASCII 'A'..='Z' by construction.
        std::str::from_utf8(&self.0).unwrap_or("")
    }

    pub fn is_burn(&self) -> bool {
        *self == Self::burn()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        identity::sanitize_identity_chars(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a 60-letter identity: {s}")))
    }
}

impl std::str::FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        identity::sanitize_identity_chars(s).ok_or(AddressParseError)
    }
}

#[derive(Debug, Error)]
#[error("address must be 60 uppercase ASCII letters after stripping non-letter bytes")]
pub struct AddressParseError;

/// Tick (block) height. The newtype stops a bare tick number from being
/// passed where an epoch or log id is expected; tick numbers strictly
/// increase but may skip values (non-contiguous).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TickNumber(pub u64);

impl TickNumber {
    pub fn next(self) -> Self {
        TickNumber(self.0 + 1)
    }
}

impl fmt::Display for TickNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Epoch index. Epochs are the unit of computor-committee rotation and of
/// spectrum/universe snapshot publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(pub u32);

impl Epoch {
    /// The epoch whose emissions are still being spent during `self`
    /// (spec §4.5: "emissions are distributed at the end of the emission
    /// epoch and spent during the current epoch"). `None` at epoch 0.
    pub fn emission_epoch(self) -> Option<Epoch> {
        self.0.checked_sub(1).map(Epoch)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a log entry within an epoch's log stream. Monotonic within
/// an epoch (spec §3), used to give every transfer a total order alongside
/// `tick_number` (spec §5: processed strictly by `(tick, log_id)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Amount of QU (the smallest indivisible unit — there are no fractional
/// QUs), carried as `u64` to match the upstream node's wire representation.
pub type Amount = u64;

/// A single on-chain transaction within a tick (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// 60 hex characters, the transaction's identifying hash.
    pub hash: String,
    pub tick_number: TickNumber,
    pub epoch: Epoch,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub input_type: u16,
    /// Hex-encoded input payload.
    pub input_data: String,
    pub executed: bool,
    /// Inclusive range of log ids recording this transaction's effects.
    pub log_id_from: LogId,
    pub log_id_length: u32,
    pub timestamp_ms: u64,
}

/// Metadata describing an epoch's lifecycle, tracked by the epoch manager
/// (spec §4.3). `final_stats` is an opaque aggregation blob computed once
/// at completion, left as JSON here since its shape is a materialised-view
/// projection rather than a fixed domain type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMeta {
    pub epoch: Epoch,
    pub initial_tick: TickNumber,
    pub end_tick: TickNumber,
    pub end_tick_start_log_id: LogId,
    pub end_tick_end_log_id: LogId,
    pub is_complete: bool,
    pub final_stats: Option<serde_json::Value>,
}

impl EpochMeta {
    /// `is_complete = (end_tick > initial_tick && end_tick > 0)`, per the
    /// meta-sync worker's upsert rule (spec §4.3).
    pub fn derive_is_complete(&self) -> bool {
        self.end_tick > self.initial_tick && self.end_tick.0 > 0
    }
}

pub const COMMITTEE_SIZE: usize = 676;

/// The 676-member computor committee for an epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputorList {
    pub epoch: Epoch,
    pub addresses: Vec<Address>,
}

/// Per-computor emission recorded at epoch boundary, plus the epoch-wide
/// summary row (spec §4.3: "one row per computor ... plus one summary row").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputorEmission {
    pub epoch: Epoch,
    pub address: Address,
    pub amount: Amount,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionSummary {
    pub epoch: Epoch,
    pub computor_count: u32,
    pub total_emission: Amount,
    pub emission_tick: TickNumber,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_roundtrips_through_string() {
        let addr = Address::burn();
        let s = addr.as_str().to_string();
        let parsed: Address = s.parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn epoch_meta_derives_completeness_from_ticks() {
        let incomplete = EpochMeta {
            epoch: Epoch(5),
            initial_tick: TickNumber(100),
            end_tick: TickNumber(0),
            end_tick_start_log_id: LogId(0),
            end_tick_end_log_id: LogId(0),
            is_complete: false,
            final_stats: None,
        };
        assert!(!incomplete.derive_is_complete());

        let complete = EpochMeta {
            end_tick: TickNumber(200),
            ..incomplete
        };
        assert!(complete.derive_is_complete());
    }

    #[test]
    fn emission_epoch_is_none_at_zero() {
        assert_eq!(Epoch(0).emission_epoch(), None);
        assert_eq!(Epoch(5).emission_epoch(), Some(Epoch(4)));
    }
}
