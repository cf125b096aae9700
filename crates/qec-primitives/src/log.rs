use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Epoch, LogId, TickNumber};

/// Sub-opcode carried inside `raw_data.customMessage` for `log_type = 255`
/// entries (spec §6, §9 "Dynamic type dispatch for logs"). Modeled as a
/// tagged-union decoder: `log_type` picks [`LogType`], and within
/// [`LogType::CustomMessage`] this picks the nested sub-variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomMessageOpcode {
    EndEpoch,
    StartDistributeRewards,
    EndDistributeRewards,
    Other(u8),
}

impl CustomMessageOpcode {
    pub fn from_wire(code: u8) -> Self {
        match code {
            // Wire values are network-assigned constants; only the three the
            // core interprets are named, everything else passes through.
            1 => CustomMessageOpcode::EndEpoch,
            2 => CustomMessageOpcode::StartDistributeRewards,
            3 => CustomMessageOpcode::EndDistributeRewards,
            other => CustomMessageOpcode::Other(other),
        }
    }
}

/// Log-event kind, mirroring the upstream node's `logType` field. Values
/// outside this set are preserved as [`LogType::Unknown`] rather than
/// rejected — the flow tracker only cares about transfer-shaped events, and
/// new log types get added to the network faster than explorers update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    QuTransfer,
    AssetIssuance,
    AssetOwnershipChange,
    AssetPossessionChange,
    Burn,
    DustBurn,
    CustomMessage(CustomMessageOpcode),
    Unknown(u8),
}

impl LogType {
    pub fn from_wire(log_type: u8, custom_message_opcode: Option<u8>) -> Self {
        match log_type {
            0 => LogType::QuTransfer,
            1 => LogType::AssetIssuance,
            2 => LogType::AssetOwnershipChange,
            3 => LogType::AssetPossessionChange,
            8 => LogType::Burn,
            9 => LogType::DustBurn,
            255 => LogType::CustomMessage(CustomMessageOpcode::from_wire(
                custom_message_opcode.unwrap_or(0),
            )),
            other => LogType::Unknown(other),
        }
    }

    pub fn wire_code(&self) -> u8 {
        match self {
            LogType::QuTransfer => 0,
            LogType::AssetIssuance => 1,
            LogType::AssetOwnershipChange => 2,
            LogType::AssetPossessionChange => 3,
            LogType::Burn => 8,
            LogType::DustBurn => 9,
            LogType::CustomMessage(_) => 255,
            LogType::Unknown(code) => *code,
        }
    }

    /// Logs the flow tracker treats as moving QU between two addresses.
    /// Dust burns still carry a source/dest pair and move value, so they
    /// participate the same way a burn does.
    pub fn is_transfer_shaped(&self) -> bool {
        matches!(self, LogType::QuTransfer | LogType::Burn | LogType::DustBurn)
    }
}

/// A single log entry emitted during tick processing (spec §3). `source`
/// and `dest` are `None` for log types that don't carry an address pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub epoch: Epoch,
    pub log_id: LogId,
    pub tick_number: TickNumber,
    pub log_type: LogType,
    pub tx_hash: Option<String>,
    pub source: Option<Address>,
    pub dest: Option<Address>,
    pub amount: Amount,
    pub asset_name: Option<String>,
    /// Raw JSON payload, preserved verbatim for fields this core doesn't
    /// interpret further (asset details, unknown custom messages).
    pub raw_data: serde_json::Value,
    pub timestamp_ms: u64,
}

impl Log {
    /// True if this log is a terminal END_EPOCH marker, as required inside
    /// `[end_tick_start_log_id, end_tick_end_log_id]` for epoch completion
    /// (spec §3, §4.3 step 5).
    pub fn is_end_epoch_marker(&self) -> bool {
        matches!(
            self.log_type,
            LogType::CustomMessage(CustomMessageOpcode::EndEpoch)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_message_decodes_named_opcodes() {
        assert_eq!(
            LogType::from_wire(255, Some(1)),
            LogType::CustomMessage(CustomMessageOpcode::EndEpoch)
        );
        assert_eq!(
            LogType::from_wire(255, Some(200)),
            LogType::CustomMessage(CustomMessageOpcode::Other(200))
        );
    }

    #[test]
    fn wire_code_roundtrips_for_named_types() {
        for lt in [
            LogType::QuTransfer,
            LogType::AssetIssuance,
            LogType::AssetOwnershipChange,
            LogType::AssetPossessionChange,
            LogType::Burn,
            LogType::DustBurn,
        ] {
            let code = lt.wire_code();
            assert_eq!(LogType::from_wire(code, None), lt);
        }
    }

    #[test]
    fn transfer_shaped_excludes_custom_and_asset_logs() {
        assert!(LogType::QuTransfer.is_transfer_shaped());
        assert!(LogType::Burn.is_transfer_shaped());
        assert!(LogType::DustBurn.is_transfer_shaped());
        assert!(!LogType::AssetIssuance.is_transfer_shaped());
        assert!(!LogType::CustomMessage(CustomMessageOpcode::EndEpoch).is_transfer_shaped());
    }
}
