use std::collections::HashSet;

use qec_primitives::{Address, Epoch};
use qec_store::FlowStateRow;

/// Classification of an address as the flow tracker sees it (spec §4.6
/// `process_transfer`: "Classify dest: exchange -> terminal, SC ->
/// terminal, else intermediary").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Computor,
    Intermediary,
    Exchange,
    SmartContract,
}

impl AddressType {
    pub fn wire_code(self) -> u8 {
        match self {
            AddressType::Computor => 0,
            AddressType::Intermediary => 1,
            AddressType::Exchange => 2,
            AddressType::SmartContract => 3,
        }
    }

    pub fn from_wire(code: u8) -> Self {
        match code {
            0 => AddressType::Computor,
            2 => AddressType::Exchange,
            3 => AddressType::SmartContract,
            _ => AddressType::Intermediary,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AddressType::Exchange | AddressType::SmartContract)
    }

    pub fn label(self) -> &'static str {
        match self {
            AddressType::Computor => "computor",
            AddressType::Intermediary => "intermediary",
            AddressType::Exchange => "exchange",
            AddressType::SmartContract => "smart_contract",
        }
    }
}

/// The address sets a window pass needs to classify destinations (spec
/// §4.6 per-window pass inputs: "the exchange set X, SC set S ..., the
/// multicast contract's address Q distinguished, computor set K").
pub struct ClassificationSets {
    pub computors: HashSet<Address>,
    pub exchanges: HashSet<Address>,
    pub smart_contracts: HashSet<Address>,
    pub multicast_contract: Address,
}

impl ClassificationSets {
    pub fn classify(&self, addr: &Address) -> AddressType {
        if self.computors.contains(addr) {
            AddressType::Computor
        } else if self.exchanges.contains(addr) {
            AddressType::Exchange
        } else if self.smart_contracts.contains(addr) {
            AddressType::SmartContract
        } else {
            AddressType::Intermediary
        }
    }
}

/// One `(address, origin)` ledger entry — the in-memory write-through cache
/// a window pass mutates directly, pre-populated from the store's loaded
/// pending rows so `p_eff` always reads "in-memory first, store as
/// fallback" for free (spec §4.6 `process_transfer` preamble).
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub emission_epoch: Epoch,
    pub address: Address,
    pub origin: Address,
    pub address_type: AddressType,
    pub received: u64,
    pub sent: u64,
    pub hop_level: u32,
    pub is_terminal: bool,
    pub is_complete: bool,
}

impl PendingEntry {
    pub fn pending(&self) -> u64 {
        self.received.saturating_sub(self.sent)
    }

    pub fn from_row(row: FlowStateRow) -> Self {
        Self {
            emission_epoch: row.emission_epoch,
            address: row.address,
            origin: row.origin_address,
            address_type: AddressType::from_wire(row.address_type),
            received: row.received,
            sent: row.sent,
            hop_level: row.hop_level,
            is_terminal: row.is_terminal,
            is_complete: row.is_complete,
        }
    }

    pub fn into_row(self) -> FlowStateRow {
        FlowStateRow {
            emission_epoch: self.emission_epoch,
            address: self.address,
            origin_address: self.origin,
            address_type: self.address_type.wire_code(),
            received: self.received,
            sent: self.sent,
            hop_level: self.hop_level,
            is_terminal: self.is_terminal,
            is_complete: self.is_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_received_minus_sent() {
        let entry = PendingEntry {
            emission_epoch: Epoch(1),
            address: Address::burn(),
            origin: Address::burn(),
            address_type: AddressType::Computor,
            received: 1000,
            sent: 600,
            hop_level: 1,
            is_terminal: false,
            is_complete: false,
        };
        assert_eq!(entry.pending(), 400);
    }

    #[test]
    fn burn_address_with_no_other_classification_is_intermediary() {
        let sets = ClassificationSets {
            computors: HashSet::new(),
            exchanges: HashSet::new(),
            smart_contracts: HashSet::new(),
            multicast_contract: Address::burn(),
        };
        assert_eq!(sets.classify(&Address::burn()), AddressType::Intermediary);
    }

    #[test]
    fn unclassified_address_is_intermediary() {
        let sets = ClassificationSets {
            computors: HashSet::new(),
            exchanges: HashSet::new(),
            smart_contracts: HashSet::new(),
            multicast_contract: Address::burn(),
        };
        let addr: Address = "B".repeat(60).parse().unwrap();
        assert_eq!(sets.classify(&addr), AddressType::Intermediary);
        assert!(!AddressType::Intermediary.is_terminal());
    }
}
