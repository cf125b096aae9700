use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use qec_primitives::Address;
use tokio::sync::Mutex;
use tracing::warn;

use crate::bundle::LabelBundle;
use crate::error::LabelsError;

const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Address classification (spec §4.1: "kind ∈ {known, exchange,
/// smartcontract, tokenissuer, burn}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Known,
    Exchange,
    SmartContract,
    TokenIssuer,
    Burn,
}

impl LabelKind {
    fn from_wire(raw: &str) -> Self {
        match raw {
            "exchange" => LabelKind::Exchange,
            "smartcontract" => LabelKind::SmartContract,
            "tokenissuer" => LabelKind::TokenIssuer,
            "burn" => LabelKind::Burn,
            _ => LabelKind::Known,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub address: Address,
    pub label: String,
    pub kind: LabelKind,
    pub contract_index: Option<u16>,
    pub website: Option<String>,
}

/// One immutable point-in-time view of the whole registry. Replaced
/// wholesale on refresh (spec §3: "Label registry entries live for the
/// process lifetime but are replaced wholesale on refresh").
struct RegistrySnapshot {
    by_address: HashMap<Address, LabelEntry>,
    by_kind: HashMap<LabelKind, Vec<Address>>,
    /// `(label, address)` pairs sorted by label for prefix/contains scans.
    sorted_labels: Vec<(String, Address)>,
    procedures: HashMap<(Address, u16), String>,
    loaded_at: Instant,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        let mut snapshot = Self {
            by_address: HashMap::new(),
            by_kind: HashMap::new(),
            sorted_labels: Vec::new(),
            procedures: HashMap::new(),
            loaded_at: Instant::now(),
        };
        snapshot.insert_burn_address();
        snapshot
    }

    fn from_bundle(bundle: LabelBundle) -> Self {
        let mut by_address = HashMap::new();
        let mut by_kind: HashMap<LabelKind, Vec<Address>> = HashMap::new();
        let mut sorted_labels = Vec::new();

        for entry in bundle.addresses {
            let Ok(address) = entry.address.parse::<Address>() else {
                warn!(address = %entry.address, "skipping malformed address in label bundle");
                continue;
            };
            let kind = LabelKind::from_wire(&entry.kind);
            by_kind.entry(kind).or_default().push(address);
            sorted_labels.push((entry.label.clone(), address));
            by_address.insert(
                address,
                LabelEntry {
                    address,
                    label: entry.label,
                    kind,
                    contract_index: entry.contract_index,
                    website: entry.website,
                },
            );
        }

        let mut procedures = HashMap::new();
        for proc in bundle.procedures {
            if let Ok(address) = proc.contract_address.parse::<Address>() {
                procedures.insert((address, proc.input_type), proc.name);
            }
        }

        sorted_labels.sort_by(|a, b| a.0.cmp(&b.0));

        let mut snapshot = Self {
            by_address,
            by_kind,
            sorted_labels,
            procedures,
            loaded_at: Instant::now(),
        };
        snapshot.insert_burn_address();
        snapshot
    }

    /// "The burn address is always registered with kind=burn" (spec §4.1),
    /// regardless of what the bundle contains.
    fn insert_burn_address(&mut self) {
        let burn = Address::burn();
        self.by_kind.entry(LabelKind::Burn).or_default();
        if !self.by_kind[&LabelKind::Burn].contains(&burn) {
            self.by_kind.get_mut(&LabelKind::Burn).unwrap().push(burn);
        }
        self.sorted_labels.retain(|(_, a)| *a != burn);
        self.sorted_labels.push(("Burn Address".to_string(), burn));
        self.sorted_labels.sort_by(|a, b| a.0.cmp(&b.0));
        self.by_address.insert(
            burn,
            LabelEntry {
                address: burn,
                label: "Burn Address".to_string(),
                kind: LabelKind::Burn,
                contract_index: None,
                website: None,
            },
        );
    }
}

/// Copy-on-write registry (spec §4.1, §9: "copy-on-write atomic swap so
/// readers never lock"). `lookup`/`byType`/`searchByLabel`/`procedureName`
/// each take an `Arc` snapshot via `ArcSwap::load` and never contend with a
/// concurrent `ensure_fresh` writer.
pub struct LabelRegistry {
    bundle_url: String,
    http: reqwest::Client,
    snapshot: ArcSwap<RegistrySnapshot>,
    refresh_lock: Mutex<()>,
}

impl LabelRegistry {
    pub fn new(bundle_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            bundle_url: bundle_url.into(),
            http: reqwest::Client::new(),
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::empty()),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn lookup(&self, address: &Address) -> Option<LabelEntry> {
        self.snapshot.load().by_address.get(address).cloned()
    }

    pub fn by_type(&self, kind: LabelKind) -> Vec<LabelEntry> {
        let snapshot = self.snapshot.load();
        snapshot
            .by_kind
            .get(&kind)
            .map(|addrs| {
                addrs
                    .iter()
                    .filter_map(|a| snapshot.by_address.get(a).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ranking: exact match > prefix > contains, tie-break by label length
    /// ascending (spec §4.1).
    pub fn search_by_label(&self, query: &str, limit: usize) -> Vec<LabelEntry> {
        let snapshot = self.snapshot.load();
        let needle = query.to_lowercase();

        #[derive(PartialEq, Eq, PartialOrd, Ord)]
        enum Rank {
            Exact,
            Prefix,
            Contains,
        }

        let mut matches: Vec<(Rank, usize, &LabelEntry)> = Vec::new();
        for (label, address) in &snapshot.sorted_labels {
            let lower = label.to_lowercase();
            let rank = if lower == needle {
                Rank::Exact
            } else if lower.starts_with(&needle) {
                Rank::Prefix
            } else if lower.contains(&needle) {
                Rank::Contains
            } else {
                continue;
            };
            if let Some(entry) = snapshot.by_address.get(address) {
                matches.push((rank, label.len(), entry));
            }
        }
        matches.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        matches
            .into_iter()
            .take(limit)
            .map(|(_, _, entry)| entry.clone())
            .collect()
    }

    pub fn procedure_name(&self, contract_address: &Address, input_type: u16) -> Option<String> {
        self.snapshot
            .load()
            .procedures
            .get(&(*contract_address, input_type))
            .cloned()
    }

    /// Refreshes if the current snapshot is older than 1 hour (spec §4.1).
    /// Concurrent callers share one in-flight fetch via `refresh_lock`
    /// rather than racing duplicate downloads.
    pub async fn ensure_fresh(&self) -> Result<(), LabelsError> {
        if self.snapshot.load().loaded_at.elapsed() < REFRESH_INTERVAL {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        if self.snapshot.load().loaded_at.elapsed() < REFRESH_INTERVAL {
            return Ok(());
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<(), LabelsError> {
        let bundle: LabelBundle = self
            .http
            .get(&self.bundle_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.snapshot.store(Arc::new(RegistrySnapshot::from_bundle(bundle)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(bundle: LabelBundle) -> Arc<LabelRegistry> {
        let registry = LabelRegistry::new("http://unused.invalid");
        registry
            .snapshot
            .store(Arc::new(RegistrySnapshot::from_bundle(bundle)));
        registry
    }

    #[test]
    fn burn_address_always_registered() {
        let registry = LabelRegistry::new("http://unused.invalid");
        let entry = registry.lookup(&Address::burn()).expect("burn is always present");
        assert!(matches!(entry.kind, LabelKind::Burn));
    }

    #[test]
    fn search_ranks_exact_before_prefix_before_contains() {
        let bundle = LabelBundle {
            addresses: vec![
                crate::bundle::BundleEntry {
                    address: "A".repeat(60),
                    label: "Exchange".to_string(),
                    kind: "exchange".to_string(),
                    contract_index: None,
                    website: None,
                },
                crate::bundle::BundleEntry {
                    address: "B".repeat(60),
                    label: "Exchange Two".to_string(),
                    kind: "exchange".to_string(),
                    contract_index: None,
                    website: None,
                },
                crate::bundle::BundleEntry {
                    address: "C".repeat(60),
                    label: "Big Exchange".to_string(),
                    kind: "exchange".to_string(),
                    contract_index: None,
                    website: None,
                },
            ],
            procedures: Vec::new(),
        };
        let registry = registry_with(bundle);
        let results = registry.search_by_label("Exchange", 10);
        assert_eq!(results[0].label, "Exchange");
        assert_eq!(results[1].label, "Exchange Two");
        assert_eq!(results[2].label, "Big Exchange");
    }

    #[test]
    fn by_type_filters_to_kind() {
        let bundle = LabelBundle {
            addresses: vec![crate::bundle::BundleEntry {
                address: "D".repeat(60),
                label: "Some SC".to_string(),
                kind: "smartcontract".to_string(),
                contract_index: Some(7),
                website: None,
            }],
            procedures: Vec::new(),
        };
        let registry = registry_with(bundle);
        let scs = registry.by_type(LabelKind::SmartContract);
        assert_eq!(scs.len(), 1);
        assert_eq!(scs[0].contract_index, Some(7));
    }

    #[test]
    fn procedure_name_resolves_by_contract_and_input_type() {
        let addr = "E".repeat(60);
        let bundle = LabelBundle {
            addresses: Vec::new(),
            procedures: vec![crate::bundle::BundleProcedure {
                contract_address: addr.clone(),
                input_type: 3,
                name: "transferShares".to_string(),
            }],
        };
        let registry = registry_with(bundle);
        let address: Address = addr.parse().unwrap();
        assert_eq!(
            registry.procedure_name(&address, 3),
            Some("transferShares".to_string())
        );
        assert_eq!(registry.procedure_name(&address, 4), None);
    }
}
