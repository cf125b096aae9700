use std::collections::HashMap;

use qec_primitives::{Address, Epoch};
use qec_store::{FlowHopInsert, Store};

use crate::error::FlowError;
use crate::state::AddressType;

/// One node in the money-flow graph: minimum depth from a computor plus
/// cumulative in/out flow observed across every hop touching it (spec
/// §4.6 "Visualisation build").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNode {
    pub address: Address,
    pub address_type: AddressType,
    pub min_depth: u32,
    pub total_in: u64,
    pub total_out: u64,
    /// True for exchanges and smart contracts other than the multicast
    /// contract, which never appears as a node (spec: "the multicast
    /// contract ... never appears as a node, as pass-through skipped it").
    pub is_sink: bool,
}

/// One aggregated `(src, dest)` edge: total amount moved between the pair
/// across all hops and origins (spec §4.6: "Edges are (src,dest)
/// aggregates").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub source: Address,
    pub dest: Address,
    pub total_amount: u64,
    pub hop_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// Builds the money-flow visualisation graph for an emission epoch from
/// every flow-hop row recorded so far, across all windows (spec §4.6
/// "Visualisation build"). Computors are fixed at depth 0; every other
/// node's depth is the smallest `hop_level` at which it appears as a hop
/// source.
pub fn build_graph(hops: &[FlowHopInsert], computors: &[Address]) -> FlowGraph {
    let computor_set: std::collections::HashSet<Address> = computors.iter().copied().collect();

    let mut depths: HashMap<Address, u32> = computor_set.iter().map(|a| (*a, 0)).collect();
    let mut node_types: HashMap<Address, AddressType> = computor_set.iter().map(|a| (*a, AddressType::Computor)).collect();
    let mut flow_in: HashMap<Address, u64> = HashMap::new();
    let mut flow_out: HashMap<Address, u64> = HashMap::new();
    let mut edges: HashMap<(Address, Address), (u64, u32)> = HashMap::new();

    for hop in hops {
        // `hop.hop_level` is the source's own level at the time of the hop
        // (spec §4.6: "hop_level = level(src,origin)"); the destination
        // sits one level further out. Computors stay fixed at depth 0.
        if !computor_set.contains(&hop.source) {
            depths
                .entry(hop.source)
                .and_modify(|d| *d = (*d).min(hop.hop_level))
                .or_insert(hop.hop_level);
        }
        let dest_type = AddressType::from_wire(hop.dest_type);
        node_types.entry(hop.dest).or_insert(dest_type);
        if !computor_set.contains(&hop.dest) {
            let dest_depth = hop.hop_level + 1;
            depths
                .entry(hop.dest)
                .and_modify(|d| *d = (*d).min(dest_depth))
                .or_insert(dest_depth);
        }

        *flow_out.entry(hop.source).or_insert(0) += hop.amount;
        *flow_in.entry(hop.dest).or_insert(0) += hop.amount;

        let edge = edges.entry((hop.source, hop.dest)).or_insert((0, 0));
        edge.0 += hop.amount;
        edge.1 += 1;
    }

    let mut addresses: Vec<Address> = depths.keys().copied().collect();
    addresses.sort();

    let nodes = addresses
        .into_iter()
        .map(|address| {
            let address_type = node_types.get(&address).copied().unwrap_or(AddressType::Intermediary);
            FlowNode {
                address,
                address_type,
                min_depth: depths.get(&address).copied().unwrap_or(0),
                total_in: flow_in.get(&address).copied().unwrap_or(0),
                total_out: flow_out.get(&address).copied().unwrap_or(0),
                is_sink: address_type.is_terminal(),
            }
        })
        .collect();

    let mut edge_keys: Vec<(Address, Address)> = edges.keys().copied().collect();
    edge_keys.sort();
    let edges = edge_keys
        .into_iter()
        .map(|(source, dest)| {
            let (total_amount, hop_count) = edges[&(source, dest)];
            FlowEdge { source, dest, total_amount, hop_count }
        })
        .collect();

    FlowGraph { nodes, edges }
}

/// Loads every flow-hop row for `emission_epoch` and builds its
/// visualisation graph (spec §4.6 "Visualisation build").
pub async fn build_visualization(
    store: &Store,
    emission_epoch: Epoch,
) -> Result<FlowGraph, FlowError> {
    let computors = store.get_computors(emission_epoch).await?;
    let hops = store.all_flow_hops(emission_epoch).await?;
    Ok(build_graph(&hops, &computors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qec_primitives::TickNumber;

    fn addr(seed: char) -> Address {
        seed.to_string().repeat(60).parse().unwrap()
    }

    fn hop(source: Address, dest: Address, amount: u64, hop_level: u32, dest_type: u8) -> FlowHopInsert {
        FlowHopInsert {
            emission_epoch: Epoch(1),
            current_epoch: Epoch(2),
            tick_number: TickNumber(100),
            log_id: 1,
            tx_hash: "deadbeef".to_string(),
            source,
            dest,
            amount,
            origin_address: source,
            hop_level,
            dest_type,
            dest_label: String::new(),
        }
    }

    #[test]
    fn computor_is_fixed_at_depth_zero() {
        let c1 = addr('C');
        let x = addr('X');
        let hops = vec![hop(c1, x, 600, 1, 2)];
        let graph = build_graph(&hops, &[c1]);
        let c1_node = graph.nodes.iter().find(|n| n.address == c1).unwrap();
        assert_eq!(c1_node.min_depth, 0);
    }

    #[test]
    fn terminal_node_is_marked_sink() {
        let c1 = addr('C');
        let x = addr('X');
        let hops = vec![hop(c1, x, 600, 1, 2)];
        let graph = build_graph(&hops, &[c1]);
        let x_node = graph.nodes.iter().find(|n| n.address == x).unwrap();
        assert!(x_node.is_sink);
        assert_eq!(x_node.total_in, 600);
    }

    #[test]
    fn edges_aggregate_across_repeated_src_dest_pairs() {
        let c1 = addr('C');
        let i = addr('I');
        let hops = vec![
            hop(c1, i, 300, 1, 1),
            hop(c1, i, 200, 1, 1),
        ];
        let graph = build_graph(&hops, &[c1]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].total_amount, 500);
        assert_eq!(graph.edges[0].hop_count, 2);
    }
}
