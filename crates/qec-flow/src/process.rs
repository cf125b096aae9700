use std::collections::HashMap;

use qec_primitives::{Address, Epoch, Log, TickNumber};
use qec_store::FlowHopInsert;

use crate::state::{AddressType, ClassificationSets, PendingEntry};
use crate::MAX_HOPS;

/// `(origin, effective pending, current hop level)` for every origin with
/// `p_eff(src, origin) > 0`, read fresh off the live ledger each call (spec
/// §4.6: "reads from the in-memory pending write-set first, falling back
/// to the loaded state" — satisfied automatically since the ledger *is*
/// the loaded state, mutated in place).
fn sources_for(ledger: &HashMap<(Address, Address), PendingEntry>, src: Address) -> Vec<(Address, u64, u32)> {
    ledger
        .iter()
        .filter(|((addr, _), entry)| *addr == src && entry.pending() > 0)
        .map(|((_, origin), entry)| (*origin, entry.pending(), entry.hop_level))
        .collect()
}

fn floor_share(amount: u64, p: u64, p_total: u128) -> u64 {
    ((amount as u128 * p as u128) / p_total) as u64
}

/// Applies one `(origin, share)` attribution of a transfer landing on
/// `dest` (spec §4.6 Case A destination handling, reused verbatim for each
/// of Case B's multicast outputs). When `debit_source` is set, the source
/// side of the same attribution (`sent += share`) is applied too — Case A
/// always debits inline; Case B defers the debit to its own mandatory
/// step driven by the inbound amount, not the multicast output amounts.
#[allow(clippy::too_many_arguments)]
fn apply_destination(
    ledger: &mut HashMap<(Address, Address), PendingEntry>,
    classify: &ClassificationSets,
    emission_epoch: Epoch,
    current_epoch: Epoch,
    src: Address,
    dest: Address,
    amount: u64,
    tick: TickNumber,
    log_id: u64,
    tx_hash: &str,
    sources: &[(Address, u64, u32)],
    p_total: u128,
    debit_source: bool,
    hops: &mut Vec<FlowHopInsert>,
) {
    let dest_type = classify.classify(&dest);
    for &(origin, p, hop_level) in sources {
        let share = floor_share(amount, p, p_total);
        if share == 0 {
            continue;
        }

        hops.push(FlowHopInsert {
            emission_epoch,
            current_epoch,
            tick_number: tick,
            log_id,
            tx_hash: tx_hash.to_string(),
            source: src,
            dest,
            amount: share,
            origin_address: origin,
            hop_level,
            dest_type: dest_type.wire_code(),
            dest_label: dest_type.label().to_string(),
        });

        let new_hop_level = hop_level + 1;
        let track_destination =
            dest_type != AddressType::Computor && (dest_type.is_terminal() || new_hop_level <= MAX_HOPS);
        if track_destination {
            let entry = ledger.entry((dest, origin)).or_insert_with(|| PendingEntry {
                emission_epoch,
                address: dest,
                origin,
                address_type: dest_type,
                received: 0,
                sent: 0,
                hop_level: new_hop_level,
                is_terminal: false,
                is_complete: false,
            });
            entry.received += share;
            if dest_type.is_terminal() {
                entry.is_terminal = true;
                entry.is_complete = true;
            } else {
                entry.hop_level = entry.hop_level.min(new_hop_level);
            }
        }

        if debit_source {
            debit(ledger, src, origin, share);
        }
    }
}

fn debit(ledger: &mut HashMap<(Address, Address), PendingEntry>, src: Address, origin: Address, share: u64) {
    if let Some(entry) = ledger.get_mut(&(src, origin)) {
        entry.sent += share;
        if entry.pending() == 0 {
            entry.is_complete = true;
        }
    }
}

/// `process_transfer` (spec §4.6, deterministic, order-sensitive). `transfer`
/// must already be restricted to `is_transfer_shaped()` logs with both a
/// source and a destination.
pub fn process_transfer(
    ledger: &mut HashMap<(Address, Address), PendingEntry>,
    multicast_map: &HashMap<TickNumber, Vec<(Address, u64)>>,
    classify: &ClassificationSets,
    emission_epoch: Epoch,
    transfer: &Log,
) -> Vec<FlowHopInsert> {
    let mut hops = Vec::new();
    let Some(src) = transfer.source else { return hops };
    let Some(dest) = transfer.dest else { return hops };
    let tick = transfer.tick_number;
    let current_epoch = transfer.epoch;
    let log_id = transfer.log_id.0;
    let tx_hash = transfer.tx_hash.as_deref().unwrap_or("");

    let sources = sources_for(ledger, src);
    let p_total: u128 = sources.iter().map(|(_, p, _)| *p as u128).sum();
    if p_total == 0 {
        return hops;
    }

    if dest == classify.multicast_contract {
        // Case B: multicast pass-through. Q itself never appears on a hop
        // row; its outputs for this tick are matched to the inbound call.
        if let Some(outputs) = multicast_map.get(&tick) {
            for &(dest_prime, amount_prime) in outputs {
                if dest_prime == classify.multicast_contract || dest_prime.is_burn() {
                    continue;
                }
                apply_destination(
                    ledger,
                    classify,
                    emission_epoch,
                    current_epoch,
                    src,
                    dest_prime,
                    amount_prime,
                    tick,
                    log_id,
                    tx_hash,
                    &sources,
                    p_total,
                    false,
                    &mut hops,
                );
            }
        }
        // Mandatory: the transfer into Q is still a real spend, even if Q
        // produced no matching outputs this tick (spec §4.6: "must not be
        // skipped even if M[tick] is empty").
        for &(origin, p, _hop_level) in &sources {
            let share = floor_share(transfer.amount, p, p_total);
            if share > 0 {
                debit(ledger, src, origin, share);
            }
        }
    } else {
        // Case A: ordinary destination.
        apply_destination(
            ledger,
            classify,
            emission_epoch,
            current_epoch,
            src,
            dest,
            transfer.amount,
            tick,
            log_id,
            tx_hash,
            &sources,
            p_total,
            true,
            &mut hops,
        );
    }

    hops
}

#[cfg(test)]
mod tests {
    use super::*;
    use qec_primitives::{Address, LogId, LogType};
    use std::collections::HashSet;

    fn addr(seed: char) -> Address {
        seed.to_string().repeat(60).parse().unwrap()
    }

    fn sets(computors: &[Address], exchanges: &[Address], q: Address) -> ClassificationSets {
        ClassificationSets {
            computors: computors.iter().copied().collect(),
            exchanges: exchanges.iter().copied().collect(),
            smart_contracts: HashSet::new(),
            multicast_contract: q,
        }
    }

    fn transfer(source: Address, dest: Address, amount: u64, tick: u64, log_id: u64) -> Log {
        Log {
            epoch: Epoch(2),
            log_id: LogId(log_id),
            tick_number: TickNumber(tick),
            log_type: LogType::QuTransfer,
            tx_hash: Some("deadbeef".to_string()),
            source: Some(source),
            dest: Some(dest),
            amount,
            asset_name: None,
            raw_data: serde_json::Value::Null,
            timestamp_ms: 0,
        }
    }

    fn entry(emission_epoch: Epoch, address: Address, origin: Address, received: u64, hop_level: u32) -> PendingEntry {
        PendingEntry {
            emission_epoch,
            address,
            origin,
            address_type: AddressType::Computor,
            received,
            sent: 0,
            hop_level,
            is_terminal: false,
            is_complete: false,
        }
    }

    #[test]
    fn trivial_transfer_to_exchange_is_terminal_and_single_hop() {
        let c1 = addr('C');
        let x = addr('X');
        let q = addr('Q');
        let classify = sets(&[c1], &[x], q);
        let emission_epoch = Epoch(99);

        let mut ledger = HashMap::new();
        ledger.insert((c1, c1), entry(emission_epoch, c1, c1, 1000, 1));

        let t = transfer(c1, x, 600, 50_001, 1);
        let hops = process_transfer(&mut ledger, &HashMap::new(), &classify, emission_epoch, &t);

        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].amount, 600);
        assert_eq!(hops[0].dest, x);
        assert_eq!(hops[0].hop_level, 1);

        let source_state = &ledger[&(c1, c1)];
        assert_eq!(source_state.sent, 600);
        assert_eq!(source_state.pending(), 400);
        assert!(!source_state.is_complete);

        // X isn't added as a pending entry: it's terminal.
        assert!(!ledger.contains_key(&(x, c1)));
    }

    #[test]
    fn multi_origin_attribution_splits_proportionally() {
        let c1 = addr('C');
        let c2 = addr('D');
        let i = addr('I');
        let x = addr('X');
        let q = addr('Q');
        let classify = sets(&[c1, c2], &[x], q);
        let emission_epoch = Epoch(5);

        let mut ledger = HashMap::new();
        ledger.insert((c1, c1), entry(emission_epoch, c1, c1, 300, 1));
        ledger.insert((c2, c2), entry(emission_epoch, c2, c2, 700, 1));

        let t1 = transfer(c1, i, 300, 100, 1);
        process_transfer(&mut ledger, &HashMap::new(), &classify, emission_epoch, &t1);
        let t2 = transfer(c2, i, 700, 101, 2);
        process_transfer(&mut ledger, &HashMap::new(), &classify, emission_epoch, &t2);

        assert_eq!(ledger[&(i, c1)].pending(), 300);
        assert_eq!(ledger[&(i, c2)].pending(), 700);

        let t3 = transfer(i, x, 500, 102, 3);
        let hops = process_transfer(&mut ledger, &HashMap::new(), &classify, emission_epoch, &t3);

        let mut by_origin: Vec<_> = hops.iter().map(|h| (h.origin_address, h.amount)).collect();
        by_origin.sort_by_key(|(origin, _)| *origin == c2);
        assert_eq!(by_origin.len(), 2);
        assert!(by_origin.contains(&(c1, 150)));
        assert!(by_origin.contains(&(c2, 350)));

        assert_eq!(ledger[&(i, c1)].pending(), 150);
        assert_eq!(ledger[&(i, c2)].pending(), 350);
    }

    #[test]
    fn multicast_pass_through_skips_q_and_debits_full_inbound_amount() {
        let c1 = addr('C');
        let i = addr('I');
        let x = addr('X');
        let y = addr('Y');
        let q = addr('Q');
        let classify = sets(&[c1], &[x, y], q);
        let emission_epoch = Epoch(7);

        let mut ledger = HashMap::new();
        ledger.insert((i, c1), entry(emission_epoch, i, c1, 400, 2));

        let mut multicast = HashMap::new();
        multicast.insert(TickNumber(200), vec![(x, 240u64), (y, 160u64)]);

        let t = transfer(i, q, 400, 200, 9);
        let hops = process_transfer(&mut ledger, &multicast, &classify, emission_epoch, &t);

        assert_eq!(hops.len(), 2);
        assert!(hops.iter().all(|h| h.source == i && h.dest != q));
        assert!(hops.iter().any(|h| h.dest == x && h.amount == 240));
        assert!(hops.iter().any(|h| h.dest == y && h.amount == 160));

        let source_state = &ledger[&(i, c1)];
        assert_eq!(source_state.sent, 400);
        assert_eq!(source_state.pending(), 0);
        assert!(source_state.is_complete);
    }

    #[test]
    fn multicast_debit_is_mandatory_even_with_no_outputs() {
        let c1 = addr('C');
        let i = addr('I');
        let q = addr('Q');
        let classify = sets(&[c1], &[], q);
        let emission_epoch = Epoch(1);

        let mut ledger = HashMap::new();
        ledger.insert((i, c1), entry(emission_epoch, i, c1, 400, 2));

        let t = transfer(i, q, 400, 200, 1);
        let hops = process_transfer(&mut ledger, &HashMap::new(), &classify, emission_epoch, &t);

        assert!(hops.is_empty());
        assert_eq!(ledger[&(i, c1)].sent, 400);
        assert_eq!(ledger[&(i, c1)].pending(), 0);
    }

    #[test]
    fn flow_does_not_loop_back_into_computors() {
        let c1 = addr('C');
        let c2 = addr('D');
        let q = addr('Q');
        let classify = sets(&[c1, c2], &[], q);
        let emission_epoch = Epoch(3);

        let mut ledger = HashMap::new();
        ledger.insert((c1, c1), entry(emission_epoch, c1, c1, 1000, 1));

        let t = transfer(c1, c2, 500, 10, 1);
        let hops = process_transfer(&mut ledger, &HashMap::new(), &classify, emission_epoch, &t);

        assert_eq!(hops.len(), 1);
        assert!(!ledger.contains_key(&(c2, c1)));
    }

    #[test]
    fn zero_pending_transfer_is_ignored() {
        let c1 = addr('C');
        let x = addr('X');
        let q = addr('Q');
        let classify = sets(&[c1], &[x], q);
        let mut ledger = HashMap::new();
        let t = transfer(c1, x, 100, 1, 1);
        let hops = process_transfer(&mut ledger, &HashMap::new(), &classify, Epoch(1), &t);
        assert!(hops.is_empty());
    }
}
