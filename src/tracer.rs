//! The tracer (C4): iterative mark over `edges`, and sweep of a generation.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::generation::{GenerationTable, Generations};
use crate::object::Address;

/// Mark every record reachable from `roots` via `edges`.
///
/// Uses an explicit worklist rather than recursion, so a deep object graph
/// cannot exhaust the call stack. An address that resolves to no live
/// record — in either generation — is simply dropped from the traversal;
/// this is the tracer's half of "unknown address" handling (§7), commonly
/// called edge pruning.
pub(crate) fn mark(roots: impl IntoIterator<Item = Address>, gens: &Generations) {
    let mut worklist: VecDeque<Address> = VecDeque::new();
    let mut visited: FxHashSet<Address> = FxHashSet::default();

    for root in roots {
        if visited.insert(root) {
            if let Some(record) = gens.resolve(root) {
                record.set_marked(true);
                worklist.push_back(root);
            }
        }
    }

    while let Some(address) = worklist.pop_front() {
        let Some(record) = gens.resolve(address) else {
            continue;
        };
        let edges: Vec<Address> = record.links.lock().edges.iter().copied().collect();
        for child in edges {
            if visited.insert(child) {
                if let Some(child_record) = gens.resolve(child) {
                    child_record.set_marked(true);
                    worklist.push_back(child);
                }
            }
        }
    }
}

/// Remove every unmarked record from `table`, returning the bytes reclaimed.
///
/// Survivors have their mark bit reset to false so the table is ready for
/// the next cycle. Dead addresses are collected in a first pass and removed
/// in a second, so the sweep is safe regardless of hash map iteration order.
pub(crate) fn sweep(table: &mut GenerationTable) -> usize {
    let mut reclaimed = 0usize;
    let mut dead = Vec::new();

    for (&address, record) in table.records.iter() {
        if record.take_marked() {
            // Survivor: mark bit is already reset by `take_marked`.
        } else {
            reclaimed += record.size();
            dead.push(address);
        }
    }

    for address in dead {
        table.records.remove(&address);
        table.roots.remove(&address);
    }

    reclaimed
}
