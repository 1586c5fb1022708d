//! Generation tables (C2): the young/old record maps plus the auxiliary
//! root and remembered-set indices.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::object::{Address, Record};

/// One generation's records plus the subset flagged as roots.
#[derive(Default)]
pub(crate) struct GenerationTable {
    pub records: FxHashMap<Address, Arc<Record>>,
    pub roots: FxHashSet<Address>,
}

impl GenerationTable {
    fn size_bytes(&self) -> usize {
        self.records.values().map(|r| r.size()).sum()
    }
}

/// Both generation tables plus the remembered set, all mutated together
/// under the single gc lock (see [`crate::scheduler::Scheduler`]).
#[derive(Default)]
pub(crate) struct Generations {
    pub young: GenerationTable,
    pub old: GenerationTable,
    /// The subset of `young` whose parent (at allocation time, or after a
    /// later reparent onto an old parent) lives in `old`.
    pub young_from_old: FxHashSet<Address>,
}

impl Generations {
    /// Resolve an address in either generation. Returns `None` for an
    /// address that belongs to no live record — the uniform "unknown
    /// address" case used for edge pruning and no-op free/reparent.
    pub fn resolve(&self, address: Address) -> Option<Arc<Record>> {
        self.young
            .records
            .get(&address)
            .or_else(|| self.old.records.get(&address))
            .cloned()
    }

    pub fn contains_old(&self, address: Address) -> bool {
        self.old.records.contains_key(&address)
    }

    pub fn contains_young(&self, address: Address) -> bool {
        self.young.records.contains_key(&address)
    }

    pub fn young_gen_size(&self) -> usize {
        self.young.size_bytes()
    }

    pub fn old_gen_size(&self) -> usize {
        self.old.size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_searches_both_generations() {
        let mut gens = Generations::default();
        let young_rec = Arc::new(Record::new(8, false).unwrap());
        let old_rec = Arc::new(Record::new(8, false).unwrap());
        gens.young.records.insert(young_rec.address(), young_rec.clone());
        gens.old.records.insert(old_rec.address(), old_rec.clone());

        assert!(gens.resolve(young_rec.address()).is_some());
        assert!(gens.resolve(old_rec.address()).is_some());
        assert!(gens.resolve(0xdead_beef).is_none());
        assert!(gens.contains_young(young_rec.address()));
        assert!(gens.contains_old(old_rec.address()));
    }

    #[test]
    fn size_accounting_sums_live_records() {
        let mut gens = Generations::default();
        let a = Arc::new(Record::new(100, false).unwrap());
        let b = Arc::new(Record::new(50, false).unwrap());
        gens.young.records.insert(a.address(), a);
        gens.young.records.insert(b.address(), b);
        assert_eq!(gens.young_gen_size(), 150);
        assert_eq!(gens.old_gen_size(), 0);
    }
}
