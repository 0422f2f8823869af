use fixedbitset::FixedBitSet;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::container::ContainerClass;
use crate::item::Item;

/// Sorted item indices making up one combination.
pub type MemberIds = SmallVec<[u32; 8]>;

/// Identifies one recorded boundary crossing: a container class plus the
/// combination that was the largest fitting accumulation when some next
/// candidate pushed the total over the class capacity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub class: usize,
    pub members: MemberIds,
}

/// All boundary crossings discovered by a search, keyed by
/// (class, sorted combination) and carrying the combination's total size.
#[derive(Debug, Default, PartialEq)]
pub struct ResultSet {
    entries: FxHashMap<ResultKey, u64>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, class: usize, members: &[u32]) -> Option<u64> {
        let key = ResultKey {
            class,
            members: MemberIds::from_slice(members),
        };
        self.entries.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResultKey, u64)> {
        self.entries.iter().map(|(k, &v)| (k, v))
    }

    /// Record or overwrite the crossing for (class, combination).
    pub fn record(&mut self, class: usize, members: &MemberIds, size: u64) {
        let key = ResultKey {
            class,
            members: members.clone(),
        };
        self.entries.insert(key, size);
    }
}

struct SearchState {
    members: MemberIds,
    bits: FixedBitSet,
    size: u64,
}

/// Enumerate item subsets and record, per container class, every
/// combination that fits the class but overflows it when one more
/// candidate is added.
///
/// Classes must be sorted ascending by capacity (see `container::validate`).
/// Fast mode stops extending a branch once a combination of two or more
/// items has crossed some class boundary; it may miss tighter fits built
/// from three or more smaller items.
pub fn find_best_fits(items: &[Item], classes: &[ContainerClass], fast_mode: bool) -> ResultSet {
    let mut results = ResultSet::default();
    if items.is_empty() || classes.is_empty() {
        return results;
    }

    let max_capacity = classes.iter().map(|c| c.capacity).max().unwrap_or(0);

    // Try large items first; ties break by name so runs are deterministic.
    let mut order: Vec<u32> = (0..items.len() as u32).collect();
    order.sort_by(|&a, &b| {
        let (ia, ib) = (&items[a as usize], &items[b as usize]);
        ib.size.cmp(&ia.size).then_with(|| ia.name.cmp(&ib.name))
    });

    // Every candidate not in the base gets tried at each expansion, so a
    // base would otherwise be reached once per permutation. The seen set
    // keeps each base expanded exactly once without changing which
    // boundary crossings get recorded.
    let mut seen: FxHashSet<MemberIds> = FxHashSet::default();
    let mut work: Vec<SearchState> = Vec::new();

    let empty = SearchState {
        members: MemberIds::new(),
        bits: FixedBitSet::with_capacity(items.len()),
        size: 0,
    };
    seen.insert(empty.members.clone());
    work.push(empty);

    while let Some(state) = work.pop() {
        for &candidate in &order {
            if state.bits.contains(candidate as usize) {
                continue;
            }
            let new_size = state.size + items[candidate as usize].size;

            // The recorded combination is the base, not base + candidate:
            // the base was the largest accumulation that still fit.
            let mut crossed = false;
            for (class_idx, class) in classes.iter().enumerate() {
                if state.size <= class.capacity && new_size > class.capacity {
                    results.record(class_idx, &state.members, state.size);
                    crossed = true;
                }
            }

            // No container can ever hold this accumulation, so growing it
            // further is useless.
            if new_size > max_capacity {
                continue;
            }

            if fast_mode && crossed && state.members.len() >= 2 {
                continue;
            }

            let mut child_members = state.members.clone();
            let pos = child_members.partition_point(|&m| m < candidate);
            child_members.insert(pos, candidate);

            if seen.insert(child_members.clone()) {
                let mut bits = state.bits.clone();
                bits.insert(candidate as usize);
                work.push(SearchState {
                    members: child_members,
                    bits,
                    size: new_size,
                });
            }
        }
    }

    results
}
