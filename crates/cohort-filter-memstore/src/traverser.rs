//! Sample ancestry traversal.
//!
//! [`AncestryTraverser`] walks the sample ancestry relation (patient to
//! tumor, tumor to sub-sample) breadth-first.

use std::collections::VecDeque;

use cohort_filter::SampleId;
use roaring::RoaringBitmap;

use crate::store::MemoryStore;

/// Walks sample ancestry breadth-first.
///
/// # Example
///
/// ```rust
/// use cohort_filter_memstore::{AncestryTraverser, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// store.add_child(1, 10);
/// store.add_child(10, 100);
///
/// let traverser = AncestryTraverser::new(&store);
/// let descendants = traverser.descendants(1);
/// assert_eq!(descendants.iter().collect::<Vec<_>>(), vec![10, 100]);
/// ```
pub struct AncestryTraverser<'a> {
    store: &'a MemoryStore,
}

impl<'a> AncestryTraverser<'a> {
    /// Creates a traverser over the store's ancestry relation.
    pub fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    /// All descendants of a sample, excluding the sample itself.
    pub fn descendants(&self, sample: SampleId) -> RoaringBitmap {
        let mut visited = RoaringBitmap::new();
        let mut queue = VecDeque::new();
        self.visit_children(sample, &mut visited, &mut queue);
        while let Some(current) = queue.pop_front() {
            self.visit_children(current, &mut visited, &mut queue);
        }
        visited
    }

    /// A sample set plus all descendants of its members.
    ///
    /// Members already in the set are not traversed twice.
    pub fn expand(&self, samples: &RoaringBitmap) -> RoaringBitmap {
        let mut visited = samples.clone();
        let mut queue: VecDeque<SampleId> = samples.iter().collect();
        while let Some(current) = queue.pop_front() {
            self.visit_children(current, &mut visited, &mut queue);
        }
        visited
    }

    fn visit_children(
        &self,
        sample: SampleId,
        visited: &mut RoaringBitmap,
        queue: &mut VecDeque<SampleId>,
    ) {
        for &child in self.store.children_of(sample) {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_patients() -> MemoryStore {
        let mut store = MemoryStore::new();
        // patient 1 -> tumors 10, 11; tumor 10 -> sub-sample 100
        store.add_child(1, 10);
        store.add_child(1, 11);
        store.add_child(10, 100);
        // patient 2 -> tumor 20
        store.add_child(2, 20);
        store
    }

    #[test]
    fn test_descendants_excludes_self() {
        let store = two_patients();
        let traverser = AncestryTraverser::new(&store);

        let descendants = traverser.descendants(1);
        assert_eq!(descendants.iter().collect::<Vec<_>>(), vec![10, 11, 100]);
        assert!(traverser.descendants(100).is_empty());
    }

    #[test]
    fn test_expand_includes_members() {
        let store = two_patients();
        let traverser = AncestryTraverser::new(&store);

        let expanded = traverser.expand(&[2u32, 11].into_iter().collect());
        assert_eq!(expanded.iter().collect::<Vec<_>>(), vec![2, 11, 20]);
    }

    #[test]
    fn test_expand_handles_cycles() {
        let mut store = MemoryStore::new();
        store.add_child(1, 2);
        store.add_child(2, 1);
        let traverser = AncestryTraverser::new(&store);

        let expanded = traverser.expand(&[1u32].into_iter().collect());
        assert_eq!(expanded.len(), 2);
    }
}
