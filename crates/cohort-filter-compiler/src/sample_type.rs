//! Sample types referenced by a filter.
//!
//! Some schemas annotate terms at two levels, e.g. "patient" and "tumor"
//! samples where each tumor descends from one patient. When a filter mixes
//! both levels, a patient-level leaf must also select the patient's tumor
//! samples, or an AND against a tumor-level leaf could never match.

use std::collections::BTreeSet;

use cohort_filter::{FilterNode, Selector, Tvs};

use crate::traits::TermRegistry;

/// The distinct sample types of a filter's leaves plus the schema's parent type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleTypeContext {
    /// Sample types referenced by leaves.
    pub types: BTreeSet<String>,
    /// The schema's declared parent sample type.
    pub parent: Option<String>,
}

impl SampleTypeContext {
    /// Walks `tree` in pre-order and collects the sample type of each leaf.
    ///
    /// Leaves on `cohort_term_id` only select the cohort and are skipped.
    pub fn collect(tree: &FilterNode<Tvs>, registry: &dyn TermRegistry, cohort_term_id: &str) -> Self {
        let mut types = BTreeSet::new();
        tree.for_each_leaf(&mut |tvs| {
            if tvs.term.id == cohort_term_id {
                return;
            }
            if let Some(sample_type) = leaf_sample_type(tvs, registry) {
                types.insert(sample_type);
            }
        });
        Self {
            types,
            parent: registry.parent_sample_type(),
        }
    }

    /// Whether the filter references more than one sample type.
    pub fn is_mixed(&self) -> bool {
        self.types.len() > 1
    }

    /// Whether a leaf of `leaf_type` must be expanded to descendant samples.
    pub fn expand_to_children(&self, leaf_type: Option<&str>) -> bool {
        self.is_mixed() && leaf_type.is_some() && leaf_type == self.parent.as_deref()
    }
}

/// Sample type a leaf selects at.
///
/// A sample-list leaf declares its own type; other leaves take the type their
/// term is annotated at.
pub fn leaf_sample_type(tvs: &Tvs, registry: &dyn TermRegistry) -> Option<String> {
    if let Selector::SampleList(list) = &tvs.selector {
        if let Some(sample_type) = &list.sample_type {
            return Some(sample_type.clone());
        }
    }
    registry.sample_type_of(&tvs.term.id)
}
