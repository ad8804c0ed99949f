//! In-memory sample-annotation store for compiled cohort filters.
//!
//! [`MemoryStore`] holds the sample universe, the sample ancestry relation and
//! the annotation tables a [`CompiledPlan`](cohort_filter_compiler::CompiledPlan)
//! reads. It is a [`TermRegistry`](cohort_filter_compiler::TermRegistry) for
//! the compiler and a [`PlanExecutor`](cohort_filter_compiler::PlanExecutor)
//! for the resulting plan, so a filter can be checked end to end without a
//! database.
//!
//! Sample sets are [`RoaringBitmap`](roaring::RoaringBitmap)s; predicates use
//! SQL's NULL semantics, so a sample without a row in a leaf's table never
//! matches that leaf, negated or not.
//!
//! # Example
//!
//! ```rust
//! use cohort_filter::{Term, TermType};
//! use cohort_filter_compiler::FilterCompiler;
//! use cohort_filter_memstore::MemoryStore;
//! use futures::executor::block_on;
//! use serde_json::json;
//!
//! let mut store = MemoryStore::new();
//! store.add_term(Term::new("sex", TermType::Categorical));
//! for (sample, sex) in [(1, "M"), (2, "F"), (3, "F")] {
//!     store.add_sample(sample);
//!     store.annotate_categorical(sample, "sex", sex);
//! }
//!
//! let filter = json!({
//!     "type": "tvslst",
//!     "in": true,
//!     "join": "",
//!     "lst": [{ "type": "tvs", "tvs": { "term": { "id": "sex" }, "values": [{ "key": "F" }] } }]
//! });
//!
//! let plan = block_on(FilterCompiler::new(&store).compile(&filter)).unwrap();
//! let samples = store.execute_bitmap(&plan).unwrap();
//! assert_eq!(samples.iter().collect::<Vec<_>>(), vec![2, 3]);
//! ```

#![warn(missing_docs)]

mod error;
mod eval;
mod executor;
mod store;
mod traverser;

pub use error::{ExecError, ExecResult};
pub use store::{Cell, GradeFlags, MemoryStore, Row};
pub use traverser::AncestryTraverser;
