//! # cohort-filter-compiler
//!
//! Compiles nested cohort filters into query plans.
//!
//! The compiler takes the client's filter JSON, checks its shape, hydrates
//! bare term references through a [`TermRegistry`], and emits a
//! [`CompiledPlan`]: named subqueries in dependency order whose positional
//! parameters are listed in placeholder order.
//!
//! ## Architecture
//!
//! ```text
//! filter JSON
//!     │
//!     ▼
//! validator ──── TermRegistry
//!     │
//!     ▼
//! SampleTypeContext
//!     │
//!     ▼
//! group compiler ──── per-leaf compilers ──── MutationClassifier
//!     │                                      QuantitativeValueProvider
//!     ▼                                      GenotypeProvider
//! CompiledPlan ──── PlanExecutor
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use cohort_filter::{Term, TermType};
//! use cohort_filter_compiler::{FilterCompiler, TermRegistry};
//! use serde_json::json;
//!
//! struct Terms;
//!
//! impl TermRegistry for Terms {
//!     fn resolve(&self, term_id: &str) -> Option<Term> {
//!         (term_id == "sex").then(|| Term::new("sex", TermType::Categorical))
//!     }
//! }
//!
//! let compiler = FilterCompiler::new(&Terms);
//! let plan = futures::executor::block_on(compiler.compile(&json!({
//!     "type": "tvslst",
//!     "lst": [{ "type": "tvs", "tvs": { "term": { "id": "sex" }, "values": [{ "key": "F" }] } }]
//! })))
//! .unwrap();
//!
//! assert_eq!(plan.root, "f");
//! assert_eq!(plan.to_sql().matches('?').count(), plan.values().len());
//! ```
//!
//! ## Provider calls
//!
//! Leaves of type `snp`, `geneVariant`, `geneExpression` and
//! `metaboliteIntensity` await an external provider. Calls are made one at a
//! time in tree pre-order unless [`CompilerConfig::parallel_providers`] is set,
//! in which case siblings compile concurrently; the resulting plan is the same
//! either way.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod compiler;
mod config;
mod error;
mod leaf;
mod plan;
mod sample_type;
mod traits;
mod validator;

pub use compiler::FilterCompiler;
pub use config::{CompilerConfig, CompilerConfigBuilder, DEFAULT_COHORT_TERM_ID, DEFAULT_ROOT_NAME};
pub use error::{CompileError, CompileResult, ProviderError};
pub use plan::{
    child_name, raw_name, superset_name, Column, CompareOp, CompiledPlan, CompiledSubquery,
    Predicate, SetOp, SubqueryBody, Table, Value,
};
pub use sample_type::{leaf_sample_type, SampleTypeContext};
pub use traits::{
    ClassifiedVariant, GenotypeCall, GenotypeProvider, MutationClassifier, PlanExecutor,
    QuantitativeValueProvider, TermRegistry,
};
pub use validator::{hydrate, validate};
