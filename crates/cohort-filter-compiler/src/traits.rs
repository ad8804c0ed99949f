//! Collaborator traits for filter compilation.
//!
//! The compiler never performs I/O. Everything it needs from the outside world
//! comes through the traits in this module:
//!
//! - [`TermRegistry`] resolves bare term ids and answers schema questions
//! - [`MutationClassifier`], [`QuantitativeValueProvider`] and
//!   [`GenotypeProvider`] supply per-sample data for molecular leaves
//! - [`PlanExecutor`] evaluates the compiled plan
//!
//! # Example: a registry over a fixed term list
//!
//! ```rust
//! use std::collections::HashMap;
//! use cohort_filter::{Term, TermType};
//! use cohort_filter_compiler::TermRegistry;
//!
//! struct FixedTerms(HashMap<String, Term>);
//!
//! impl TermRegistry for FixedTerms {
//!     fn resolve(&self, term_id: &str) -> Option<Term> {
//!         self.0.get(term_id).cloned()
//!     }
//! }
//!
//! let mut terms = HashMap::new();
//! terms.insert("sex".to_string(), Term::new("sex", TermType::Categorical));
//! let registry = FixedTerms(terms);
//! assert!(registry.resolve("sex").is_some());
//! assert!(!registry.distinguishes_sample_types());
//! ```

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use cohort_filter::{DataType, Origin, SampleId, Term};

use crate::error::ProviderError;
use crate::plan::CompiledPlan;
use crate::sample_type::SampleTypeContext;

// =============================================================================
// Term registry
// =============================================================================

/// Read-only access to term definitions and the sample-type schema.
pub trait TermRegistry: Send + Sync {
    /// Resolves a term id to its typed definition.
    fn resolve(&self, term_id: &str) -> Option<Term>;

    /// Sample type the term is annotated at.
    ///
    /// Default implementation: no sample types.
    fn sample_type_of(&self, _term_id: &str) -> Option<String> {
        None
    }

    /// The schema's parent sample type (e.g. "patient" above "tumor").
    ///
    /// Default implementation: no parent type.
    fn parent_sample_type(&self) -> Option<String> {
        None
    }

    /// Whether annotations are stored at more than one sample type.
    fn distinguishes_sample_types(&self) -> bool {
        self.parent_sample_type().is_some()
    }
}

// =============================================================================
// Data providers
// =============================================================================

/// One classified variant reported for a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedVariant {
    /// Data type of the call.
    pub data_type: DataType,
    /// Germline or somatic, when known.
    pub origin: Option<Origin>,
    /// Mutation class, e.g. "M" (missense) or "WT".
    pub class: String,
}

impl ClassifiedVariant {
    /// Creates a classification without origin.
    pub fn new(data_type: DataType, class: impl Into<String>) -> Self {
        Self {
            data_type,
            origin: None,
            class: class.into(),
        }
    }

    /// Sets the origin.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Classifies the variants of a gene for every sample.
#[async_trait]
pub trait MutationClassifier: Send + Sync {
    /// Returns the classified variants of `term`'s gene, per sample.
    ///
    /// `context` carries the sample types referenced by the whole filter.
    async fn classify(
        &self,
        term: &Term,
        context: &SampleTypeContext,
    ) -> Result<BTreeMap<SampleId, Vec<ClassifiedVariant>>, ProviderError>;
}

/// Supplies one numeric value per sample for a feature (gene, metabolite).
#[async_trait]
pub trait QuantitativeValueProvider: Send + Sync {
    /// Returns the value of `feature_key` per sample.
    async fn values(&self, feature_key: &str) -> Result<BTreeMap<SampleId, f64>, ProviderError>;
}

/// A genotype call for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeCall {
    /// Sample id.
    pub sample: SampleId,
    /// Genotype, e.g. "A/G".
    pub genotype: String,
}

impl GenotypeCall {
    /// Creates a genotype call.
    pub fn new(sample: SampleId, genotype: impl Into<String>) -> Self {
        Self {
            sample,
            genotype: genotype.into(),
        }
    }
}

/// Supplies genotype calls for a variant.
#[async_trait]
pub trait GenotypeProvider: Send + Sync {
    /// Returns the calls for `term`'s variant.
    async fn genotypes(&self, term: &Term) -> Result<Vec<GenotypeCall>, ProviderError>;
}

// =============================================================================
// Plan execution
// =============================================================================

/// Evaluates compiled plans against a sample-annotation store.
pub trait PlanExecutor {
    /// Error type of the store.
    type Error: std::error::Error;

    /// Returns the samples selected by `plan`.
    fn execute(&self, plan: &CompiledPlan) -> Result<HashSet<SampleId>, Self::Error>;
}
