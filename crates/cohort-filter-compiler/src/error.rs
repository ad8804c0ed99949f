//! Error types for filter compilation.

use std::time::Duration;

use cohort_filter::FilterError;
use thiserror::Error;

/// Errors that abort compilation of a filter.
///
/// Any error aborts the whole filter; no partial plan is produced.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The filter tree has an illegal shape.
    #[error("filter shape error: {0}")]
    Shape(#[from] FilterError),

    /// A bare term id could not be resolved by the registry.
    #[error("invalid term id: {0}")]
    InvalidTermId(String),

    /// A term carries a type tag outside the supported set.
    #[error("unknown term type \"{type_tag}\" for term {term_id}")]
    UnknownTermType {
        /// Term id.
        term_id: String,
        /// The unrecognized tag.
        type_tag: String,
    },

    /// A leaf is missing or misuses a field its term type requires.
    #[error("invalid {term_type} tvs for term {term_id}: {message}")]
    LeafStructure {
        /// Term id.
        term_id: String,
        /// Term type tag.
        term_type: String,
        /// What is wrong.
        message: String,
    },

    /// A data provider call failed or timed out.
    #[error("{provider} failed for term {term_id}: {source}")]
    Provider {
        /// Provider kind.
        provider: &'static str,
        /// Term being compiled.
        term_id: String,
        /// The provider's error.
        #[source]
        source: ProviderError,
    },

    /// A leaf needs a provider the compiler was built without.
    #[error("no {provider} configured for term {term_id}")]
    ProviderNotConfigured {
        /// Provider kind.
        provider: &'static str,
        /// Term being compiled.
        term_id: String,
    },
}

/// Failure reported by an external data provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// Description of the failure.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error used when a provider call exceeds its time limit.
    pub fn timed_out(limit: Duration) -> Self {
        Self::new(format!("timed out after {:?}", limit))
    }
}

/// Result type for compiler operations.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
