//! Per-leaf compilers.
//!
//! One module per term type. Each turns one [`Tvs`] into a named
//! [`CompiledSubquery`] whose parameter values are listed in placeholder order.
//! Table-backed leaves are pure; provider-backed leaves await their provider
//! and inline the matching sample ids.

pub(crate) mod categorical;
pub(crate) mod condition;
pub(crate) mod gene_variant;
pub(crate) mod multivalue;
pub(crate) mod numeric;
pub(crate) mod quantitative;
pub(crate) mod samplelst;
pub(crate) mod snp;
pub(crate) mod survival;

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use cohort_filter::{SampleId, Tvs, ValueKey};
use tracing::{debug, warn};

use crate::error::{CompileError, CompileResult, ProviderError};
use crate::plan::{Column, CompiledSubquery, Predicate, Table, Value};

pub(crate) const MUTATION_CLASSIFIER: &str = "mutation classifier";
pub(crate) const QUANTITATIVE_PROVIDER: &str = "quantitative value provider";
pub(crate) const GENOTYPE_PROVIDER: &str = "genotype provider";

/// Builds a leaf structure error for `tvs`.
pub(crate) fn leaf_error(tvs: &Tvs, message: impl Into<String>) -> CompileError {
    CompileError::LeafStructure {
        term_id: tvs.term.id.clone(),
        term_type: tvs.term.term_type.to_string(),
        message: message.into(),
    }
}

/// `column [NOT] IN (?, ...)` over the given keys.
pub(crate) fn key_membership(column: Column, negated: bool, keys: &[ValueKey]) -> Predicate {
    Predicate::In {
        column,
        negated,
        arity: keys.len(),
    }
}

/// Text parameters for the given keys, in order.
pub(crate) fn key_values(keys: &[ValueKey]) -> impl Iterator<Item = Value> + '_ {
    keys.iter().map(|k| Value::text(k.key.as_str()))
}

/// Selects an explicit set of samples from `sampleidmap`.
///
/// Ids are emitted in ascending order so the plan does not depend on the
/// order a provider reported them in.
pub(crate) fn sample_id_list(name: &str, ids: &BTreeSet<SampleId>) -> CompiledSubquery {
    CompiledSubquery::select(
        name,
        Table::SampleIdMap,
        Predicate::In {
            column: Column::Id,
            negated: false,
            arity: ids.len(),
        },
        ids.iter().map(|&id| Value::Integer(i64::from(id))).collect(),
    )
}

/// Awaits a provider call, applying the configured time limit.
pub(crate) async fn call_provider<T, F>(
    provider: &'static str,
    term_id: &str,
    timeout: Option<Duration>,
    call: F,
) -> CompileResult<T>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    debug!(provider, term = term_id, "calling data provider");
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timed_out(limit)),
        },
        None => call.await,
    };
    outcome.map_err(|source| {
        warn!(provider, term = term_id, error = %source, "data provider failed");
        CompileError::Provider {
            provider,
            term_id: term_id.to_string(),
            source,
        }
    })
}
