//! Gene-expression and metabolite-intensity leaves.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use cohort_filter::{QuantitativeSelector, SampleId, Tvs};
use tracing::debug;

use super::{call_provider, leaf_error, sample_id_list, QUANTITATIVE_PROVIDER};
use crate::error::CompileResult;
use crate::plan::CompiledSubquery;
use crate::traits::QuantitativeValueProvider;

/// Samples whose value falls in one of the selector's bins.
///
/// Values are looked up by the term's feature key. With negate, the samples
/// with a value that falls in no bin.
///
/// Parameters: the matching sample ids, ascending.
pub(crate) async fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &QuantitativeSelector,
    provider: &dyn QuantitativeValueProvider,
    timeout: Option<Duration>,
) -> CompileResult<CompiledSubquery> {
    if selector.ranges.is_empty() {
        return Err(leaf_error(tvs, "at least one bin is required"));
    }

    let feature = tvs.term.feature_key();
    let values = call_provider(QUANTITATIVE_PROVIDER, &tvs.term.id, timeout, provider.values(feature)).await?;

    let ids = select_samples(&values, selector, tvs.negate);
    debug!(
        term = %tvs.term.id,
        feature,
        samples = values.len(),
        matched = ids.len(),
        "compiled quantitative leaf"
    );
    Ok(sample_id_list(name, &ids))
}

fn select_samples(
    values: &BTreeMap<SampleId, f64>,
    selector: &QuantitativeSelector,
    negate: bool,
) -> BTreeSet<SampleId> {
    values
        .iter()
        .filter(|&(_, &value)| selector.bin_of(value).is_some() != negate)
        .map(|(&sample, _)| sample)
        .collect()
}
