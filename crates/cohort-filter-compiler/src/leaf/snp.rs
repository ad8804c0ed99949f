//! Genotype leaves.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use cohort_filter::{SampleId, SnpSelector, Tvs};
use tracing::debug;

use super::{call_provider, sample_id_list, GENOTYPE_PROVIDER};
use crate::error::CompileResult;
use crate::plan::CompiledSubquery;
use crate::traits::{GenotypeCall, GenotypeProvider};

/// Samples with a call in the selected genotype set.
///
/// With negate, the genotyped samples without such a call.
///
/// Parameters: the matching sample ids, ascending.
pub(crate) async fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &SnpSelector,
    provider: &dyn GenotypeProvider,
    timeout: Option<Duration>,
) -> CompileResult<CompiledSubquery> {
    let calls = call_provider(
        GENOTYPE_PROVIDER,
        &tvs.term.id,
        timeout,
        provider.genotypes(&tvs.term),
    )
    .await?;

    let ids = select_samples(&calls, selector, tvs.negate);
    debug!(term = %tvs.term.id, calls = calls.len(), matched = ids.len(), "compiled snp leaf");
    Ok(sample_id_list(name, &ids))
}

fn select_samples(calls: &[GenotypeCall], selector: &SnpSelector, negate: bool) -> BTreeSet<SampleId> {
    let wanted: HashSet<&str> = selector.values.iter().map(|v| v.key.as_str()).collect();
    let matched: BTreeSet<SampleId> = calls
        .iter()
        .filter(|call| wanted.contains(call.genotype.as_str()))
        .map(|call| call.sample)
        .collect();

    if !negate {
        return matched;
    }
    calls
        .iter()
        .map(|call| call.sample)
        .filter(|sample| !matched.contains(sample))
        .collect()
}
