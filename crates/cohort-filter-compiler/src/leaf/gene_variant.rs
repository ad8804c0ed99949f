//! Gene-variant leaves.
//!
//! Every gene-variant leaf goes through the one [`MutationClassifier`] call
//! below, whatever the data types its rules cover.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use cohort_filter::{GeneVariantSelector, SampleId, Tvs};
use tracing::debug;

use super::{call_provider, leaf_error, sample_id_list, MUTATION_CLASSIFIER};
use crate::error::CompileResult;
use crate::plan::CompiledSubquery;
use crate::sample_type::SampleTypeContext;
use crate::traits::{ClassifiedVariant, MutationClassifier};

/// Samples with at least one classification governed by a rule and none in
/// that rule's exclude list.
///
/// With negate, the classified samples that do not match.
///
/// Parameters: the matching sample ids, ascending.
pub(crate) async fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &GeneVariantSelector,
    classifier: &dyn MutationClassifier,
    context: &SampleTypeContext,
    timeout: Option<Duration>,
) -> CompileResult<CompiledSubquery> {
    if selector.values.is_empty() {
        return Err(leaf_error(tvs, "at least one variant class rule is required"));
    }

    let classified = call_provider(
        MUTATION_CLASSIFIER,
        &tvs.term.id,
        timeout,
        classifier.classify(&tvs.term, context),
    )
    .await?;

    let ids = select_samples(&classified, selector, tvs.negate);
    debug!(
        term = %tvs.term.id,
        classified = classified.len(),
        matched = ids.len(),
        "compiled gene variant leaf"
    );
    Ok(sample_id_list(name, &ids))
}

fn select_samples(
    classified: &BTreeMap<SampleId, Vec<ClassifiedVariant>>,
    selector: &GeneVariantSelector,
    negate: bool,
) -> BTreeSet<SampleId> {
    classified
        .iter()
        .filter(|(_, variants)| sample_matches(variants, selector) != negate)
        .map(|(&sample, _)| sample)
        .collect()
}

fn sample_matches(variants: &[ClassifiedVariant], selector: &GeneVariantSelector) -> bool {
    let mut governed = false;
    for variant in variants {
        for rule in selector
            .values
            .iter()
            .filter(|rule| rule.applies_to(variant.data_type, variant.origin))
        {
            if rule.excludes(&variant.class) {
                return false;
            }
            governed = true;
        }
    }
    governed
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_filter::{DataType, Origin, VariantClassRule};

    fn exclude_wt(dt: DataType, origin: Option<Origin>) -> GeneVariantSelector {
        GeneVariantSelector {
            values: vec![VariantClassRule {
                dt,
                origin,
                mclass_lst: vec!["M".to_string()],
                mclass_exclude_lst: vec!["WT".to_string()],
            }],
        }
    }

    fn classified() -> BTreeMap<SampleId, Vec<ClassifiedVariant>> {
        let mut map = BTreeMap::new();
        map.insert(1, vec![ClassifiedVariant::new(DataType::SNV_INDEL, "M")]);
        map.insert(2, vec![ClassifiedVariant::new(DataType::SNV_INDEL, "WT")]);
        map.insert(3, vec![ClassifiedVariant::new(DataType::CNV, "CNV_amp")]);
        map.insert(
            4,
            vec![
                ClassifiedVariant::new(DataType::SNV_INDEL, "M"),
                ClassifiedVariant::new(DataType::SNV_INDEL, "WT"),
            ],
        );
        map
    }

    #[test]
    fn test_excluded_class_disqualifies_sample() {
        let ids = select_samples(&classified(), &exclude_wt(DataType::SNV_INDEL, None), false);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_negate_inverts_among_classified_samples() {
        let ids = select_samples(&classified(), &exclude_wt(DataType::SNV_INDEL, None), true);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_origin_specific_rule() {
        let mut map = BTreeMap::new();
        map.insert(
            1,
            vec![ClassifiedVariant::new(DataType::SNV_INDEL, "WT").with_origin(Origin::Germline)],
        );
        map.insert(
            2,
            vec![ClassifiedVariant::new(DataType::SNV_INDEL, "M").with_origin(Origin::Somatic)],
        );

        let ids = select_samples(
            &map,
            &exclude_wt(DataType::SNV_INDEL, Some(Origin::Somatic)),
            false,
        );
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![2]);
    }
}
