//! Sample-list leaves.

use cohort_filter::{SampleListSelector, Tvs};

use crate::plan::{Column, CompareOp, CompiledSubquery, Predicate, Table, Value};

/// Samples in (or with negate not in) the literal id list.
///
/// When the schema distinguishes sample types and the selector declares one,
/// the selection is scoped to samples of that type.
///
/// Parameters: `[id..., sample_type?]`.
pub(crate) fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &SampleListSelector,
    distinguishes_sample_types: bool,
) -> CompiledSubquery {
    let mut parts = vec![Predicate::In {
        column: Column::Id,
        negated: tvs.negate,
        arity: selector.ids.len(),
    }];
    let mut values: Vec<Value> = selector
        .ids
        .iter()
        .map(|&id| Value::Integer(i64::from(id)))
        .collect();

    if let (true, Some(sample_type)) = (distinguishes_sample_types, &selector.sample_type) {
        parts.push(Predicate::Compare(Column::SampleType, CompareOp::Eq));
        values.push(Value::text(sample_type.as_str()));
    }

    CompiledSubquery::select(name, Table::SampleIdMap, Predicate::All(parts), values)
}
