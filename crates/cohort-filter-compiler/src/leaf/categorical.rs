//! Categorical leaves.

use cohort_filter::{CategoricalSelector, Tvs};

use super::{key_membership, key_values};
use crate::plan::{Column, CompiledSubquery, Predicate, Table, Value};

/// Samples whose annotated category is (or with negate is not) in the selected set.
///
/// Parameters: `[term_id, key...]`.
pub(crate) fn compile(name: &str, tvs: &Tvs, selector: &CategoricalSelector) -> CompiledSubquery {
    let predicate = Predicate::All(vec![
        Predicate::term_id(),
        key_membership(Column::Value, tvs.negate, &selector.values),
    ]);

    let mut values = vec![Value::text(tvs.term.id.as_str())];
    values.extend(key_values(&selector.values));

    CompiledSubquery::select(name, Table::AnnoCategorical, predicate, values)
}
