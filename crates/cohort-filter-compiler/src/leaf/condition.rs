//! Condition leaves over the precomputed grade views.

use cohort_filter::{ConditionAxis, ConditionSelector, GradeRestriction, Tvs};

use super::{key_membership, key_values, leaf_error};
use crate::error::CompileResult;
use crate::plan::{Column, CompiledSubquery, Predicate, Table, Value};

/// Samples with a qualifying row in the view chosen by the selector's axis.
///
/// Exactly one axis and one restriction mode must be set.
///
/// Parameters: `[term_id, value...]`.
pub(crate) fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &ConditionSelector,
) -> CompileResult<CompiledSubquery> {
    let axis = selector.axis().map_err(|e| leaf_error(tvs, e.message))?;
    let restriction = selector
        .restriction()
        .map_err(|e| leaf_error(tvs, e.message))?;
    if selector.values.is_empty() {
        return Err(leaf_error(tvs, "at least one grade or child term is required"));
    }

    let table = match axis {
        ConditionAxis::ByGrade => Table::ConditionByGrade,
        ConditionAxis::ByChildren => Table::ConditionByChild,
    };
    let flag = match restriction {
        GradeRestriction::MaxGrade => Column::MaxGrade,
        GradeRestriction::MostRecent => Column::MostRecent,
        GradeRestriction::ComputableGrade => Column::ComputableGrade,
    };

    let predicate = Predicate::All(vec![
        Predicate::term_id(),
        key_membership(Column::Value, tvs.negate, &selector.values),
        Predicate::IsSet(flag),
    ]);

    let mut values = vec![Value::text(tvs.term.id.as_str())];
    values.extend(key_values(&selector.values));

    Ok(CompiledSubquery::select(name, table, predicate, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use cohort_filter::{Selector, Term, TermType, ValueKey};

    fn selector() -> ConditionSelector {
        ConditionSelector {
            bar_by_grade: true,
            bar_by_children: false,
            value_by_max_grade: true,
            value_by_most_recent: false,
            value_by_computable_grade: false,
            values: vec![ValueKey::new("3"), ValueKey::new("4")],
        }
    }

    fn leaf(selector: &ConditionSelector) -> Tvs {
        Tvs::new(
            Term::new("Cardiomyopathy", TermType::Condition),
            Selector::Condition(selector.clone()),
        )
    }

    #[test]
    fn test_condition_by_grade_max_grade() {
        let selector = selector();
        let subquery = compile("f_0", &leaf(&selector), &selector).unwrap();

        assert_eq!(
            subquery.body.to_string(),
            "SELECT sample FROM precomputed_chc_grade WHERE (term_id = ? AND value IN (?, ?) AND max_grade = 1)"
        );
        assert_eq!(
            subquery.values,
            vec![Value::text("Cardiomyopathy"), Value::text("3"), Value::text("4")]
        );
    }

    #[test]
    fn test_condition_by_children_most_recent() {
        let mut selector = selector();
        selector.bar_by_grade = false;
        selector.bar_by_children = true;
        selector.value_by_max_grade = false;
        selector.value_by_most_recent = true;

        let subquery = compile("f_0", &leaf(&selector), &selector).unwrap();
        assert_eq!(
            subquery.body.to_string(),
            "SELECT sample FROM precomputed_chc_child WHERE (term_id = ? AND value IN (?, ?) AND most_recent = 1)"
        );
    }

    #[test]
    fn test_condition_requires_exactly_one_axis() {
        let mut selector = selector();
        selector.bar_by_grade = false;
        let err = compile("f_0", &leaf(&selector), &selector).unwrap_err();
        assert!(matches!(err, CompileError::LeafStructure { .. }));

        selector.bar_by_grade = true;
        selector.bar_by_children = true;
        assert!(compile("f_0", &leaf(&selector), &selector).is_err());
    }

    #[test]
    fn test_condition_requires_exactly_one_restriction() {
        let mut selector = selector();
        selector.value_by_computable_grade = true;
        assert!(compile("f_0", &leaf(&selector), &selector).is_err());

        selector.value_by_max_grade = false;
        selector.value_by_computable_grade = false;
        assert!(compile("f_0", &leaf(&selector), &selector).is_err());
    }
}
