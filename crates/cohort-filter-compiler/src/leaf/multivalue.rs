//! Multivalue leaves.

use cohort_filter::{Join, MultivalueSelector, Tvs};

use super::leaf_error;
use crate::error::CompileResult;
use crate::plan::{CompiledSubquery, Predicate, Table, Value};

/// Samples whose keyed sub-values are present and positive, combined with the
/// selector's join. With negate each key must instead be absent or `<= 0`.
///
/// Parameters: `[term_id, key...]`.
pub(crate) fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &MultivalueSelector,
) -> CompileResult<CompiledSubquery> {
    let join = match (selector.values.len(), selector.join) {
        (0, _) => return Err(leaf_error(tvs, "at least one key is required")),
        (1, join) => join.unwrap_or(Join::And),
        (_, Some(join)) => join,
        (n, None) => {
            return Err(leaf_error(
                tvs,
                format!("join is required to combine {} keys", n),
            ))
        }
    };

    let keys: Vec<Predicate> = selector
        .values
        .iter()
        .map(|_| Predicate::KeyPositive {
            negated: tvs.negate,
        })
        .collect();
    let combined = match join {
        Join::And => Predicate::All(keys),
        Join::Or => Predicate::Any(keys),
    };

    let mut values = vec![Value::text(tvs.term.id.as_str())];
    values.extend(selector.values.iter().map(|v| Value::text(v.key.as_str())));

    Ok(CompiledSubquery::select(
        name,
        Table::AnnoMultivalue,
        Predicate::All(vec![Predicate::term_id(), combined]),
        values,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_filter::{Selector, Term, TermType, ValueKey};

    fn leaf(keys: &[&str], join: Option<Join>, negate: bool) -> (Tvs, MultivalueSelector) {
        let selector = MultivalueSelector {
            values: keys.iter().map(|k| ValueKey::new(*k)).collect(),
            join,
        };
        let tvs = Tvs::new(
            Term::new("drugs", TermType::Multivalue),
            Selector::Multivalue(selector.clone()),
        )
        .negated(negate);
        (tvs, selector)
    }

    #[test]
    fn test_multivalue_or_join() {
        let (tvs, selector) = leaf(&["aspirin", "ibuprofen"], Some(Join::Or), false);
        let subquery = compile("f_0", &tvs, &selector).unwrap();

        assert_eq!(
            subquery.body.to_string(),
            "SELECT sample FROM anno_multivalue WHERE (term_id = ? AND \
             (COALESCE(json_extract(value, '$.' || ?), 0) > 0 OR COALESCE(json_extract(value, '$.' || ?), 0) > 0))"
        );
        assert_eq!(
            subquery.values,
            vec![Value::text("drugs"), Value::text("aspirin"), Value::text("ibuprofen")]
        );
    }

    #[test]
    fn test_multivalue_single_key_needs_no_join() {
        let (tvs, selector) = leaf(&["aspirin"], None, true);
        let subquery = compile("f_0", &tvs, &selector).unwrap();
        assert_eq!(
            subquery.body.to_string(),
            "SELECT sample FROM anno_multivalue WHERE (term_id = ? AND COALESCE(json_extract(value, '$.' || ?), 0) <= 0)"
        );
    }

    #[test]
    fn test_multivalue_requires_join_for_many_keys() {
        let (tvs, selector) = leaf(&["a", "b"], None, false);
        assert!(compile("f_0", &tvs, &selector).is_err());

        let (tvs, selector) = leaf(&[], Some(Join::And), false);
        assert!(compile("f_0", &tvs, &selector).is_err());
    }
}
