//! Integer and float leaves.

use cohort_filter::{NumericRange, NumericSelector, Tvs};
use tracing::trace;

use super::leaf_error;
use crate::error::CompileResult;
use crate::plan::{Column, CompareOp, CompiledSubquery, Predicate, Table, Value};

/// Samples whose value falls in any of the selected ranges.
///
/// With negate the union of all ranges is complemented. When at least
/// one true interval is present, the term's uncomputable sentinel values are
/// excluded unless a sentinel range names them explicitly.
///
/// Parameters: `[term_id, range bounds..., excluded sentinels...]`.
pub(crate) fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &NumericSelector,
    table: Table,
) -> CompileResult<CompiledSubquery> {
    if selector.ranges.is_empty() {
        return Err(leaf_error(tvs, "at least one range is required"));
    }

    let mut values = vec![Value::text(tvs.term.id.as_str())];
    let mut clauses = Vec::with_capacity(selector.ranges.len());
    for range in &selector.ranges {
        clauses.push(range_clause(range, &mut values));
    }
    let matched = Predicate::Any(clauses);
    let selected = if tvs.negate {
        Predicate::Not(Box::new(matched))
    } else {
        matched
    };

    let mut parts = vec![Predicate::term_id(), selected];

    if selector.has_interval() {
        let excluded: Vec<f64> = tvs
            .term
            .uncomputable_keys()
            .filter_map(|key| match key.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    trace!(term = %tvs.term.id, key, "skipping non-numeric uncomputable key");
                    None
                }
            })
            .filter(|value| !selector.names_special(*value))
            .collect();

        if !excluded.is_empty() {
            parts.push(Predicate::In {
                column: Column::Value,
                negated: true,
                arity: excluded.len(),
            });
            values.extend(excluded.into_iter().map(Value::Float));
        }
    }

    Ok(CompiledSubquery::select(
        name,
        table,
        Predicate::All(parts),
        values,
    ))
}

fn range_clause(range: &NumericRange, values: &mut Vec<Value>) -> Predicate {
    match range {
        NumericRange::Special(special) => {
            values.push(Value::Float(special.value));
            Predicate::Compare(Column::Value, CompareOp::Eq)
        }
        NumericRange::Interval(interval) => {
            let mut bounds = Vec::with_capacity(2);
            if let Some((start, inclusive)) = interval.lower() {
                let op = if inclusive { CompareOp::Ge } else { CompareOp::Gt };
                bounds.push(Predicate::Compare(Column::Value, op));
                values.push(Value::Float(start));
            }
            if let Some((stop, inclusive)) = interval.upper() {
                let op = if inclusive { CompareOp::Le } else { CompareOp::Lt };
                bounds.push(Predicate::Compare(Column::Value, op));
                values.push(Value::Float(stop));
            }
            Predicate::All(bounds)
        }
    }
}
