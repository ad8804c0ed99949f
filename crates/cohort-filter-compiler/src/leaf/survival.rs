//! Survival leaves.

use cohort_filter::{SurvivalSelector, Tvs};

use super::leaf_error;
use crate::error::CompileResult;
use crate::plan::{Column, CompareOp, CompiledSubquery, Predicate, Table, Value};

/// Samples whose exit code is (or with negate is not) in the selected codes,
/// optionally with a minimum time to event.
///
/// Parameters: `[term_id, exit_code..., cutoff?]`.
pub(crate) fn compile(
    name: &str,
    tvs: &Tvs,
    selector: &SurvivalSelector,
) -> CompileResult<CompiledSubquery> {
    let mut codes = Vec::with_capacity(selector.values.len());
    for value in &selector.values {
        let code = value
            .key
            .parse::<i64>()
            .map_err(|_| leaf_error(tvs, format!("exit code must be an integer, got \"{}\"", value.key)))?;
        codes.push(Value::Integer(code));
    }

    let mut parts = vec![
        Predicate::term_id(),
        Predicate::In {
            column: Column::ExitCode,
            negated: tvs.negate,
            arity: codes.len(),
        },
    ];
    let mut values = vec![Value::text(tvs.term.id.as_str())];
    values.extend(codes);

    if let Some(cutoff) = selector.cutoff {
        parts.push(Predicate::Compare(Column::TimeToEvent, CompareOp::Ge));
        values.push(Value::Float(cutoff));
    }

    Ok(CompiledSubquery::select(
        name,
        Table::Survival,
        Predicate::All(parts),
        values,
    ))
}
