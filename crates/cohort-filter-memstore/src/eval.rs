//! Row predicate evaluation.
//!
//! A [`Predicate`] is bound to its subquery's values first, consuming
//! placeholders left to right, then evaluated per row with SQL's
//! three-valued logic: `None` stands for unknown (a NULL operand), and a row
//! is selected only when its predicate is `Some(true)`.

use std::cmp::Ordering;

use cohort_filter_compiler::{Column, CompareOp, Predicate, Value};

use crate::error::{ExecError, ExecResult};
use crate::store::{Cell, Row};

/// A predicate with its placeholders replaced by values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Bound {
    Compare(Column, CompareOp, Value),
    In {
        column: Column,
        negated: bool,
        values: Vec<Value>,
    },
    IsSet(Column),
    KeyPositive { negated: bool, key: Value },
    All(Vec<Bound>),
    Any(Vec<Bound>),
    Not(Box<Bound>),
}

/// Binds `values` to the placeholders of `predicate`.
pub(crate) fn bind(subquery: &str, predicate: &Predicate, values: &[Value]) -> ExecResult<Bound> {
    let expected = predicate.placeholder_count();
    if expected != values.len() {
        return Err(ExecError::ParamCountMismatch {
            subquery: subquery.to_string(),
            expected,
            actual: values.len(),
        });
    }
    let mut cursor = values.iter().cloned();
    Ok(bind_with(predicate, &mut cursor))
}

fn bind_with(predicate: &Predicate, cursor: &mut impl Iterator<Item = Value>) -> Bound {
    // Count is checked in `bind`.
    match predicate {
        Predicate::Compare(column, op) => {
            Bound::Compare(*column, *op, cursor.next().unwrap_or(Value::Integer(0)))
        }
        Predicate::In {
            column,
            negated,
            arity,
        } => Bound::In {
            column: *column,
            negated: *negated,
            values: cursor.by_ref().take(*arity).collect(),
        },
        Predicate::IsSet(column) => Bound::IsSet(*column),
        Predicate::KeyPositive { negated } => Bound::KeyPositive {
            negated: *negated,
            key: cursor.next().unwrap_or_else(|| Value::text("")),
        },
        Predicate::All(parts) => Bound::All(parts.iter().map(|p| bind_with(p, cursor)).collect()),
        Predicate::Any(parts) => Bound::Any(parts.iter().map(|p| bind_with(p, cursor)).collect()),
        Predicate::Not(inner) => Bound::Not(Box::new(bind_with(inner, cursor))),
    }
}

impl Bound {
    /// Evaluates the predicate against one row.
    pub(crate) fn eval(&self, row: &Row) -> ExecResult<Option<bool>> {
        match self {
            Bound::Compare(column, op, value) => match row.get(*column) {
                None => Ok(None),
                Some(cell) => Ok(compare(*column, cell, value)?.map(|ord| holds(*op, ord))),
            },
            Bound::In {
                negated, values, ..
            } if values.is_empty() => Ok(Some(*negated)),
            Bound::In {
                column,
                negated,
                values,
            } => {
                let Some(cell) = row.get(*column) else {
                    return Ok(None);
                };
                let mut unknown = false;
                for value in values {
                    match compare(*column, cell, value)? {
                        Some(Ordering::Equal) => return Ok(Some(!negated)),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                Ok(if unknown { None } else { Some(*negated) })
            }
            Bound::IsSet(column) => match row.get(*column) {
                None => Ok(None),
                Some(cell) => Ok(compare(*column, cell, &Value::Integer(1))?.map(Ordering::is_eq)),
            },
            Bound::KeyPositive { negated, key } => {
                let amount = match (row.get(Column::Value), key) {
                    (Some(Cell::Keyed(bag)), Value::Text(key)) => bag.get(key).copied().unwrap_or(0.0),
                    (None, _) => 0.0,
                    (_, key) => return Err(ExecError::type_mismatch(Column::Value, key)),
                };
                Ok(Some(if *negated { amount <= 0.0 } else { amount > 0.0 }))
            }
            Bound::All(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.eval(row)? {
                        Some(false) => return Ok(Some(false)),
                        Some(true) => {}
                        None => result = None,
                    }
                }
                Ok(result)
            }
            Bound::Any(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.eval(row)? {
                        Some(true) => return Ok(Some(true)),
                        Some(false) => {}
                        None => result = None,
                    }
                }
                Ok(result)
            }
            Bound::Not(inner) => Ok(inner.eval(row)?.map(|b| !b)),
        }
    }

    /// Whether the row is selected.
    pub(crate) fn matches(&self, row: &Row) -> ExecResult<bool> {
        Ok(self.eval(row)? == Some(true))
    }
}

fn holds(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord.is_eq(),
        CompareOp::Ne => ord.is_ne(),
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Le => ord.is_le(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::Ge => ord.is_ge(),
    }
}

/// Orders a cell against a value. Text compares with text; numbers compare
/// numerically, and text holding a number compares with a number.
fn compare(column: Column, cell: &Cell, value: &Value) -> ExecResult<Option<Ordering>> {
    let number = |text: &str| {
        text.trim()
            .parse::<f64>()
            .map_err(|_| ExecError::type_mismatch(column, value))
    };
    match (cell, value) {
        (Cell::Text(a), Value::Text(b)) => Ok(Some(a.as_str().cmp(b.as_str()))),
        (Cell::Number(a), Value::Integer(b)) => Ok(a.partial_cmp(&(*b as f64))),
        (Cell::Number(a), Value::Float(b)) => Ok(a.partial_cmp(b)),
        (Cell::Number(a), Value::Text(b)) => Ok(a.partial_cmp(&number(b)?)),
        (Cell::Text(a), Value::Integer(b)) => Ok(number(a)?.partial_cmp(&(*b as f64))),
        (Cell::Text(a), Value::Float(b)) => Ok(number(a)?.partial_cmp(b)),
        (Cell::Keyed(_), _) => Err(ExecError::type_mismatch(column, value)),
    }
}
