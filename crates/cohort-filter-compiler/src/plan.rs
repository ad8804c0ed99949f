//! Compiled query plans.
//!
//! A [`CompiledPlan`] is a list of named subqueries in dependency order. Each
//! subquery body is a small relational expression over the annotation tables;
//! literal values never appear in a body, only positional placeholders whose
//! values travel alongside in [`CompiledSubquery::values`].
//!
//! The plan renders to one SQL statement with [`CompiledPlan::to_sql`]:
//!
//! ```text
//! WITH
//!   f_0 AS (SELECT sample FROM anno_categorical WHERE (term_id = ? AND value IN (?))),
//!   f_superset AS (SELECT sample FROM f_0),
//!   f AS (SELECT sample FROM f_superset)
//! SELECT sample FROM f
//! ```

use std::fmt;

use serde::Serialize;

// =============================================================================
// Parameter values
// =============================================================================

/// A positional parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Term ids, category keys, genotype calls, sample types.
    Text(String),
    /// Sample ids and exit codes.
    Integer(i64),
    /// Range bounds and cutoffs.
    Float(f64),
}

impl Value {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

// =============================================================================
// Tables and predicates
// =============================================================================

/// Annotation tables a subquery can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Every sample, with its sample type.
    SampleIdMap,
    /// Categorical annotations.
    AnnoCategorical,
    /// Integer annotations.
    AnnoInteger,
    /// Float annotations.
    AnnoFloat,
    /// Survival exit codes and times.
    Survival,
    /// Precomputed condition grades.
    ConditionByGrade,
    /// Precomputed condition child terms.
    ConditionByChild,
    /// Keyed numeric sub-values.
    AnnoMultivalue,
}

impl Table {
    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::SampleIdMap => "sampleidmap",
            Table::AnnoCategorical => "anno_categorical",
            Table::AnnoInteger => "anno_integer",
            Table::AnnoFloat => "anno_float",
            Table::Survival => "survival",
            Table::ConditionByGrade => "precomputed_chc_grade",
            Table::ConditionByChild => "precomputed_chc_child",
            Table::AnnoMultivalue => "anno_multivalue",
        }
    }

    /// Column holding the sample id.
    pub fn sample_column(&self) -> Column {
        match self {
            Table::SampleIdMap => Column::Id,
            _ => Column::Sample,
        }
    }
}

/// Table columns referenced by predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Annotated term id.
    TermId,
    /// Sample id in annotation tables.
    Sample,
    /// Sample id in `sampleidmap`.
    Id,
    /// Annotated value (category, number, grade, child term, keyed bag).
    Value,
    /// Survival exit code.
    ExitCode,
    /// Survival time to event.
    TimeToEvent,
    /// Row is the sample's max grade.
    MaxGrade,
    /// Row is the sample's most recent grade.
    MostRecent,
    /// Row is a computable grade.
    ComputableGrade,
    /// Sample type in `sampleidmap`.
    SampleType,
}

impl Column {
    /// SQL column name.
    pub fn name(&self) -> &'static str {
        match self {
            Column::TermId => "term_id",
            Column::Sample => "sample",
            Column::Id => "id",
            Column::Value => "value",
            Column::ExitCode => "exit_code",
            Column::TimeToEvent => "tte",
            Column::MaxGrade => "max_grade",
            Column::MostRecent => "most_recent",
            Column::ComputableGrade => "computable_grade",
            Column::SampleType => "sample_type",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// SQL operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A row predicate. Literal slots are positional placeholders, consumed
/// left to right.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// `column op ?`
    Compare(Column, CompareOp),
    /// `column [NOT] IN (?, ...)` with `arity` placeholders.
    In {
        /// Compared column.
        column: Column,
        /// `NOT IN`.
        negated: bool,
        /// Number of placeholders.
        arity: usize,
    },
    /// Boolean flag column is set; no placeholder.
    IsSet(Column),
    /// The keyed value named by one placeholder is present and positive, or
    /// with `negated` absent or not positive.
    KeyPositive {
        /// Absent or `<= 0` instead.
        negated: bool,
    },
    /// Conjunction; empty is true.
    All(Vec<Predicate>),
    /// Disjunction; empty is false.
    Any(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `term_id = ?`
    pub fn term_id() -> Self {
        Predicate::Compare(Column::TermId, CompareOp::Eq)
    }

    /// Number of placeholders in the predicate.
    pub fn placeholder_count(&self) -> usize {
        match self {
            Predicate::Compare(..) => 1,
            Predicate::In { arity, .. } => *arity,
            Predicate::IsSet(_) => 0,
            Predicate::KeyPositive { .. } => 1,
            Predicate::All(parts) | Predicate::Any(parts) => {
                parts.iter().map(Predicate::placeholder_count).sum()
            }
            Predicate::Not(inner) => inner.placeholder_count(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare(column, op) => write!(f, "{} {} ?", column.name(), op.symbol()),
            Predicate::In { arity: 0, negated, .. } => {
                write!(f, "{}", if *negated { "1" } else { "0" })
            }
            Predicate::In {
                column,
                negated,
                arity,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let slots = vec!["?"; *arity].join(", ");
                write!(f, "{} {}IN ({})", column.name(), not, slots)
            }
            Predicate::IsSet(column) => write!(f, "{} = 1", column.name()),
            Predicate::KeyPositive { negated } => {
                let op = if *negated { "<=" } else { ">" };
                write!(f, "COALESCE(json_extract(value, '$.' || ?), 0) {} 0", op)
            }
            Predicate::All(parts) => write_joined(f, parts, "AND", "1"),
            Predicate::Any(parts) => write_joined(f, parts, "OR", "0"),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Predicate],
    joiner: &str,
    empty: &str,
) -> fmt::Result {
    match parts {
        [] => write!(f, "{}", empty),
        [single] => write!(f, "{}", single),
        _ => {
            write!(f, "(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", joiner)?;
                }
                write!(f, "{}", part)?;
            }
            write!(f, ")")
        }
    }
}

// =============================================================================
// Subqueries
// =============================================================================

/// Set operator combining a group's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOp {
    /// OR group.
    Union,
    /// AND group.
    Intersect,
}

impl SetOp {
    /// SQL keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::Intersect => "INTERSECT",
        }
    }
}

/// Body of a named subquery. Every body yields one `sample` column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubqueryBody {
    /// Rows of one table filtered by a predicate.
    Select {
        /// Source table.
        table: Table,
        /// Row filter.
        predicate: Predicate,
    },
    /// Samples of `of` plus all of their descendants.
    Expand {
        /// Expanded subquery.
        of: String,
    },
    /// Union or intersection of earlier subqueries; no operator for one input.
    Combine {
        /// Set operator.
        op: Option<SetOp>,
        /// Input subquery names in child order.
        inputs: Vec<String>,
    },
    /// Pass-through of a group superset.
    Matched {
        /// The superset.
        of: String,
    },
    /// All samples except those of `of`.
    Complement {
        /// The superset.
        of: String,
    },
    /// All samples.
    Universe,
}

impl SubqueryBody {
    /// Number of placeholders in the body.
    pub fn placeholder_count(&self) -> usize {
        match self {
            SubqueryBody::Select { predicate, .. } => predicate.placeholder_count(),
            _ => 0,
        }
    }

    /// Names of the subqueries this body reads.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            SubqueryBody::Expand { of }
            | SubqueryBody::Matched { of }
            | SubqueryBody::Complement { of } => vec![of.as_str()],
            SubqueryBody::Combine { inputs, .. } => inputs.iter().map(String::as_str).collect(),
            SubqueryBody::Select { .. } | SubqueryBody::Universe => Vec::new(),
        }
    }
}

impl fmt::Display for SubqueryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubqueryBody::Select { table, predicate } => {
                match table.sample_column() {
                    Column::Sample => write!(f, "SELECT sample")?,
                    other => write!(f, "SELECT {} AS sample", other.name())?,
                }
                write!(f, " FROM {} WHERE {}", table.name(), predicate)
            }
            SubqueryBody::Expand { of } => write!(
                f,
                "SELECT sample FROM {of} UNION SELECT sample FROM sample_ancestry \
                 WHERE ancestor_id IN (SELECT sample FROM {of})"
            ),
            SubqueryBody::Combine { op, inputs } => {
                let joiner = match op {
                    Some(op) => format!(" {} ", op.keyword()),
                    None => " UNION ".to_string(),
                };
                let selects: Vec<String> = inputs
                    .iter()
                    .map(|name| format!("SELECT sample FROM {}", name))
                    .collect();
                write!(f, "{}", selects.join(&joiner))
            }
            SubqueryBody::Matched { of } => write!(f, "SELECT sample FROM {}", of),
            SubqueryBody::Complement { of } => write!(
                f,
                "SELECT id AS sample FROM sampleidmap WHERE id NOT IN (SELECT sample FROM {})",
                of
            ),
            SubqueryBody::Universe => write!(f, "SELECT id AS sample FROM sampleidmap"),
        }
    }
}

/// A named subquery with its ordered parameter values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSubquery {
    /// Unique name derived from tree position.
    pub name: String,
    /// Relational body.
    pub body: SubqueryBody,
    /// Values of the body's placeholders, in placeholder order.
    pub values: Vec<Value>,
}

impl CompiledSubquery {
    /// Creates a subquery without parameters.
    pub fn new(name: impl Into<String>, body: SubqueryBody) -> Self {
        Self {
            name: name.into(),
            body,
            values: Vec::new(),
        }
    }

    /// Creates a table selection with its parameter values.
    pub fn select(
        name: impl Into<String>,
        table: Table,
        predicate: Predicate,
        values: Vec<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            body: SubqueryBody::Select { table, predicate },
            values,
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// The output of compilation: named subqueries in dependency order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPlan {
    /// Name of the subquery holding the final sample set.
    pub root: String,
    /// Subqueries; each only reads subqueries listed before it.
    pub subqueries: Vec<CompiledSubquery>,
}

impl CompiledPlan {
    /// Looks up a subquery by name.
    pub fn get(&self, name: &str) -> Option<&CompiledSubquery> {
        self.subqueries.iter().find(|s| s.name == name)
    }

    /// The root subquery.
    pub fn root_subquery(&self) -> Option<&CompiledSubquery> {
        self.get(&self.root)
    }

    /// All parameter values in placeholder order.
    pub fn values(&self) -> Vec<Value> {
        self.subqueries
            .iter()
            .flat_map(|s| s.values.iter().cloned())
            .collect()
    }

    /// Whether the plan selects every sample (empty root filter).
    pub fn is_unfiltered(&self) -> bool {
        matches!(
            self.root_subquery().map(|s| &s.body),
            Some(SubqueryBody::Universe)
        )
    }

    /// Renders the plan as one SQL statement with `?` placeholders.
    pub fn to_sql(&self) -> String {
        let ctes: Vec<String> = self
            .subqueries
            .iter()
            .map(|s| format!("  {} AS ({})", s.name, s.body))
            .collect();
        format!("WITH\n{}\nSELECT sample FROM {}", ctes.join(",\n"), self.root)
    }
}

impl fmt::Display for CompiledPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Name of the `index`-th child of `parent`.
pub fn child_name(parent: &str, index: usize) -> String {
    format!("{}_{}", parent, index)
}

/// Name of a group's combined-children subquery.
pub fn superset_name(group: &str) -> String {
    format!("{}_superset", group)
}

/// Name of a leaf's match set before ancestry expansion.
pub fn raw_name(leaf: &str) -> String {
    format!("{}_raw", leaf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categorical(name: &str, keys: &[&str]) -> CompiledSubquery {
        let mut values = vec![Value::text("sex")];
        values.extend(keys.iter().map(|k| Value::text(*k)));
        CompiledSubquery::select(
            name,
            Table::AnnoCategorical,
            Predicate::All(vec![
                Predicate::term_id(),
                Predicate::In {
                    column: Column::Value,
                    negated: false,
                    arity: keys.len(),
                },
            ]),
            values,
        )
    }

    #[test]
    fn test_child_naming_is_positional() {
        assert_eq!(child_name("f", 0), "f_0");
        assert_eq!(child_name(&child_name("f", 1), 2), "f_1_2");
        assert_eq!(superset_name("f_1"), "f_1_superset");
        assert_eq!(raw_name("f_0"), "f_0_raw");
    }

    #[test]
    fn test_predicate_display() {
        let predicate = Predicate::All(vec![
            Predicate::term_id(),
            Predicate::In {
                column: Column::Value,
                negated: true,
                arity: 2,
            },
        ]);
        assert_eq!(predicate.to_string(), "(term_id = ? AND value NOT IN (?, ?))");
        assert_eq!(predicate.placeholder_count(), 3);
    }

    #[test]
    fn test_predicate_display_empty_forms() {
        assert_eq!(Predicate::All(vec![]).to_string(), "1");
        assert_eq!(Predicate::Any(vec![]).to_string(), "0");
        let empty_in = Predicate::In {
            column: Column::Id,
            negated: false,
            arity: 0,
        };
        assert_eq!(empty_in.to_string(), "0");
        assert_eq!(empty_in.placeholder_count(), 0);
    }

    #[test]
    fn test_predicate_not_and_flags() {
        let predicate = Predicate::Any(vec![
            Predicate::Not(Box::new(Predicate::Compare(Column::Value, CompareOp::Ge))),
            Predicate::IsSet(Column::MaxGrade),
            Predicate::KeyPositive { negated: false },
        ]);
        assert_eq!(
            predicate.to_string(),
            "(NOT (value >= ?) OR max_grade = 1 OR COALESCE(json_extract(value, '$.' || ?), 0) > 0)"
        );
        assert_eq!(predicate.placeholder_count(), 2);
    }

    #[test]
    fn test_subquery_body_sql() {
        let universe = SubqueryBody::Universe;
        assert_eq!(universe.to_string(), "SELECT id AS sample FROM sampleidmap");

        let complement = SubqueryBody::Complement {
            of: "f_superset".to_string(),
        };
        assert_eq!(
            complement.to_string(),
            "SELECT id AS sample FROM sampleidmap WHERE id NOT IN (SELECT sample FROM f_superset)"
        );

        let combine = SubqueryBody::Combine {
            op: Some(SetOp::Intersect),
            inputs: vec!["f_0".to_string(), "f_1".to_string()],
        };
        assert_eq!(
            combine.to_string(),
            "SELECT sample FROM f_0 INTERSECT SELECT sample FROM f_1"
        );
        assert_eq!(combine.dependencies(), vec!["f_0", "f_1"]);
    }

    #[test]
    fn test_plan_to_sql_and_values() {
        let plan = CompiledPlan {
            root: "f".to_string(),
            subqueries: vec![
                categorical("f_0", &["F"]),
                categorical("f_1", &["A", "B"]),
                CompiledSubquery::new(
                    "f_superset",
                    SubqueryBody::Combine {
                        op: Some(SetOp::Union),
                        inputs: vec!["f_0".to_string(), "f_1".to_string()],
                    },
                ),
                CompiledSubquery::new(
                    "f",
                    SubqueryBody::Matched {
                        of: "f_superset".to_string(),
                    },
                ),
            ],
        };

        let sql = plan.to_sql();
        assert!(sql.starts_with("WITH\n  f_0 AS (SELECT sample FROM anno_categorical WHERE"));
        assert!(sql.ends_with("SELECT sample FROM f"));
        assert_eq!(sql.matches('?').count(), plan.values().len());
        assert_eq!(
            plan.values(),
            vec![
                Value::text("sex"),
                Value::text("F"),
                Value::text("sex"),
                Value::text("A"),
                Value::text("B"),
            ]
        );
        assert!(!plan.is_unfiltered());
    }

    #[test]
    fn test_plan_unfiltered() {
        let plan = CompiledPlan {
            root: "f".to_string(),
            subqueries: vec![CompiledSubquery::new("f", SubqueryBody::Universe)],
        };
        assert!(plan.is_unfiltered());
        assert!(plan.values().is_empty());
    }

    #[test]
    fn test_value_serializes_untagged() {
        let values = vec![Value::text("sex"), Value::Integer(3), Value::Float(2.5)];
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"["sex",3,2.5]"#
        );
    }
}
