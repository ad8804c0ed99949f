//! In-memory sample-annotation tables.

use std::collections::{BTreeMap, HashMap};

use cohort_filter::{SampleId, Term};
use cohort_filter_compiler::{Column, Table, TermRegistry};
use roaring::RoaringBitmap;

// =============================================================================
// Rows
// =============================================================================

/// A stored cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Text value (categories, term ids, sample types).
    Text(String),
    /// Numeric value; boolean flags are stored as 0 or 1.
    Number(f64),
    /// Keyed bag of numeric sub-values.
    Keyed(BTreeMap<String, f64>),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Number(if value { 1.0 } else { 0.0 })
    }
}

/// One table row. A column without a cell is NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Sample the row belongs to.
    pub sample: SampleId,
    /// Non-NULL cells.
    pub cells: HashMap<Column, Cell>,
}

impl Row {
    fn new(sample: SampleId) -> Self {
        Self {
            sample,
            cells: HashMap::new(),
        }
    }

    fn with(mut self, column: Column, cell: impl Into<Cell>) -> Self {
        self.cells.insert(column, cell.into());
        self
    }

    /// The cell of `column`, or None for NULL.
    pub fn get(&self, column: Column) -> Option<&Cell> {
        self.cells.get(&column)
    }
}

/// Which precomputed condition rows a grade or child entry belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeFlags {
    /// The sample's highest grade.
    pub max_grade: bool,
    /// The sample's most recent grade.
    pub most_recent: bool,
    /// A computable grade.
    pub computable: bool,
}

impl GradeFlags {
    /// Flags for an entry that is max, most recent and computable.
    pub fn all() -> Self {
        Self {
            max_grade: true,
            most_recent: true,
            computable: true,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// An in-memory sample-annotation store.
///
/// Holds the sample universe, the sample ancestry relation, one row list per
/// annotation [`Table`], and the term dictionary. It serves as the
/// [`TermRegistry`] for compilation and as the plan executor.
///
/// # Example
///
/// ```rust
/// use cohort_filter::{Term, TermType};
/// use cohort_filter_compiler::TermRegistry;
/// use cohort_filter_memstore::MemoryStore;
///
/// let mut store = MemoryStore::new();
/// store.add_term(Term::new("sex", TermType::Categorical));
/// store.add_sample(1);
/// store.annotate_categorical(1, "sex", "F");
///
/// assert!(store.resolve("sex").is_some());
/// assert_eq!(store.sample_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    samples: RoaringBitmap,
    children: HashMap<SampleId, Vec<SampleId>>,
    tables: HashMap<Table, Vec<Row>>,
    terms: HashMap<String, Term>,
    term_sample_types: HashMap<String, String>,
    parent_sample_type: Option<String>,
}

impl MemoryStore {
    /// Creates an empty store with a single sample type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the parent sample type of a two-level schema.
    pub fn with_parent_sample_type(mut self, sample_type: impl Into<String>) -> Self {
        self.parent_sample_type = Some(sample_type.into());
        self
    }

    // -------------------------------------------------------------------------
    // Samples
    // -------------------------------------------------------------------------

    /// Adds a sample without a sample type.
    pub fn add_sample(&mut self, sample: SampleId) {
        self.insert_sample(sample, Row::new(sample).with(Column::Id, f64::from(sample)));
    }

    /// Adds a sample of the given type.
    pub fn add_typed_sample(&mut self, sample: SampleId, sample_type: &str) {
        self.insert_sample(
            sample,
            Row::new(sample)
                .with(Column::Id, f64::from(sample))
                .with(Column::SampleType, sample_type),
        );
    }

    fn insert_sample(&mut self, sample: SampleId, row: Row) {
        if self.samples.insert(sample) {
            self.push(Table::SampleIdMap, row);
        }
    }

    /// Records `child` as derived from `parent` (e.g. a tumor from a patient).
    pub fn add_child(&mut self, parent: SampleId, child: SampleId) {
        self.children.entry(parent).or_default().push(child);
    }

    /// Direct children of a sample.
    pub fn children_of(&self, sample: SampleId) -> &[SampleId] {
        self.children.get(&sample).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All samples.
    pub fn samples(&self) -> &RoaringBitmap {
        &self.samples
    }

    /// Number of samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len() as usize
    }

    // -------------------------------------------------------------------------
    // Terms
    // -------------------------------------------------------------------------

    /// Adds a term annotated without a sample type.
    pub fn add_term(&mut self, term: Term) {
        self.terms.insert(term.id.clone(), term);
    }

    /// Adds a term annotated at `sample_type`.
    pub fn add_term_at(&mut self, term: Term, sample_type: &str) {
        self.term_sample_types
            .insert(term.id.clone(), sample_type.to_string());
        self.add_term(term);
    }

    // -------------------------------------------------------------------------
    // Annotations
    // -------------------------------------------------------------------------

    /// Records a categorical value.
    pub fn annotate_categorical(&mut self, sample: SampleId, term_id: &str, value: &str) {
        self.annotate(Table::AnnoCategorical, sample, term_id, value);
    }

    /// Records an integer value.
    pub fn annotate_integer(&mut self, sample: SampleId, term_id: &str, value: i64) {
        self.annotate(Table::AnnoInteger, sample, term_id, value as f64);
    }

    /// Records a float value.
    pub fn annotate_float(&mut self, sample: SampleId, term_id: &str, value: f64) {
        self.annotate(Table::AnnoFloat, sample, term_id, value);
    }

    /// Records a keyed bag of sub-values.
    pub fn annotate_multivalue<K: Into<String>>(
        &mut self,
        sample: SampleId,
        term_id: &str,
        values: impl IntoIterator<Item = (K, f64)>,
    ) {
        let bag = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.annotate(Table::AnnoMultivalue, sample, term_id, Cell::Keyed(bag));
    }

    /// Records a survival outcome.
    pub fn add_survival(&mut self, sample: SampleId, term_id: &str, exit_code: i64, time_to_event: f64) {
        let row = Row::new(sample)
            .with(Column::TermId, term_id)
            .with(Column::ExitCode, exit_code as f64)
            .with(Column::TimeToEvent, time_to_event);
        self.push(Table::Survival, row);
    }

    /// Records a precomputed condition grade.
    pub fn add_condition_grade(&mut self, sample: SampleId, term_id: &str, grade: i64, flags: GradeFlags) {
        self.push_condition(Table::ConditionByGrade, sample, term_id, Cell::Number(grade as f64), flags);
    }

    /// Records a precomputed condition child term.
    pub fn add_condition_child(&mut self, sample: SampleId, term_id: &str, child: &str, flags: GradeFlags) {
        self.push_condition(Table::ConditionByChild, sample, term_id, Cell::from(child), flags);
    }

    fn push_condition(&mut self, table: Table, sample: SampleId, term_id: &str, value: Cell, flags: GradeFlags) {
        let row = Row::new(sample)
            .with(Column::TermId, term_id)
            .with(Column::Value, value)
            .with(Column::MaxGrade, flags.max_grade)
            .with(Column::MostRecent, flags.most_recent)
            .with(Column::ComputableGrade, flags.computable);
        self.push(table, row);
    }

    fn annotate(&mut self, table: Table, sample: SampleId, term_id: &str, value: impl Into<Cell>) {
        let row = Row::new(sample)
            .with(Column::TermId, term_id)
            .with(Column::Value, value);
        self.push(table, row);
    }

    fn push(&mut self, table: Table, row: Row) {
        self.tables.entry(table).or_default().push(row);
    }

    /// Rows of a table.
    pub fn rows(&self, table: Table) -> &[Row] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl TermRegistry for MemoryStore {
    fn resolve(&self, term_id: &str) -> Option<Term> {
        self.terms.get(term_id).cloned()
    }

    fn sample_type_of(&self, term_id: &str) -> Option<String> {
        self.term_sample_types.get(term_id).cloned()
    }

    fn parent_sample_type(&self) -> Option<String> {
        self.parent_sample_type.clone()
    }
}
