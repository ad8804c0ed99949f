//! Type-specific predicate payloads of term-value selectors.
//!
//! [`Selector`] is a closed sum type with one variant per [`TermType`]. The
//! payload is decoded from the tvs object once the term type is known, so a
//! bare term reference must be hydrated before its selector can be read.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ast::Join;
use crate::error::SelectorError;
use crate::term::{deserialize_key, deserialize_number, deserialize_optional_number, Term, TermType};
use crate::SampleId;

// =============================================================================
// Shared pieces
// =============================================================================

/// A selected value key, e.g. `{ "key": "F", "label": "Female" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueKey {
    /// The key matched against stored annotations.
    #[serde(deserialize_with = "deserialize_key")]
    pub key: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ValueKey {
    /// Creates a value key without a label.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: None,
        }
    }
}

/// A bounded or unbounded numeric interval.
///
/// A missing bound is treated as unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Lower bound.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<f64>,
    /// Upper bound.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop: Option<f64>,
    /// Whether `start` is included.
    #[serde(default)]
    pub startinclusive: bool,
    /// Whether `stop` is included.
    #[serde(default)]
    pub stopinclusive: bool,
    /// Ignore `start`.
    #[serde(default)]
    pub startunbounded: bool,
    /// Ignore `stop`.
    #[serde(default)]
    pub stopunbounded: bool,
}

impl Interval {
    /// Creates `[start, stop)`.
    pub fn half_open(start: f64, stop: f64) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            startinclusive: true,
            ..Default::default()
        }
    }

    /// Effective lower bound and whether it is inclusive.
    pub fn lower(&self) -> Option<(f64, bool)> {
        match self.start {
            Some(start) if !self.startunbounded => Some((start, self.startinclusive)),
            _ => None,
        }
    }

    /// Effective upper bound and whether it is inclusive.
    pub fn upper(&self) -> Option<(f64, bool)> {
        match self.stop {
            Some(stop) if !self.stopunbounded => Some((stop, self.stopinclusive)),
            _ => None,
        }
    }

    /// Whether `value` lies in the interval.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower() {
            Some((start, true)) => value >= start,
            Some((start, false)) => value > start,
            None => true,
        };
        let below = match self.upper() {
            Some((stop, true)) => value <= stop,
            Some((stop, false)) => value < stop,
            None => true,
        };
        above && below
    }
}

/// An exact special value such as `-9999 |Not tested|`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialValue {
    /// The sentinel value.
    #[serde(deserialize_with = "deserialize_number")]
    pub value: f64,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One range of a numeric selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericRange {
    /// Exact special value, bypassing interval logic.
    Special(SpecialValue),
    /// Numeric interval.
    Interval(Interval),
}

impl NumericRange {
    /// Whether `value` falls in this range.
    pub fn contains(&self, value: f64) -> bool {
        match self {
            NumericRange::Special(special) => special.value == value,
            NumericRange::Interval(interval) => interval.contains(value),
        }
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericRange::Special(special) => write!(f, "={}", special.value),
            NumericRange::Interval(interval) => {
                match interval.lower() {
                    Some((start, true)) => write!(f, "[{}", start)?,
                    Some((start, false)) => write!(f, "({}", start)?,
                    None => write!(f, "(-inf")?,
                }
                match interval.upper() {
                    Some((stop, true)) => write!(f, ", {}]", stop),
                    Some((stop, false)) => write!(f, ", {})", stop),
                    None => write!(f, ", +inf)"),
                }
            }
        }
    }
}

// =============================================================================
// Per-type payloads
// =============================================================================

/// Payload of a categorical leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSelector {
    /// Accepted categories.
    pub values: Vec<ValueKey>,
}

/// Payload of an integer or float leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSelector {
    /// Ranges, combined with OR.
    pub ranges: Vec<NumericRange>,
}

impl NumericSelector {
    /// Whether any range is a true interval rather than a sentinel.
    pub fn has_interval(&self) -> bool {
        self.ranges
            .iter()
            .any(|r| matches!(r, NumericRange::Interval(_)))
    }

    /// Whether a sentinel range names `value`.
    pub fn names_special(&self, value: f64) -> bool {
        self.ranges
            .iter()
            .any(|r| matches!(r, NumericRange::Special(s) if s.value == value))
    }
}

/// Which precomputed condition view a leaf reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionAxis {
    /// Rows keyed by grade.
    ByGrade,
    /// Rows keyed by child condition term.
    ByChildren,
}

/// Which row of the precomputed view counts for a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeRestriction {
    /// Highest grade the sample reached.
    MaxGrade,
    /// Most recent grade.
    MostRecent,
    /// Any computable grade.
    ComputableGrade,
}

/// Payload of a condition leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSelector {
    /// Read the by-grade view.
    #[serde(default)]
    pub bar_by_grade: bool,
    /// Read the by-children view.
    #[serde(default)]
    pub bar_by_children: bool,
    /// Restrict to each sample's max grade.
    #[serde(default)]
    pub value_by_max_grade: bool,
    /// Restrict to each sample's most recent grade.
    #[serde(default)]
    pub value_by_most_recent: bool,
    /// Restrict to computable grades.
    #[serde(default)]
    pub value_by_computable_grade: bool,
    /// Accepted grades or child term ids.
    #[serde(default)]
    pub values: Vec<ValueKey>,
}

impl ConditionSelector {
    /// The axis, which must be set exactly once.
    pub fn axis(&self) -> Result<ConditionAxis, SelectorError> {
        match (self.bar_by_grade, self.bar_by_children) {
            (true, false) => Ok(ConditionAxis::ByGrade),
            (false, true) => Ok(ConditionAxis::ByChildren),
            (false, false) => Err(SelectorError::new(
                "one of bar_by_grade or bar_by_children must be set",
            )),
            (true, true) => Err(SelectorError::new(
                "bar_by_grade and bar_by_children are mutually exclusive",
            )),
        }
    }

    /// The restriction mode, which must be set exactly once.
    pub fn restriction(&self) -> Result<GradeRestriction, SelectorError> {
        let modes = [
            (self.value_by_max_grade, GradeRestriction::MaxGrade),
            (self.value_by_most_recent, GradeRestriction::MostRecent),
            (self.value_by_computable_grade, GradeRestriction::ComputableGrade),
        ];
        let mut set = modes.iter().filter(|(on, _)| *on).map(|(_, mode)| *mode);
        match (set.next(), set.next()) {
            (Some(mode), None) => Ok(mode),
            (None, _) => Err(SelectorError::new(
                "one of value_by_max_grade, value_by_most_recent or value_by_computable_grade must be set",
            )),
            (Some(_), Some(_)) => Err(SelectorError::new(
                "only one value_by_* restriction may be set",
            )),
        }
    }
}

/// Payload of a survival leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalSelector {
    /// Accepted exit codes.
    pub values: Vec<ValueKey>,
    /// Minimum time to event.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub cutoff: Option<f64>,
}

/// Payload of a sample-list leaf.
///
/// The ids come from the groups in the term's vocabulary, in group-key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleListSelector {
    /// Listed sample ids.
    pub ids: Vec<SampleId>,
    /// Sample type the list is declared at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_type: Option<String>,
}

impl SampleListSelector {
    fn from_term(term: &Term, body: &Map<String, Value>) -> Result<Self, SelectorError> {
        let ids = term
            .values
            .values()
            .flat_map(|group| group.list.iter().map(|entry| entry.sample_id))
            .collect();
        let sample_type = match body.get("sample_type") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(SelectorError::new(format!(
                    "sample_type must be a string, got {}",
                    other
                )))
            }
        };
        Ok(Self { ids, sample_type })
    }
}

/// Mutation data type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(pub u8);

impl DataType {
    /// SNV and small indel.
    pub const SNV_INDEL: DataType = DataType(1);
    /// RNA fusion.
    pub const FUSION_RNA: DataType = DataType(2);
    /// Copy number variation.
    pub const CNV: DataType = DataType(4);
    /// Structural variant.
    pub const SV: DataType = DataType(5);
    /// Internal tandem duplication.
    pub const ITD: DataType = DataType(6);
    /// Loss of heterozygosity.
    pub const LOH: DataType = DataType(10);

    /// Short display name.
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "SNV/indel",
            2 => "Fusion RNA",
            4 => "CNV",
            5 => "SV",
            6 => "ITD",
            10 => "LOH",
            _ => "other",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Origin of a variant call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Inherited.
    Germline,
    /// Acquired.
    Somatic,
}

/// Include/exclude classes for one (data type, origin) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantClassRule {
    /// Data type the rule applies to.
    pub dt: DataType,
    /// Origin the rule applies to; any origin when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    /// Classes shown as included.
    #[serde(default, rename = "mclassLst")]
    pub mclass_lst: Vec<String>,
    /// Classes that disqualify a sample.
    #[serde(default, rename = "mclassExcludeLst")]
    pub mclass_exclude_lst: Vec<String>,
}

impl VariantClassRule {
    /// Whether a classification with this data type and origin is governed by the rule.
    pub fn applies_to(&self, dt: DataType, origin: Option<Origin>) -> bool {
        self.dt == dt && self.origin.map_or(true, |o| origin == Some(o))
    }

    /// Whether `class` is excluded by the rule.
    pub fn excludes(&self, class: &str) -> bool {
        self.mclass_exclude_lst.iter().any(|c| c == class)
    }
}

/// Payload of a gene-variant leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneVariantSelector {
    /// One rule per (data type, origin).
    pub values: Vec<VariantClassRule>,
}

/// Payload of a gene-expression or metabolite-intensity leaf.
///
/// Each range is a bin; a value that falls in no bin does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeSelector {
    /// Bins in declaration order.
    pub ranges: Vec<NumericRange>,
}

impl QuantitativeSelector {
    /// Index of the first bin containing `value`.
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        self.ranges.iter().position(|r| r.contains(value))
    }
}

/// Payload of a snp leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnpSelector {
    /// Accepted genotype calls.
    pub values: Vec<ValueKey>,
}

/// Payload of a multivalue leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultivalueSelector {
    /// Sub-value keys.
    pub values: Vec<ValueKey>,
    /// How keys combine; required for more than one key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<Join>,
}

// =============================================================================
// Selector
// =============================================================================

/// Type-specific predicate of a leaf, one variant per term type.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Categorical membership.
    Categorical(CategoricalSelector),
    /// Integer ranges.
    Integer(NumericSelector),
    /// Float ranges.
    Float(NumericSelector),
    /// Condition grades.
    Condition(ConditionSelector),
    /// Survival exit codes.
    Survival(SurvivalSelector),
    /// Explicit sample ids.
    SampleList(SampleListSelector),
    /// Genotype calls.
    Snp(SnpSelector),
    /// Variant classes.
    GeneVariant(GeneVariantSelector),
    /// Expression bins.
    GeneExpression(QuantitativeSelector),
    /// Metabolite bins.
    MetaboliteIntensity(QuantitativeSelector),
    /// Multivalue keys.
    Multivalue(MultivalueSelector),
}

impl Selector {
    /// Decodes the payload of a tvs whose term is known.
    ///
    /// `body` is the tvs object without its `term` and `isnot` fields.
    pub fn decode(term: &Term, body: &Map<String, Value>) -> Result<Self, SelectorError> {
        Ok(match term.term_type {
            TermType::Categorical => Selector::Categorical(from_body(body)?),
            TermType::Integer => Selector::Integer(from_body(body)?),
            TermType::Float => Selector::Float(from_body(body)?),
            TermType::Condition => Selector::Condition(from_body(body)?),
            TermType::Survival => Selector::Survival(from_body(body)?),
            TermType::SampleList => Selector::SampleList(SampleListSelector::from_term(term, body)?),
            TermType::Snp => Selector::Snp(from_body(body)?),
            TermType::GeneVariant => Selector::GeneVariant(from_body(body)?),
            TermType::GeneExpression => Selector::GeneExpression(from_body(body)?),
            TermType::MetaboliteIntensity => Selector::MetaboliteIntensity(from_body(body)?),
            TermType::Multivalue => Selector::Multivalue(from_body(body)?),
        })
    }

    /// The term type this payload belongs to.
    pub fn term_type(&self) -> TermType {
        match self {
            Selector::Categorical(_) => TermType::Categorical,
            Selector::Integer(_) => TermType::Integer,
            Selector::Float(_) => TermType::Float,
            Selector::Condition(_) => TermType::Condition,
            Selector::Survival(_) => TermType::Survival,
            Selector::SampleList(_) => TermType::SampleList,
            Selector::Snp(_) => TermType::Snp,
            Selector::GeneVariant(_) => TermType::GeneVariant,
            Selector::GeneExpression(_) => TermType::GeneExpression,
            Selector::MetaboliteIntensity(_) => TermType::MetaboliteIntensity,
            Selector::Multivalue(_) => TermType::Multivalue,
        }
    }
}

fn from_body<T: DeserializeOwned>(body: &Map<String, Value>) -> Result<T, SelectorError> {
    serde_json::from_value(Value::Object(body.clone())).map_err(|e| SelectorError::new(e.to_string()))
}
