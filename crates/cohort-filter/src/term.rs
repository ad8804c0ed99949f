//! Term definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::TermDecodeError;
use crate::SampleId;

// =============================================================================
// Term type
// =============================================================================

/// The closed set of term kinds a filter leaf can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermType {
    /// Categorical annotation with a fixed vocabulary.
    #[serde(rename = "categorical")]
    Categorical,
    /// Integer-valued annotation.
    #[serde(rename = "integer")]
    Integer,
    /// Float-valued annotation.
    #[serde(rename = "float")]
    Float,
    /// Graded condition with precomputed grade/child views.
    #[serde(rename = "condition")]
    Condition,
    /// Time-to-event with exit codes.
    #[serde(rename = "survival")]
    Survival,
    /// Explicit sample list.
    #[serde(rename = "samplelst")]
    SampleList,
    /// Genotype at one variant.
    #[serde(rename = "snp")]
    Snp,
    /// Gene-level variant classification.
    #[serde(rename = "geneVariant")]
    GeneVariant,
    /// Gene expression value.
    #[serde(rename = "geneExpression")]
    GeneExpression,
    /// Metabolite intensity value.
    #[serde(rename = "metaboliteIntensity")]
    MetaboliteIntensity,
    /// Keyed bag of numeric sub-values.
    #[serde(rename = "multivalue")]
    Multivalue,
}

impl TermType {
    /// Every supported term type.
    pub const ALL: [TermType; 11] = [
        TermType::Categorical,
        TermType::Integer,
        TermType::Float,
        TermType::Condition,
        TermType::Survival,
        TermType::SampleList,
        TermType::Snp,
        TermType::GeneVariant,
        TermType::GeneExpression,
        TermType::MetaboliteIntensity,
        TermType::Multivalue,
    ];

    /// The wire tag of this term type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TermType::Categorical => "categorical",
            TermType::Integer => "integer",
            TermType::Float => "float",
            TermType::Condition => "condition",
            TermType::Survival => "survival",
            TermType::SampleList => "samplelst",
            TermType::Snp => "snp",
            TermType::GeneVariant => "geneVariant",
            TermType::GeneExpression => "geneExpression",
            TermType::MetaboliteIntensity => "metaboliteIntensity",
            TermType::Multivalue => "multivalue",
        }
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TermType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

// =============================================================================
// Term metadata
// =============================================================================

/// One sample in a sample-list group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleListEntry {
    /// Internal sample id.
    #[serde(rename = "sampleId")]
    pub sample_id: SampleId,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

/// An entry of a term's value vocabulary.
///
/// Categorical terms list their categories here, numeric terms list special
/// sentinel values (flagged `uncomputable` when they are not real measurements)
/// and sample-list terms list their groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermValue {
    /// Value key, when it differs from the map key.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<String>,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Sentinel that is not a real measurement.
    #[serde(default)]
    pub uncomputable: bool,
    /// Members of a sample-list group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<SampleListEntry>,
}

/// A typed term definition, as resolved by the term registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    /// Term id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Term type tag.
    #[serde(rename = "type")]
    pub term_type: TermType,
    /// Value vocabulary keyed by value key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, TermValue>,
    /// Gene symbol for gene-level terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    /// Metabolite name for metabolite terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metabolite: Option<String>,
}

impl Term {
    /// Creates a term with no metadata.
    pub fn new(id: impl Into<String>, term_type: TermType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            term_type,
            values: BTreeMap::new(),
            gene: None,
            metabolite: None,
        }
    }

    /// Adds a vocabulary entry.
    pub fn with_value(mut self, key: impl Into<String>, value: TermValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Sets the gene symbol.
    pub fn with_gene(mut self, gene: impl Into<String>) -> Self {
        self.gene = Some(gene.into());
        self
    }

    /// Sets the metabolite name.
    pub fn with_metabolite(mut self, metabolite: impl Into<String>) -> Self {
        self.metabolite = Some(metabolite.into());
        self
    }

    /// Decodes a term from its JSON object.
    ///
    /// An unsupported `type` tag is reported as
    /// [`TermDecodeError::UnknownType`] rather than a generic decode failure.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self, TermDecodeError> {
        let term_id = fields
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if let Some(tag) = fields.get("type").and_then(Value::as_str) {
            if tag.parse::<TermType>().is_err() {
                return Err(TermDecodeError::UnknownType {
                    term_id,
                    type_tag: tag.to_string(),
                });
            }
        }

        serde_json::from_value(Value::Object(fields.clone())).map_err(|e| {
            TermDecodeError::Malformed {
                term_id,
                message: e.to_string(),
            }
        })
    }

    /// Key used to look the term up in a quantitative-value store.
    ///
    /// Gene for expression terms, metabolite for metabolite terms, falling
    /// back to the name and then the id.
    pub fn feature_key(&self) -> &str {
        let specific = match self.term_type {
            TermType::GeneExpression | TermType::GeneVariant => self.gene.as_deref(),
            TermType::MetaboliteIntensity => self.metabolite.as_deref(),
            _ => None,
        };
        match specific {
            Some(key) => key,
            None if !self.name.is_empty() => &self.name,
            None => &self.id,
        }
    }

    /// Vocabulary keys flagged as uncomputable.
    pub fn uncomputable_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, v)| v.uncomputable)
            .map(|(k, _)| k.as_str())
    }
}

// =============================================================================
// Key helpers
// =============================================================================

/// Renders a JSON scalar as a value key.
///
/// Clients send keys as strings or numbers interchangeably.
pub(crate) fn key_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn deserialize_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    key_from_json(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid value key: {}", value)))
}

fn deserialize_optional_key<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    key_from_json(&value)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid value key: {}", value)))
}

/// Accepts a number or a numeric string.
pub(crate) fn deserialize_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}

pub(crate) fn deserialize_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got {}", value))),
        _ => Err(serde::de::Error::custom(format!(
            "expected a number, got {}",
            value
        ))),
    }
}
