//! Reading client filter JSON.
//!
//! The client sends a nested structure of groups (`"type": "tvslst"`) and
//! leaves (`"type": "tvs"`). This module checks every structural rule and
//! produces a [`FilterNode<RawTvs>`]; term hydration and selector decoding
//! happen later, once a term registry is available.
//!
//! ```rust
//! use cohort_filter::{parse_str, FilterNode};
//!
//! let filter = parse_str(r#"{
//!     "type": "tvslst",
//!     "join": "and",
//!     "lst": [
//!         { "type": "tvs", "tvs": { "term": { "id": "sex" }, "values": [{ "key": "F" }] } },
//!         { "type": "tvs", "tvs": { "term": { "id": "age" }, "ranges": [{ "start": 10, "stop": 20 }] } }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(filter.leaf_count(), 2);
//! ```

use serde_json::{Map, Value};

use crate::ast::{FilterNode, Group, Join, Polarity, RawTerm, RawTvs};
use crate::error::{FilterError, FilterResult};

const ROOT_PATH: &str = "$";
const GROUP_TYPE: &str = "tvslst";
const LEAF_TYPE: &str = "tvs";

/// Parses filter JSON text.
pub fn parse_str(input: &str) -> FilterResult<FilterNode<RawTvs>> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| FilterError::InvalidJson(e.to_string()))?;
    parse(&value)
}

/// Parses a filter from an already-decoded JSON value.
///
/// The root must be a group. An empty root group is returned as-is and means
/// "no filter"; an empty group anywhere else is rejected.
pub fn parse(value: &Value) -> FilterResult<FilterNode<RawTvs>> {
    let object = value.as_object().ok_or_else(|| FilterError::NotAGroup {
        path: ROOT_PATH.to_string(),
    })?;
    if object.get("type").and_then(Value::as_str) != Some(GROUP_TYPE) {
        return Err(FilterError::NotAGroup {
            path: ROOT_PATH.to_string(),
        });
    }
    parse_group(object, ROOT_PATH, true).map(FilterNode::Group)
}

fn parse_group(object: &Map<String, Value>, path: &str, is_root: bool) -> FilterResult<Group<RawTvs>> {
    let list_path = format!("{}.lst", path);
    let entries = object
        .get("lst")
        .and_then(Value::as_array)
        .ok_or_else(|| FilterError::ListNotArray {
            path: list_path.clone(),
        })?;

    if entries.is_empty() {
        if is_root {
            return Ok(Group::empty());
        }
        return Err(FilterError::EmptyNestedGroup {
            path: path.to_string(),
        });
    }

    if entries.len() == 2 && is_empty_group(&entries[1]) {
        return Err(FilterError::DenormalizedEmptyGroup {
            path: path.to_string(),
        });
    }

    let join = parse_join(object, path, entries.len())?;

    let polarity = match object.get("in") {
        None | Some(Value::Null) => Polarity::Match,
        Some(Value::Bool(flag)) => Polarity::from_in_flag(*flag),
        Some(other) => {
            return Err(FilterError::MalformedNode {
                path: path.to_string(),
                message: format!("\"in\" must be a boolean, got {}", other),
            })
        }
    };

    let mut children = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let entry_path = format!("{}[{}]", list_path, i);
        children.push(parse_entry(entry, &entry_path)?);
    }

    Ok(Group {
        join,
        polarity,
        children,
    })
}

fn parse_join(object: &Map<String, Value>, path: &str, len: usize) -> FilterResult<Option<Join>> {
    // The join of a single-entry group is irrelevant, whatever the client sent.
    if len < 2 {
        return Ok(None);
    }
    match object.get("join") {
        None | Some(Value::Null) => Err(FilterError::MissingJoin {
            path: path.to_string(),
            len,
        }),
        Some(Value::String(s)) if s.is_empty() => Err(FilterError::MissingJoin {
            path: path.to_string(),
            len,
        }),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Some(Join::And)),
            "or" => Ok(Some(Join::Or)),
            _ => Err(FilterError::InvalidJoin {
                path: path.to_string(),
                join: s.clone(),
            }),
        },
        Some(other) => Err(FilterError::InvalidJoin {
            path: path.to_string(),
            join: other.to_string(),
        }),
    }
}

fn parse_entry(entry: &Value, path: &str) -> FilterResult<FilterNode<RawTvs>> {
    let object = entry.as_object().ok_or_else(|| FilterError::MalformedNode {
        path: path.to_string(),
        message: "filter entry must be an object".to_string(),
    })?;

    match object.get("type").and_then(Value::as_str) {
        Some(GROUP_TYPE) => parse_group(object, path, false).map(FilterNode::Group),
        Some(LEAF_TYPE) => parse_leaf(object, path).map(FilterNode::Leaf),
        Some(other) => Err(FilterError::MalformedNode {
            path: path.to_string(),
            message: format!("unknown filter entry type \"{}\"", other),
        }),
        None => Err(FilterError::MalformedNode {
            path: path.to_string(),
            message: "filter entry has no type".to_string(),
        }),
    }
}

fn parse_leaf(object: &Map<String, Value>, path: &str) -> FilterResult<RawTvs> {
    let malformed = |message: &str| FilterError::MalformedNode {
        path: path.to_string(),
        message: message.to_string(),
    };

    let tvs = object
        .get("tvs")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("leaf has no tvs object"))?;
    let term_fields = tvs
        .get("term")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("tvs has no term object"))?;
    let id = term_fields
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| malformed("tvs.term has no id"))?;

    let negate = match tvs.get("isnot") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(malformed("tvs.isnot must be a boolean")),
    };

    let body: Map<String, Value> = tvs
        .iter()
        .filter(|(k, _)| k.as_str() != "term" && k.as_str() != "isnot")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(RawTvs {
        term: RawTerm {
            id: id.to_string(),
            fields: term_fields.clone(),
        },
        negate,
        body,
    })
}

fn is_empty_group(value: &Value) -> bool {
    value
        .as_object()
        .filter(|o| o.get("type").and_then(Value::as_str) == Some(GROUP_TYPE))
        .and_then(|o| o.get("lst"))
        .and_then(Value::as_array)
        .is_some_and(|lst| lst.is_empty())
}
