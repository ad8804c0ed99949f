//! Filter validation and term hydration.
//!
//! Shape rules are checked by [`cohort_filter::parse`]. This module turns the
//! parsed tree into a fully typed one: bare term references are resolved
//! through the [`TermRegistry`], typed references are decoded in place, and
//! every leaf's selector payload is decoded against its term type.

use cohort_filter::{FilterNode, RawTvs, Selector, Term, TermDecodeError, Tvs};
use serde_json::Value;
use tracing::trace;

use crate::error::{CompileError, CompileResult};
use crate::traits::TermRegistry;

/// Parses, shape-checks and hydrates a client filter.
pub fn validate(filter: &Value, registry: &dyn TermRegistry) -> CompileResult<FilterNode<Tvs>> {
    let parsed = cohort_filter::parse(filter)?;
    hydrate(parsed, registry)
}

/// Resolves every leaf of a parsed tree, in pre-order, stopping at the first error.
pub fn hydrate(tree: FilterNode<RawTvs>, registry: &dyn TermRegistry) -> CompileResult<FilterNode<Tvs>> {
    tree.try_map_leaves(&mut |raw| hydrate_leaf(raw, registry))
}

fn hydrate_leaf(raw: RawTvs, registry: &dyn TermRegistry) -> CompileResult<Tvs> {
    let term = if raw.term.is_bare() {
        trace!(term = %raw.term.id, "resolving bare term reference");
        registry
            .resolve(&raw.term.id)
            .ok_or_else(|| CompileError::InvalidTermId(raw.term.id.clone()))?
    } else {
        Term::from_json(&raw.term.fields).map_err(|e| match e {
            TermDecodeError::UnknownType { term_id, type_tag } => {
                CompileError::UnknownTermType { term_id, type_tag }
            }
            TermDecodeError::Malformed { term_id, message } => CompileError::LeafStructure {
                term_type: raw
                    .term
                    .fields
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                term_id,
                message,
            },
        })?
    };

    let selector = Selector::decode(&term, &raw.body).map_err(|e| CompileError::LeafStructure {
        term_id: term.id.clone(),
        term_type: term.term_type.to_string(),
        message: e.message,
    })?;

    Ok(Tvs {
        term,
        negate: raw.negate,
        selector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_filter::{FilterError, TermType};
    use serde_json::json;

    struct Registry;

    impl TermRegistry for Registry {
        fn resolve(&self, term_id: &str) -> Option<Term> {
            match term_id {
                "sex" => Some(Term::new("sex", TermType::Categorical)),
                "agedx" => Some(Term::new("agedx", TermType::Float)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_validate_hydrates_bare_terms() {
        let tree = validate(
            &json!({
                "type": "tvslst",
                "join": "and",
                "lst": [
                    { "type": "tvs", "tvs": { "term": { "id": "sex" }, "values": [{ "key": "F" }] } },
                    { "type": "tvs", "tvs": { "term": { "id": "agedx" }, "ranges": [{ "start": 1, "stop": 5 }] } }
                ]
            }),
            &Registry,
        )
        .unwrap();

        let mut types = Vec::new();
        tree.for_each_leaf(&mut |tvs| types.push(tvs.selector.term_type()));
        assert_eq!(types, vec![TermType::Categorical, TermType::Float]);
    }

    #[test]
    fn test_validate_unknown_bare_term() {
        let err = validate(
            &json!({ "type": "tvslst", "lst": [
                { "type": "tvs", "tvs": { "term": { "id": "nope" }, "values": [] } }
            ]}),
            &Registry,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidTermId(id) if id == "nope"));
    }

    #[test]
    fn test_validate_unknown_term_type() {
        let err = validate(
            &json!({ "type": "tvslst", "lst": [
                { "type": "tvs", "tvs": { "term": { "id": "x", "type": "hologram" } } }
            ]}),
            &Registry,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownTermType { type_tag, .. } if type_tag == "hologram"
        ));
    }

    #[test]
    fn test_validate_missing_payload_is_leaf_structure() {
        let err = validate(
            &json!({ "type": "tvslst", "lst": [
                { "type": "tvs", "tvs": { "term": { "id": "age", "type": "integer" } } }
            ]}),
            &Registry,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::LeafStructure { term_id, term_type, .. }
                if term_id == "age" && term_type == "integer"
        ));
    }

    #[test]
    fn test_validate_shape_error_passes_through() {
        let err = validate(&json!({ "type": "tvs" }), &Registry).unwrap_err();
        assert!(matches!(err, CompileError::Shape(FilterError::NotAGroup { .. })));
    }

    #[test]
    fn test_hydrate_stops_at_first_bad_leaf() {
        let err = validate(
            &json!({
                "type": "tvslst",
                "join": "or",
                "lst": [
                    { "type": "tvs", "tvs": { "term": { "id": "first_missing" }, "values": [] } },
                    { "type": "tvs", "tvs": { "term": { "id": "second_missing" }, "values": [] } }
                ]
            }),
            &Registry,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidTermId(id) if id == "first_missing"));
    }
}
