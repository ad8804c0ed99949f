//! # cohort-filter
//!
//! Boolean filter trees over term-value selectors for cohort selection in a
//! sample-annotation database.
//!
//! A filter is a tree of groups (AND / OR, optionally complemented) whose
//! leaves are term-value selectors (tvs): a term plus a type-specific
//! predicate, such as a set of categories, numeric ranges or variant classes.
//!
//! This crate provides:
//! - **Wire parsing**: read client filter JSON with structural validation
//! - **Typed model**: [`Term`], [`TermType`] and one [`Selector`] variant per term type
//!
//! ## Usage
//!
//! ```rust
//! use cohort_filter::{parse_str, FilterNode};
//!
//! let filter = parse_str(r#"{
//!     "type": "tvslst",
//!     "in": false,
//!     "lst": [{ "type": "tvs", "tvs": {
//!         "term": { "id": "diagnosis", "type": "categorical" },
//!         "values": [{ "key": "A" }, { "key": "B" }]
//!     }}]
//! }"#).unwrap();
//!
//! assert_eq!(filter.leaf_count(), 1);
//! ```
//!
//! ## Supported term types
//!
//! | Tag | Selector payload |
//! |-----|------------------|
//! | `categorical` | `values: [{key}]` |
//! | `integer`, `float` | `ranges: [interval \| {value}]` |
//! | `condition` | axis flag, restriction flag, `values` |
//! | `survival` | exit code `values`, optional `cutoff` |
//! | `samplelst` | ids from the term's groups |
//! | `snp` | genotype `values` |
//! | `geneVariant` | `values: [{dt, origin, mclassExcludeLst}]` |
//! | `geneExpression`, `metaboliteIntensity` | bin `ranges` |
//! | `multivalue` | key `values`, `join` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod error;
mod selector;
mod term;
mod wire;

pub use ast::{FilterNode, Group, Join, Polarity, RawTerm, RawTvs, Tvs};
pub use error::{FilterError, FilterResult, SelectorError, TermDecodeError};
pub use selector::{
    CategoricalSelector, ConditionAxis, ConditionSelector, DataType, GeneVariantSelector,
    GradeRestriction, Interval, MultivalueSelector, NumericRange, NumericSelector, Origin,
    QuantitativeSelector, SampleListSelector, Selector, SnpSelector, SpecialValue,
    SurvivalSelector, ValueKey, VariantClassRule,
};
pub use term::{SampleListEntry, Term, TermType, TermValue};
pub use wire::{parse, parse_str};

/// Internal sample identifier.
pub type SampleId = u32;
