//! Error types for filter parsing and term decoding.

use thiserror::Error;

/// Structural errors found while reading a client filter tree.
///
/// Every variant carries the path of the offending node, e.g. `$.lst[1].lst`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter text is not valid JSON.
    #[error("invalid filter JSON: {0}")]
    InvalidJson(String),

    /// A node that must be a group is something else.
    #[error("{path}: filter must be a group (type \"tvslst\")")]
    NotAGroup {
        /// Path of the node.
        path: String,
    },

    /// A group's `lst` is missing or not an array.
    #[error("{path}: filter.lst must be an array")]
    ListNotArray {
        /// Path of the group.
        path: String,
    },

    /// A group with more than one child has no join operator.
    #[error("{path}: join must be \"and\" or \"or\" when the group has {len} entries")]
    MissingJoin {
        /// Path of the group.
        path: String,
        /// Number of children.
        len: usize,
    },

    /// A join operator other than `and` / `or`.
    #[error("{path}: invalid join \"{join}\"")]
    InvalidJoin {
        /// Path of the group.
        path: String,
        /// The rejected value.
        join: String,
    },

    /// An empty group below the root.
    #[error("{path}: nested filter has an empty lst, normalize the filter before sending it")]
    EmptyNestedGroup {
        /// Path of the empty group.
        path: String,
    },

    /// A two-entry group whose second entry is an empty group.
    #[error("{path}: the second entry is an empty nested filter, normalize the filter before sending it")]
    DenormalizedEmptyGroup {
        /// Path of the enclosing group.
        path: String,
    },

    /// A node that is neither a group nor a well-formed leaf.
    #[error("{path}: {message}")]
    MalformedNode {
        /// Path of the node.
        path: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Errors turning a JSON term definition into a [`Term`](crate::Term).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermDecodeError {
    /// The `type` tag names no supported term type.
    #[error("unknown term type \"{type_tag}\" for term {term_id}")]
    UnknownType {
        /// Term id.
        term_id: String,
        /// The unrecognized tag.
        type_tag: String,
    },

    /// The term object does not match the expected shape.
    #[error("malformed term {term_id}: {message}")]
    Malformed {
        /// Term id.
        term_id: String,
        /// Decoder message.
        message: String,
    },
}

/// A selector payload that does not fit its term type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SelectorError {
    /// Description of the problem.
    pub message: String,
}

impl SelectorError {
    /// Creates a selector error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for filter parsing.
pub type FilterResult<T> = std::result::Result<T, FilterError>;
