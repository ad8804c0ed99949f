//! Filter tree types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::selector::Selector;
use crate::term::Term;

// =============================================================================
// Group operators
// =============================================================================

/// How a group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Join {
    /// Intersection of the children.
    And,
    /// Union of the children.
    Or,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Join::And => write!(f, "AND"),
            Join::Or => write!(f, "OR"),
        }
    }
}

/// Whether a group selects its combined children or their complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Polarity {
    /// Samples matched by the children (`"in": true`).
    #[default]
    Match,
    /// All samples except those matched by the children (`"in": false`).
    Complement,
}

impl Polarity {
    /// Maps the wire `in` flag to a polarity.
    pub fn from_in_flag(flag: bool) -> Self {
        if flag {
            Polarity::Match
        } else {
            Polarity::Complement
        }
    }
}

// =============================================================================
// Leaves
// =============================================================================

/// A term-value selector whose term is fully typed.
#[derive(Debug, Clone, PartialEq)]
pub struct Tvs {
    /// The selected term.
    pub term: Term,
    /// Type-specific negation (`isnot`).
    pub negate: bool,
    /// Type-specific predicate.
    pub selector: Selector,
}

impl Tvs {
    /// Creates a non-negated selector.
    pub fn new(term: Term, selector: Selector) -> Self {
        Self {
            term,
            negate: false,
            selector,
        }
    }

    /// Sets the negation flag.
    pub fn negated(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }
}

/// A term reference as sent by the client.
///
/// A reference without a `type` is bare and must be hydrated from the term
/// registry before its selector can be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTerm {
    /// Term id.
    pub id: String,
    /// The full term object as received.
    pub fields: Map<String, Value>,
}

impl RawTerm {
    /// Whether the reference lacks type metadata.
    pub fn is_bare(&self) -> bool {
        !self.fields.contains_key("type")
    }
}

/// A term-value selector as sent by the client, before hydration.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTvs {
    /// Term reference.
    pub term: RawTerm,
    /// The `isnot` flag.
    pub negate: bool,
    /// Remaining tvs fields, decoded once the term type is known.
    pub body: Map<String, Value>,
}

// =============================================================================
// Tree
// =============================================================================

/// A boolean combinator over child nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<L = Tvs> {
    /// Join operator; only required with more than one child.
    pub join: Option<Join>,
    /// Match or complement.
    pub polarity: Polarity,
    /// Ordered children.
    pub children: Vec<FilterNode<L>>,
}

impl<L> Group<L> {
    /// Creates an empty group, i.e. "no filter".
    pub fn empty() -> Self {
        Self {
            join: None,
            polarity: Polarity::Match,
            children: Vec::new(),
        }
    }

    /// Creates an AND group.
    pub fn and(children: Vec<FilterNode<L>>) -> Self {
        Self {
            join: Some(Join::And),
            polarity: Polarity::Match,
            children,
        }
    }

    /// Creates an OR group.
    pub fn or(children: Vec<FilterNode<L>>) -> Self {
        Self {
            join: Some(Join::Or),
            polarity: Polarity::Match,
            children,
        }
    }

    /// Creates a single-child group with no join.
    pub fn single(child: FilterNode<L>) -> Self {
        Self {
            join: None,
            polarity: Polarity::Match,
            children: vec![child],
        }
    }

    /// Switches the group to complement polarity.
    pub fn complement(mut self) -> Self {
        self.polarity = Polarity::Complement;
        self
    }

    /// Whether the group has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A node of a filter tree: a group or a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode<L = Tvs> {
    /// Boolean combinator.
    Group(Group<L>),
    /// Term-value selector.
    Leaf(L),
}

impl<L> FilterNode<L> {
    /// Wraps a leaf.
    pub fn leaf(leaf: L) -> Self {
        FilterNode::Leaf(leaf)
    }

    /// Visits every leaf in pre-order.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a L)) {
        match self {
            FilterNode::Leaf(leaf) => f(leaf),
            FilterNode::Group(group) => {
                for child in &group.children {
                    child.for_each_leaf(&mut *f);
                }
            }
        }
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.for_each_leaf(&mut |_| count += 1);
        count
    }

    /// Rebuilds the tree with every leaf converted, stopping at the first error.
    ///
    /// Leaves are converted in pre-order.
    pub fn try_map_leaves<M, E>(
        self,
        f: &mut impl FnMut(L) -> Result<M, E>,
    ) -> Result<FilterNode<M>, E> {
        match self {
            FilterNode::Leaf(leaf) => f(leaf).map(FilterNode::Leaf),
            FilterNode::Group(group) => {
                let mut children = Vec::with_capacity(group.children.len());
                for child in group.children {
                    children.push(child.try_map_leaves(&mut *f)?);
                }
                Ok(FilterNode::Group(Group {
                    join: group.join,
                    polarity: group.polarity,
                    children,
                }))
            }
        }
    }
}

impl<L> From<Group<L>> for FilterNode<L> {
    fn from(group: Group<L>) -> Self {
        FilterNode::Group(group)
    }
}

impl fmt::Display for Tvs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negate { "NOT " } else { "" };
        write!(f, "{}:{} {}", self.term.term_type, self.term.id, not)?;
        match &self.selector {
            Selector::Categorical(s) => write_keys(f, s.values.iter().map(|v| v.key.as_str())),
            Selector::Snp(s) => write_keys(f, s.values.iter().map(|v| v.key.as_str())),
            Selector::Survival(s) => write_keys(f, s.values.iter().map(|v| v.key.as_str())),
            Selector::Condition(s) => write_keys(f, s.values.iter().map(|v| v.key.as_str())),
            Selector::Multivalue(s) => write_keys(f, s.values.iter().map(|v| v.key.as_str())),
            Selector::Integer(s) | Selector::Float(s) => write_ranges(f, &s.ranges),
            Selector::GeneExpression(s) | Selector::MetaboliteIntensity(s) => {
                write_ranges(f, &s.ranges)
            }
            Selector::SampleList(s) => write!(f, "{} samples", s.ids.len()),
            Selector::GeneVariant(s) => write!(f, "{} class rules", s.values.len()),
        }
    }
}

fn write_keys<'a>(f: &mut fmt::Formatter<'_>, keys: impl Iterator<Item = &'a str>) -> fmt::Result {
    write!(f, "IN (")?;
    for (i, key) in keys.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", key)?;
    }
    write!(f, ")")
}

fn write_ranges(f: &mut fmt::Formatter<'_>, ranges: &[crate::NumericRange]) -> fmt::Result {
    for (i, range) in ranges.iter().enumerate() {
        if i > 0 {
            write!(f, " OR ")?;
        }
        write!(f, "{}", range)?;
    }
    Ok(())
}

impl fmt::Display for FilterNode<Tvs> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Leaf(tvs) => write!(f, "{}", tvs),
            FilterNode::Group(group) => {
                if group.polarity == Polarity::Complement {
                    write!(f, "NOT ")?;
                }
                write!(f, "(")?;
                let join = group.join.unwrap_or(Join::And);
                for (i, child) in group.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", join)?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
