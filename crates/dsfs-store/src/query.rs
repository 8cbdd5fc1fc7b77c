//! Property-filtered, key-ordered queries.
//!
//! A [`Query`] selects entities of one kind in one namespace, keeps those
//! whose properties satisfy every [`Filter`], orders them by key ascending and
//! then applies offset and limit. Results are restartable by re-running the
//! same query with a larger offset.

use std::cmp::Ordering;

use crate::error::StoreResult;
use crate::types::{Entity, Key, Value};

/// Comparison operator for a property filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterOp {
    /// `property = value`
    Eq,
    /// `property >= value`
    Ge,
    /// `property > value`
    Gt,
    /// `property <= value`
    Le,
    /// `property < value`
    Lt,
}

/// A single property predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    /// Property name.
    pub property: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Right-hand operand.
    pub value: Value,
}

impl Filter {
    /// Returns true if the entity carries the property and it satisfies the
    /// predicate. Missing properties and mismatched types never match.
    pub fn matches(&self, entity: &Entity) -> bool {
        let Some(actual) = entity.get(&self.property) else {
            return false;
        };
        let Some(ord) = actual.compare(&self.value) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Ge => ord != Ordering::Less,
            FilterOp::Gt => ord == Ordering::Greater,
            FilterOp::Le => ord != Ordering::Greater,
            FilterOp::Lt => ord == Ordering::Less,
        }
    }
}

/// A query over one kind, ordered by key ascending.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Namespace to search.
    pub namespace: String,
    /// Entity kind to search.
    pub kind: String,
    /// Conjunction of property filters.
    pub filters: Vec<Filter>,
    /// Number of matching results to skip.
    pub offset: usize,
    /// Maximum number of results; `None` means unbounded.
    pub limit: Option<usize>,
    /// Return keys without entity bodies.
    pub keys_only: bool,
    /// Exclusive lower bound on the key name.
    pub start_after: Option<String>,
}

impl Query {
    /// Creates an unfiltered query over `kind` in the default namespace.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            kind: kind.into(),
            filters: Vec::new(),
            offset: 0,
            limit: None,
            keys_only: false,
            start_after: None,
        }
    }

    /// Restricts the query to a namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Adds a property filter.
    pub fn filter(
        mut self,
        property: impl Into<String>,
        op: FilterOp,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            property: property.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Skips the first `offset` matches.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Requests keys only.
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Only returns keys whose name sorts strictly after `name`. Applied
    /// before `offset` and `limit`.
    pub fn start_after(mut self, name: impl Into<String>) -> Self {
        self.start_after = Some(name.into());
        self
    }

    /// Returns true if the key is in this query's namespace and kind.
    pub fn selects_key(&self, key: &Key) -> bool {
        key.is_in(&self.namespace, &self.kind)
    }

    /// Returns true if the entity satisfies every filter.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.filters.iter().all(|f| f.matches(entity))
    }
}

/// One query result. `entity` is `None` for keys-only queries.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    /// Key of the matching entity.
    pub key: Key,
    /// The entity body, unless the query was keys-only.
    pub entity: Option<Entity>,
}

/// Lazily evaluated, finite sequence of query results in key order.
pub type QueryIter<'a> = Box<dyn Iterator<Item = StoreResult<QueryResult>> + Send + 'a>;
