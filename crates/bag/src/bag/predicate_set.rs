//! Named, mutually overridable filter predicates.

use std::collections::BTreeMap;

use sea_query::SimpleExpr;
use tracing::debug;

use super::sql::{all_of, tautology};

/// Mapping from filter key to predicate.
///
/// Keys are unique: setting a key again replaces its predicate, removing it
/// drops its contribution. Predicates are combined with AND in key order, so
/// the composed restriction renders the same way regardless of call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateSet {
    parts: BTreeMap<&'static str, SimpleExpr>,
}

impl PredicateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the predicate for `key`.
    pub fn set(&mut self, key: &'static str, predicate: SimpleExpr) {
        debug!(filter = key, "predicate set");
        self.parts.insert(key, predicate);
    }

    /// Remove the predicate for `key`. Returns whether one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.parts.remove(key).is_some();
        if removed {
            debug!(filter = key, "predicate removed");
        }
        removed
    }

    /// Whether a predicate is installed for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.parts.contains_key(key)
    }

    /// The predicate installed for `key`.
    pub fn get(&self, key: &str) -> Option<&SimpleExpr> {
        self.parts.get(key)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Installed keys in composition order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parts.keys().copied()
    }

    /// AND of every installed predicate; `1 = 1` when none are installed.
    pub fn compose(&self) -> SimpleExpr {
        if self.parts.is_empty() {
            return tautology();
        }
        all_of(self.parts.values().cloned())
    }
}
