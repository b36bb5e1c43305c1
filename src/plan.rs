//! The compiled query plan.

use crate::predicate::Predicate;
use crate::value::BindValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// Nested relation names to eager-load alongside the result rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IncludeTree(BTreeMap<String, IncludeTree>);

impl IncludeTree {
    /// Insert a relation path, creating intermediate levels.
    pub fn insert(&mut self, path: &[String]) {
        let mut node = self;
        for name in path {
            node = node.0.entry(name.clone()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&IncludeTree> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Dotted paths of every leaf, e.g. `articles.tags`.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, child) in &self.0 {
            if child.is_empty() {
                out.push(name.clone());
            } else {
                out.extend(child.paths().into_iter().map(|p| format!("{}.{}", name, p)));
            }
        }
        out
    }
}

/// Everything needed to execute a compiled query.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub model: String,
    pub base_table: String,
    /// `FROM` target, with alias when the base is aliased.
    pub from: String,
    pub select: Vec<String>,
    pub joins: Vec<String>,
    #[serde(skip)]
    pub predicate: Predicate,
    pub where_clause: Option<String>,
    /// Parameter values keyed by name, in allocation order.
    pub bindings: Vec<(String, BindValue)>,
    pub order: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub includes: IncludeTree,
}

impl Plan {
    pub fn binding(&self, name: &str) -> Option<&BindValue> {
        self.bindings.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}
