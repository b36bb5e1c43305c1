//! Boolean predicate tree built from condition fragments.
//!
//! Conditions contribute [`Fragment`]s (SQL text plus the parameters it
//! references) combined by `And`/`Or` nodes. [`Predicate::normalize`]
//! flattens the tree without changing its truth value.

use serde::Serialize;

/// Opaque SQL text and the parameter names it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<String>,
}

/// The connective of a combinator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn keyword(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }

    pub fn node(self, children: Vec<Predicate>) -> Predicate {
        match self {
            Connective::And => Predicate::And(children),
            Connective::Or => Predicate::Or(children),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Predicate {
    Leaf(Fragment),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::And(Vec::new())
    }
}

impl From<Fragment> for Predicate {
    fn from(fragment: Fragment) -> Self {
        Predicate::Leaf(fragment)
    }
}

impl Predicate {
    pub fn leaf(sql: impl Into<String>, params: Vec<String>) -> Self {
        Predicate::Leaf(Fragment {
            sql: sql.into(),
            params,
        })
    }

    pub fn connective(&self) -> Option<Connective> {
        match self {
            Predicate::Leaf(_) => None,
            Predicate::And(_) => Some(Connective::And),
            Predicate::Or(_) => Some(Connective::Or),
        }
    }

    pub fn children(&self) -> &[Predicate] {
        match self {
            Predicate::Leaf(_) => &[],
            Predicate::And(children) | Predicate::Or(children) => children,
        }
    }

    /// A combinator without children: contributes no constraint.
    pub fn is_empty(&self) -> bool {
        !matches!(self, Predicate::Leaf(_)) && self.children().is_empty()
    }

    /// Append `child` to a combinator; a leaf becomes `And[leaf, child]`.
    pub fn push(&mut self, child: Predicate) {
        match self {
            Predicate::And(children) | Predicate::Or(children) => children.push(child),
            Predicate::Leaf(_) => {
                let leaf = std::mem::take(self);
                *self = Predicate::And(vec![leaf, child]);
            }
        }
    }

    /// Flatten the tree: children first, then drop empty children, splice
    /// children of the same connective into their parent and collapse
    /// single-child nodes into that child.
    pub fn normalize(self) -> Predicate {
        match self {
            Predicate::Leaf(_) => self,
            Predicate::And(children) => Self::optimize(Connective::And, children),
            Predicate::Or(children) => Self::optimize(Connective::Or, children),
        }
    }

    fn optimize(kind: Connective, children: Vec<Predicate>) -> Predicate {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            let child = child.normalize();
            if child.is_empty() {
                continue;
            }
            match child {
                Predicate::And(grand) if kind == Connective::And => out.extend(grand),
                Predicate::Or(grand) if kind == Connective::Or => out.extend(grand),
                other => out.push(other),
            }
        }
        if out.len() == 1 {
            if let Some(only) = out.pop() {
                return only;
            }
        }
        kind.node(out)
    }

    /// Evaluate with `truth` deciding each leaf. Empty combinators are
    /// neutral and yield `None`.
    pub fn evaluate<F>(&self, truth: &F) -> Option<bool>
    where
        F: Fn(&Fragment) -> bool,
    {
        match self {
            Predicate::Leaf(fragment) => Some(truth(fragment)),
            Predicate::And(children) => children
                .iter()
                .filter_map(|c| c.evaluate(truth))
                .fold(None, |acc, v| Some(acc.unwrap_or(true) && v)),
            Predicate::Or(children) => children
                .iter()
                .filter_map(|c| c.evaluate(truth))
                .fold(None, |acc, v| Some(acc.unwrap_or(false) || v)),
        }
    }

    /// Parameter names referenced by the leaves, in order.
    pub fn params(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Leaf(f) => out.extend(f.params.iter().map(String::as_str)),
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().for_each(|c| c.collect_params(out))
            }
        }
    }

    /// Indented rendering for debug output.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.pretty_into(&mut out, 0);
        out
    }

    fn pretty_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Predicate::Leaf(f) => {
                out.push_str(&indent);
                out.push_str(&f.sql);
                out.push('\n');
            }
            Predicate::And(children) | Predicate::Or(children) => {
                let keyword = self.connective().map(Connective::keyword).unwrap_or_default();
                out.push_str(&format!("{}{}\n", indent, keyword));
                for child in children {
                    child.pretty_into(out, depth + 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(sql: &str) -> Predicate {
        Predicate::leaf(sql, vec![])
    }

    fn sample() -> Predicate {
        Predicate::And(vec![
            Predicate::And(vec![leaf("a"), Predicate::Or(vec![leaf("b")])]),
            Predicate::Or(vec![]),
            Predicate::Or(vec![Predicate::Or(vec![leaf("c"), leaf("d")]), leaf("e")]),
            Predicate::And(vec![Predicate::And(vec![])]),
        ])
    }

    #[test]
    fn test_normalize_flattens() {
        assert_eq!(
            sample().normalize(),
            Predicate::And(vec![
                leaf("a"),
                leaf("b"),
                Predicate::Or(vec![leaf("c"), leaf("d"), leaf("e")]),
            ])
        );
    }

    #[test]
    fn test_singleton_collapses_at_root() {
        assert_eq!(Predicate::Or(vec![Predicate::And(vec![leaf("a")])]).normalize(), leaf("a"));
        assert!(Predicate::And(vec![Predicate::Or(vec![])]).normalize().is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = sample().normalize();
        assert_eq!(once.clone().normalize(), once);
    }

    #[test]
    fn test_normalize_preserves_truth() {
        let tree = sample();
        let normalized = tree.clone().normalize();
        let names = ["a", "b", "c", "d", "e"];
        for mask in 0u32..(1 << names.len()) {
            let truth = |f: &Fragment| {
                let i = names.iter().position(|n| *n == f.sql).unwrap();
                mask & (1 << i) != 0
            };
            assert_eq!(tree.evaluate(&truth), normalized.evaluate(&truth), "mask {mask:05b}");
        }
    }

    #[test]
    fn test_push_onto_leaf() {
        let mut p = leaf("a");
        p.push(leaf("b"));
        assert_eq!(p, Predicate::And(vec![leaf("a"), leaf("b")]));
    }

    #[test]
    fn test_params_in_order() {
        let p = Predicate::Or(vec![
            Predicate::leaf("x = :p1", vec!["p1".into()]),
            Predicate::leaf("x BETWEEN :p2 AND :p3", vec!["p2".into(), "p3".into()]),
        ]);
        assert_eq!(p.params(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_pretty() {
        let p = Predicate::And(vec![leaf("a"), Predicate::Or(vec![leaf("b"), leaf("c")])]);
        assert_eq!(p.pretty(), "AND\n  a\n  OR\n    b\n    c\n");
    }
}
