//! SQL transpiler for compiled plans.
//!
//! Renders predicate trees and whole plans into SQL text with named
//! `:name` placeholders.

use crate::plan::Plan;
use crate::predicate::{Fragment, Predicate};

/// Trait for converting compiled nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

impl ToSql for Fragment {
    fn to_sql(&self) -> String {
        self.sql.clone()
    }
}

impl ToSql for Predicate {
    fn to_sql(&self) -> String {
        match self {
            Predicate::Leaf(fragment) => fragment.to_sql(),
            Predicate::And(children) | Predicate::Or(children) => {
                let joiner = match self.connective() {
                    Some(c) => format!(" {} ", c.keyword()),
                    None => String::new(),
                };
                // Combinator children are wrapped for correct precedence
                let parts: Vec<String> = children
                    .iter()
                    .filter(|c| !c.is_empty())
                    .map(|c| match c {
                        Predicate::Leaf(_) => c.to_sql(),
                        _ => format!("({})", c.to_sql()),
                    })
                    .collect();
                parts.join(&joiner)
            }
        }
    }
}

impl ToSql for Plan {
    fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        sql.push_str(&self.select.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&self.from);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        if let Some(n) = self.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::IncludeTree;

    fn leaf(sql: &str) -> Predicate {
        Predicate::leaf(sql, vec![])
    }

    #[test]
    fn test_leaf_renders_bare() {
        assert_eq!(leaf("a = :p1").to_sql(), "a = :p1");
    }

    #[test]
    fn test_nested_combinators_are_parenthesized() {
        let p = Predicate::And(vec![
            leaf("a = :p1"),
            Predicate::Or(vec![leaf("b = :p2"), leaf("c = :p3")]),
        ]);
        assert_eq!(p.to_sql(), "a = :p1 AND (b = :p2 OR c = :p3)");
    }

    #[test]
    fn test_empty_children_are_skipped() {
        let p = Predicate::Or(vec![leaf("a"), Predicate::And(vec![]), leaf("b")]);
        assert_eq!(p.to_sql(), "a OR b");
    }

    #[test]
    fn test_plan_to_sql() {
        let plan = Plan {
            model: "Person".to_string(),
            base_table: "people".to_string(),
            from: "people".to_string(),
            select: vec!["DISTINCT people.*".to_string()],
            joins: vec![
                "JOIN articles AS smql_articles ON people.id = smql_articles.person_id".to_string(),
            ],
            predicate: leaf("smql_articles.title = :p1"),
            where_clause: Some("smql_articles.title = :p1".to_string()),
            bindings: vec![("p1".to_string(), "x".into())],
            order: vec!["people.surname ASC".to_string()],
            limit: Some(10),
            offset: Some(20),
            includes: IncludeTree::default(),
        };
        assert_eq!(
            plan.to_sql(),
            "SELECT DISTINCT people.* FROM people \
             JOIN articles AS smql_articles ON people.id = smql_articles.person_id \
             WHERE smql_articles.title = :p1 ORDER BY people.surname ASC LIMIT 10 OFFSET 20"
        );
    }
}
