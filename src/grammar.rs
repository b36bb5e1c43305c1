//! The operator grammar: an ordered table of condition rules.
//!
//! A key `path<op>` with value `v` instantiates the first rule whose
//! operator equals `op` and which accepts the shape of `v`. Rules sharing
//! an operator are ordered from the most specific to the most general.

use crate::value::Shape;
use serde_json::Value;

/// How a matched rule turns into a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `sql % [column, param]`, one parameter per value. With `temporal`,
    /// strings compared against chronological columns bind as timestamps.
    Template { sql: &'static str, temporal: bool },
    /// `sql % [column]`, no parameter.
    Exists(&'static str),
    /// `sql % [column, param]` with the whole array bound as one parameter.
    Membership(&'static str),
    /// `sql % [column, begin, end]`.
    Range(&'static str),
    /// `sql % [start column, end column, begin, end]`.
    Overlap(&'static str),
    EqualJoin,
    SubEqualJoin,
    Select,
    Function,
}

/// One row of the grammar table.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub operator: &'static str,
    pub shapes: &'static [Shape],
    pub kind: RuleKind,
    pub description: &'static str,
}

impl Rule {
    pub fn accepts(&self, operator: &str, value: &Value) -> bool {
        self.operator == operator && self.shapes.iter().any(|s| s.accepts(value))
    }
}

const SCALARS: &[Shape] = &[Shape::Array, Shape::String, Shape::Number];
const ORDERED: &[Shape] = &[Shape::Array, Shape::Number, Shape::String];

const fn template(sql: &'static str) -> RuleKind {
    RuleKind::Template {
        sql,
        temporal: false,
    }
}

const fn ordering(sql: &'static str) -> RuleKind {
    RuleKind::Template {
        sql,
        temporal: true,
    }
}

/// Condition rules in precedence order.
pub static RULES: &[Rule] = &[
    Rule {
        name: "NotInRange",
        operator: "!..",
        shapes: &[Shape::Pair],
        kind: RuleKind::Range("%s NOT BETWEEN %s AND %s"),
        description: "outside the inclusive range [a, b]",
    },
    Rule {
        name: "InRange",
        operator: "..",
        shapes: &[Shape::Pair],
        kind: RuleKind::Range("%s BETWEEN %s AND %s"),
        description: "inside the inclusive range [a, b]",
    },
    Rule {
        name: "Overlaps",
        operator: "<=>",
        shapes: &[Shape::TimeSpan],
        kind: RuleKind::Overlap("(%s, %s) OVERLAPS (%s, %s)"),
        description: "start|end column pairs overlap [start, end|seconds]",
    },
    Rule {
        name: "NotOverlaps",
        operator: "!<=>",
        shapes: &[Shape::TimeSpan],
        kind: RuleKind::Overlap("NOT (%s, %s) OVERLAPS (%s, %s)"),
        description: "start|end column pairs do not overlap [start, end|seconds]",
    },
    Rule {
        name: "NotIn",
        operator: "!|=",
        shapes: &[Shape::Array],
        kind: RuleKind::Membership("%s NOT IN (%s)"),
        description: "not one of the listed values",
    },
    Rule {
        name: "In",
        operator: "|=",
        shapes: &[Shape::Array],
        kind: RuleKind::Membership("%s IN (%s)"),
        description: "one of the listed values",
    },
    Rule {
        name: "In2",
        operator: "",
        shapes: &[Shape::Array],
        kind: RuleKind::Membership("%s IN (%s)"),
        description: "one of the listed values",
    },
    Rule {
        name: "NotEqual",
        operator: "!=",
        shapes: SCALARS,
        kind: template("%s <> %s"),
        description: "not equal",
    },
    Rule {
        name: "NotEqual2",
        operator: "<>",
        shapes: SCALARS,
        kind: template("%s <> %s"),
        description: "not equal",
    },
    Rule {
        name: "GreaterThanOrEqual",
        operator: ">=",
        shapes: ORDERED,
        kind: ordering("%s >= %s"),
        description: "greater than or equal",
    },
    Rule {
        name: "LesserThanOrEqual",
        operator: "<=",
        shapes: ORDERED,
        kind: ordering("%s <= %s"),
        description: "less than or equal",
    },
    Rule {
        name: "EqualJoin",
        operator: "=>",
        shapes: &[Shape::Object, Shape::ObjectList],
        kind: RuleKind::EqualJoin,
        description: "related rows match the sub-query (or any of the sub-queries)",
    },
    Rule {
        name: "SubEqualJoin",
        operator: "()",
        shapes: &[Shape::SubQuery],
        kind: RuleKind::SubEqualJoin,
        description: "the row picked by the sub-query matches the conditions",
    },
    Rule {
        name: "Equal",
        operator: "=",
        shapes: &[Shape::Array, Shape::String, Shape::Number, Shape::Bool],
        kind: template("%s = %s"),
        description: "equal (any of, for arrays)",
    },
    Rule {
        name: "Equal2",
        operator: "",
        shapes: &[Shape::String, Shape::Number],
        kind: template("%s = %s"),
        description: "equal",
    },
    Rule {
        name: "GreaterThan",
        operator: ">",
        shapes: ORDERED,
        kind: ordering("%s > %s"),
        description: "greater than",
    },
    Rule {
        name: "LesserThan",
        operator: "<",
        shapes: ORDERED,
        kind: ordering("%s < %s"),
        description: "less than",
    },
    Rule {
        name: "NotIlike",
        operator: "!~",
        shapes: &[Shape::Array, Shape::String],
        kind: template("%s NOT ILIKE %s"),
        description: "does not match the pattern, case-insensitive",
    },
    Rule {
        name: "Ilike",
        operator: "~",
        shapes: &[Shape::Array, Shape::String],
        kind: template("%s ILIKE %s"),
        description: "matches the pattern, case-insensitive",
    },
    Rule {
        name: "Exists",
        operator: "",
        shapes: &[Shape::True],
        kind: RuleKind::Exists("%s IS NOT NULL"),
        description: "is set",
    },
    Rule {
        name: "NotExists",
        operator: "",
        shapes: &[Shape::False],
        kind: RuleKind::Exists("%s IS NULL"),
        description: "is not set",
    },
    Rule {
        name: "Select",
        operator: "",
        shapes: &[Shape::Null, Shape::Object],
        kind: RuleKind::Select,
        description: "select the column, or eager-include the relation",
    },
    Rule {
        name: "Functions",
        operator: ":",
        shapes: &[
            Shape::String,
            Shape::Array,
            Shape::Object,
            Shape::Number,
            Shape::Null,
        ],
        kind: RuleKind::Function,
        description: "order:, limit:, offset:",
    },
];

/// Functions reachable through the `:` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Order,
    Limit,
    Offset,
}

impl FunctionKind {
    pub fn name(self) -> &'static str {
        match self {
            FunctionKind::Order => "order",
            FunctionKind::Limit => "limit",
            FunctionKind::Offset => "offset",
        }
    }
}

#[derive(Debug)]
pub struct FunctionRule {
    pub kind: FunctionKind,
    pub shapes: &'static [Shape],
}

pub static FUNCTIONS: &[FunctionRule] = &[
    FunctionRule {
        kind: FunctionKind::Order,
        shapes: &[Shape::String, Shape::Array, Shape::Object, Shape::Null],
    },
    FunctionRule {
        kind: FunctionKind::Limit,
        shapes: &[Shape::Count],
    },
    FunctionRule {
        kind: FunctionKind::Offset,
        shapes: &[Shape::Count],
    },
];

/// First function named `name` accepting `value`.
pub fn find_function(name: &str, value: &Value) -> Option<FunctionKind> {
    FUNCTIONS
        .iter()
        .find(|f| f.kind.name() == name && f.shapes.iter().any(|s| s.accepts(value)))
        .map(|f| f.kind)
}

/// Substitute `%s` placeholders in order.
pub fn render(template: &str, args: &[&str]) -> String {
    debug_assert_eq!(
        template.matches("%s").count(),
        args.len(),
        "argument count for template {:?}",
        template
    );
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        out.push_str(args.next().copied().unwrap_or("%s"));
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn first(op: &str, value: Value) -> Option<&'static str> {
        RULES.iter().find(|r| r.accepts(op, &value)).map(|r| r.name)
    }

    #[test]
    fn test_precedence_for_empty_operator() {
        assert_eq!(first("", json!([1, 2])), Some("In2"));
        assert_eq!(first("", json!("Peter")), Some("Equal2"));
        assert_eq!(first("", json!(true)), Some("Exists"));
        assert_eq!(first("", json!(false)), Some("NotExists"));
        assert_eq!(first("", json!(null)), Some("Select"));
        assert_eq!(first("", json!({"title": null})), Some("Select"));
    }

    #[test]
    fn test_shape_decides_between_rules() {
        assert_eq!(first("=", json!("x")), Some("Equal"));
        assert_eq!(first("=", json!({})), None);
        assert_eq!(first("..", json!([1, 2])), Some("InRange"));
        assert_eq!(first("..", json!([1, 2, 3])), None);
        assert_eq!(first("=>", json!([{"id": 1}, {"id": 2}])), Some("EqualJoin"));
        assert_eq!(first("()", json!([{"limit:": 1}, {"id": 2}])), Some("SubEqualJoin"));
        assert_eq!(first("<=>", json!(["2011-01-01", 60])), Some("Overlaps"));
    }

    #[test]
    fn test_functions() {
        assert_eq!(find_function("limit", &json!(10)), Some(FunctionKind::Limit));
        assert_eq!(find_function("limit", &json!("10")), None);
        assert_eq!(find_function("order", &json!("id desc")), Some(FunctionKind::Order));
        assert_eq!(find_function("group", &json!("id")), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(render("%s BETWEEN %s AND %s", &["a.x", ":p1", ":p2"]), "a.x BETWEEN :p1 AND :p2");
        assert_eq!(render("%s IS NULL", &["a.x"]), "a.x IS NULL");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "argument count")]
    fn test_render_rejects_missing_arguments() {
        render("%s BETWEEN %s AND %s", &["a.x", ":p1"]);
    }

    #[test]
    fn test_templates_take_their_arity() {
        for rule in RULES {
            let (sql, arity) = match rule.kind {
                RuleKind::Template { sql, .. } | RuleKind::Membership(sql) => (sql, 2),
                RuleKind::Exists(sql) => (sql, 1),
                RuleKind::Range(sql) => (sql, 3),
                RuleKind::Overlap(sql) => (sql, 4),
                _ => continue,
            };
            assert_eq!(sql.matches("%s").count(), arity, "rule {}", rule.name);
        }
    }
}
