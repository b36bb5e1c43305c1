//! Condition nodes and their build contract.
//!
//! A [`Condition`] is created by the dispatcher for one `path<op>` key,
//! validated against the schema on construction, and later asked to
//! [`build`](Condition::build) itself against an [`Assembler`]: it joins
//! whatever its columns need, binds its parameters and returns the
//! predicate it contributes (if any).

use crate::assembler::{Assembler, PathToken, SortOrder, TablePath};
use crate::column::Column;
use crate::error::{SmqlError, SmqlResult};
use crate::grammar::{FunctionKind, Rule, RuleKind, find_function, render};
use crate::parser;
use crate::predicate::{Connective, Predicate};
use crate::schema::{Model, RelationKind};
use crate::value::{self, BindValue};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One `=>` column with its compiled sub-documents.
#[derive(Debug, Clone)]
pub struct JoinTarget<'s> {
    pub column: Column<'s>,
    pub subqueries: Vec<Vec<Condition<'s>>>,
}

/// One selected column, or an included relation with optional nested
/// conditions.
#[derive(Debug, Clone)]
pub struct SelectTarget<'s> {
    pub column: Column<'s>,
    pub nested: Vec<Condition<'s>>,
}

/// Members of the `:` function group.
#[derive(Debug, Clone)]
pub enum Function<'s> {
    Order(Vec<(Column<'s>, SortOrder)>),
    Limit(u64),
    Offset(u64),
}

impl Function<'_> {
    pub fn kind(&self) -> FunctionKind {
        match self {
            Function::Order(_) => FunctionKind::Order,
            Function::Limit(_) => FunctionKind::Limit,
            Function::Offset(_) => FunctionKind::Offset,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Condition<'s> {
    /// Generic `sql % [column, param]` comparison.
    Template {
        rule: &'static Rule,
        sql: &'static str,
        columns: Vec<Column<'s>>,
        values: Vec<BindValue>,
    },
    Exists {
        rule: &'static Rule,
        sql: &'static str,
        columns: Vec<Column<'s>>,
    },
    Membership {
        rule: &'static Rule,
        sql: &'static str,
        columns: Vec<Column<'s>>,
        values: BindValue,
    },
    Range {
        rule: &'static Rule,
        sql: &'static str,
        columns: Vec<Column<'s>>,
        bounds: (BindValue, BindValue),
    },
    Overlap {
        rule: &'static Rule,
        sql: &'static str,
        columns: Vec<Column<'s>>,
        span: (DateTime<Utc>, DateTime<Utc>),
    },
    EqualJoin {
        targets: Vec<JoinTarget<'s>>,
    },
    SubEqualJoin {
        column: Column<'s>,
        subquery: Vec<Condition<'s>>,
        conditions: Vec<Condition<'s>>,
    },
    Select {
        targets: Vec<SelectTarget<'s>>,
    },
    Function(Function<'s>),
}

fn unknown_column(col: &Column<'_>, expected: &'static str) -> SmqlError {
    SmqlError::UnknownColumn {
        expected,
        model: col.model().name().to_string(),
        column: col.to_string(),
    }
}

fn unknown_relation(col: &Column<'_>, expected: &'static str) -> SmqlError {
    SmqlError::UnknownRelation {
        expected,
        model: col.model().name().to_string(),
        column: col.to_string(),
    }
}

fn verify_allowed(col: &Column<'_>) -> SmqlResult<()> {
    if col.is_protected() {
        return Err(SmqlError::ProtectedColumnAccess {
            model: col.model().name().to_string(),
            column: col.to_string(),
        });
    }
    Ok(())
}

/// Every column must exist and be accessible.
fn verify_columns(columns: &[Column<'_>]) -> SmqlResult<()> {
    for col in columns {
        if !col.exists_as_column() {
            return Err(unknown_column(col, "column"));
        }
        verify_allowed(col)?;
    }
    Ok(())
}

fn label(columns: &[Column<'_>]) -> String {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    names.join("|")
}

fn array<'v>(value: &'v Value) -> &'v [Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// Join the hops of `col` and, when it names a relation, the relation
/// itself. Returns the path of the reached table.
fn join_relation<'s>(
    asm: &mut Assembler<'s>,
    table: &TablePath,
    col: &Column<'s>,
) -> SmqlResult<TablePath> {
    let reached = asm.join_column(table, col)?;
    match (col.col(), col.relation()) {
        (Some(name), Some(relation)) => {
            let path = reached.child(PathToken::Relation(name.to_string()));
            asm.join(&path, relation)?;
            Ok(path)
        }
        (None, _) => Ok(reached),
        (Some(_), None) => Err(unknown_relation(col, "relation")),
    }
}

/// Build `conditions` at `table` and AND their contributions.
fn build_all<'s>(
    conditions: &[Condition<'s>],
    asm: &mut Assembler<'s>,
    table: &TablePath,
) -> SmqlResult<Predicate> {
    let mut children = Vec::with_capacity(conditions.len());
    for condition in conditions {
        if let Some(p) = condition.build(asm, table)? {
            children.push(p);
        }
    }
    Ok(Predicate::And(children))
}

fn split_order(spec: &str) -> (String, Option<String>) {
    let mut words = spec.split_whitespace();
    let col = words.next().unwrap_or_default().to_string();
    (col, words.next().map(str::to_string))
}

fn sort_order(dir: Option<&str>) -> SortOrder {
    match dir {
        Some(d) if d.eq_ignore_ascii_case("desc") => SortOrder::Desc,
        _ => SortOrder::Asc,
    }
}

fn parse_order<'s>(model: Model<'s>, value: &Value) -> SmqlResult<Vec<(Column<'s>, SortOrder)>> {
    let invalid = |v: &Value| SmqlError::invalid_value("order", format!("cannot order by {}", v));
    let mut entries: Vec<(String, Option<String>)> = Vec::new();
    match value {
        Value::Null => {}
        Value::String(s) => entries.push(split_order(s)),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => entries.push(split_order(s)),
                    Value::Array(pair) => match pair.as_slice() {
                        [Value::String(col)] => entries.push((col.clone(), None)),
                        [Value::String(col), Value::String(dir)] => {
                            entries.push((col.clone(), Some(dir.clone())))
                        }
                        _ => return Err(invalid(item)),
                    },
                    other => return Err(invalid(other)),
                }
            }
        }
        Value::Object(map) => {
            for (col, dir) in map {
                match dir {
                    Value::String(dir) => entries.push((col.clone(), Some(dir.clone()))),
                    Value::Null => entries.push((col.clone(), None)),
                    other => return Err(invalid(other)),
                }
            }
        }
        other => return Err(invalid(other)),
    }

    entries
        .into_iter()
        .map(|(name, dir)| {
            let col = Column::new(model, &name);
            if !col.exists_as_column() {
                return Err(unknown_column(&col, "column"));
            }
            verify_allowed(&col)?;
            Ok((col, sort_order(dir.as_deref())))
        })
        .collect()
}

impl<'s> Condition<'s> {
    /// Instantiate `rule` for `columns` and `value`, validating both.
    pub fn from_rule(
        rule: &'static Rule,
        model: Model<'s>,
        columns: Vec<Column<'s>>,
        value: &Value,
    ) -> SmqlResult<Self> {
        match rule.kind {
            RuleKind::Template { sql, temporal } => {
                verify_columns(&columns)?;
                let name = label(&columns);
                let chronological = temporal && columns.iter().any(Column::is_chronological);
                let items = array(value);
                if items.is_empty() {
                    return Err(SmqlError::invalid_value(name, "empty value list"));
                }
                let values = items
                    .iter()
                    .map(|v| value::bind_for(&name, v, chronological))
                    .collect::<SmqlResult<Vec<_>>>()?;
                Ok(Condition::Template {
                    rule,
                    sql,
                    columns,
                    values,
                })
            }
            RuleKind::Exists(sql) => {
                verify_columns(&columns)?;
                Ok(Condition::Exists { rule, sql, columns })
            }
            RuleKind::Membership(sql) => {
                verify_columns(&columns)?;
                let name = label(&columns);
                if array(value).is_empty() {
                    return Err(SmqlError::invalid_value(name, "empty value list"));
                }
                let values = value::bind_for(&name, value, false)?;
                Ok(Condition::Membership {
                    rule,
                    sql,
                    columns,
                    values,
                })
            }
            RuleKind::Range(sql) => {
                verify_columns(&columns)?;
                let name = label(&columns);
                let chronological = columns.iter().any(Column::is_chronological);
                let items = array(value);
                let (begin, end) = match items {
                    [begin, end] => (
                        value::bind_for(&name, begin, chronological)?,
                        value::bind_for(&name, end, chronological)?,
                    ),
                    _ => return Err(SmqlError::invalid_value(name, "expected [begin, end]")),
                };
                Ok(Condition::Range {
                    rule,
                    sql,
                    columns,
                    bounds: (begin, end),
                })
            }
            RuleKind::Overlap(sql) => {
                verify_columns(&columns)?;
                let name = label(&columns);
                if columns.len() % 2 != 0 {
                    return Err(SmqlError::invalid_value(
                        name,
                        "overlap needs start|end column pairs",
                    ));
                }
                let span = value::time_span(&name, array(value))?;
                Ok(Condition::Overlap {
                    rule,
                    sql,
                    columns,
                    span,
                })
            }
            RuleKind::EqualJoin => {
                let documents = array(value);
                let mut targets = Vec::with_capacity(columns.len());
                for column in columns {
                    let target = column
                        .relation_target()
                        .ok_or_else(|| unknown_relation(&column, "relation"))?;
                    verify_allowed(&column)?;
                    let subqueries = documents
                        .iter()
                        .map(|doc| parser::parse_nested(target, doc))
                        .collect::<SmqlResult<Vec<_>>>()?;
                    targets.push(JoinTarget { column, subqueries });
                }
                Ok(Condition::EqualJoin { targets })
            }
            RuleKind::SubEqualJoin => {
                let [column] = <[Column<'s>; 1]>::try_from(columns).map_err(|columns| {
                    SmqlError::invalid_value(label(&columns), "sub-equal-join takes one relation")
                })?;
                let relation = match (column.path().is_empty(), column.relation()) {
                    (true, Some(relation)) => relation,
                    _ => return Err(unknown_relation(&column, "direct relation")),
                };
                if *relation.kind() == RelationKind::HasManyThrough {
                    return Err(unknown_relation(&column, "direct relation"));
                }
                verify_allowed(&column)?;
                let documents = array(value);
                let target = relation.target();
                let subquery = match documents.first() {
                    Some(doc) => parser::parse_nested(target, doc)?,
                    None => Vec::new(),
                };
                let conditions = match documents.get(1) {
                    Some(doc) => parser::parse_nested(target, doc)?,
                    None => Vec::new(),
                };
                Ok(Condition::SubEqualJoin {
                    column,
                    subquery,
                    conditions,
                })
            }
            RuleKind::Select => {
                let mut targets = Vec::with_capacity(columns.len());
                for column in columns {
                    let nested_doc = value.as_object().filter(|m| !m.is_empty());
                    let nested = if column.exists_as_column() {
                        if nested_doc.is_some() {
                            return Err(SmqlError::invalid_value(
                                column.to_string(),
                                "nested document on a plain column",
                            ));
                        }
                        verify_allowed(&column)?;
                        Vec::new()
                    } else {
                        let target = match column.col() {
                            Some(_) => column.relation().map(|r| r.target()),
                            None => None,
                        }
                        .ok_or_else(|| unknown_column(&column, "column or relation"))?;
                        verify_allowed(&column)?;
                        match nested_doc {
                            Some(_) => parser::parse_nested(target, value)?,
                            None => Vec::new(),
                        }
                    };
                    targets.push(SelectTarget { column, nested });
                }
                Ok(Condition::Select { targets })
            }
            RuleKind::Function => {
                let name = columns.first().map(|c| c.to_string()).unwrap_or_default();
                let function = match find_function(&name, value) {
                    Some(FunctionKind::Order) => Function::Order(parse_order(model, value)?),
                    Some(FunctionKind::Limit) => Function::Limit(value.as_u64().unwrap_or_default()),
                    Some(FunctionKind::Offset) => {
                        Function::Offset(value.as_u64().unwrap_or_default())
                    }
                    None => {
                        return Err(SmqlError::UnrecognizedRule {
                            model: model.name().to_string(),
                            key: format!("{}:", name),
                            value: value.clone(),
                        });
                    }
                };
                Ok(Condition::Function(function))
            }
        }
    }

    /// Name of the grammar rule (or function) this condition came from.
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Template { rule, .. }
            | Condition::Exists { rule, .. }
            | Condition::Membership { rule, .. }
            | Condition::Range { rule, .. }
            | Condition::Overlap { rule, .. } => rule.name,
            Condition::EqualJoin { .. } => "EqualJoin",
            Condition::SubEqualJoin { .. } => "SubEqualJoin",
            Condition::Select { .. } => "Select",
            Condition::Function(f) => f.kind().name(),
        }
    }

    /// Join what this condition needs, bind its parameters and return the
    /// predicate it contributes at `table`.
    pub fn build(
        &self,
        asm: &mut Assembler<'s>,
        table: &TablePath,
    ) -> SmqlResult<Option<Predicate>> {
        tracing::trace!(condition = self.name(), table = %table, "build");
        match self {
            Condition::Template {
                sql,
                columns,
                values,
                ..
            } => {
                let targets = Self::join_columns(asm, table, columns)?;
                let params: Vec<String> = values.iter().map(|v| asm.bind(v.clone())).collect();
                let leaf = |target: &str, param: &str| {
                    Predicate::leaf(
                        render(sql, &[target, Assembler::placeholder(param).as_str()]),
                        vec![param.to_string()],
                    )
                };
                let predicate = if let [target] = targets.as_slice() {
                    Predicate::Or(params.iter().map(|p| leaf(target.as_str(), p.as_str())).collect())
                } else {
                    Predicate::And(
                        params
                            .iter()
                            .map(|p| {
                                Predicate::Or(
                                    targets.iter().map(|t| leaf(t.as_str(), p.as_str())).collect(),
                                )
                            })
                            .collect(),
                    )
                };
                Ok(Some(predicate))
            }
            Condition::Exists { sql, columns, .. } => {
                let targets = Self::join_columns(asm, table, columns)?;
                Ok(Some(Predicate::Or(
                    targets
                        .iter()
                        .map(|t| Predicate::leaf(render(sql, &[t.as_str()]), vec![]))
                        .collect(),
                )))
            }
            Condition::Membership {
                sql,
                columns,
                values,
                ..
            } => {
                let targets = Self::join_columns(asm, table, columns)?;
                let param = asm.bind(values.clone());
                let placeholder = Assembler::placeholder(&param);
                Ok(Some(Predicate::And(
                    targets
                        .iter()
                        .map(|t| {
                            Predicate::leaf(
                                render(sql, &[t.as_str(), placeholder.as_str()]),
                                vec![param.clone()],
                            )
                        })
                        .collect(),
                )))
            }
            Condition::Range {
                sql,
                columns,
                bounds,
                ..
            } => {
                let targets = Self::join_columns(asm, table, columns)?;
                let begin = asm.bind(bounds.0.clone());
                let end = asm.bind(bounds.1.clone());
                let (b, e) = (Assembler::placeholder(&begin), Assembler::placeholder(&end));
                Ok(Some(Predicate::And(
                    targets
                        .iter()
                        .map(|t| {
                            Predicate::leaf(
                                render(sql, &[t.as_str(), b.as_str(), e.as_str()]),
                                vec![begin.clone(), end.clone()],
                            )
                        })
                        .collect(),
                )))
            }
            Condition::Overlap {
                sql,
                columns,
                span,
                ..
            } => {
                let targets = Self::join_columns(asm, table, columns)?;
                let begin = asm.bind(BindValue::Timestamp(span.0));
                let end = asm.bind(BindValue::Timestamp(span.1));
                let (b, e) = (Assembler::placeholder(&begin), Assembler::placeholder(&end));
                Ok(Some(Predicate::Or(
                    targets
                        .chunks(2)
                        .map(|pair| {
                            let (start_col, end_col) = (&pair[0], &pair[pair.len() - 1]);
                            Predicate::leaf(
                                render(sql, &[start_col.as_str(), end_col.as_str(), b.as_str(), e.as_str()]),
                                vec![begin.clone(), end.clone()],
                            )
                        })
                        .collect(),
                )))
            }
            Condition::EqualJoin { targets } => {
                let documents = targets.first().map_or(0, |t| t.subqueries.len());
                // more than two participants swap the connectives
                let (outer, inner) = if 2 < 1 + documents {
                    (Connective::And, Connective::Or)
                } else {
                    (Connective::Or, Connective::And)
                };
                let mut across = Vec::with_capacity(targets.len());
                for target in targets {
                    let path = join_relation(asm, table, &target.column)?;
                    let mut within = Vec::with_capacity(target.subqueries.len());
                    for conditions in &target.subqueries {
                        within.push(build_all(conditions, asm, &path)?);
                    }
                    across.push(inner.node(within));
                }
                Ok(Some(outer.node(across)))
            }
            Condition::SubEqualJoin {
                column,
                subquery,
                conditions,
            } => {
                let relation = column
                    .relation()
                    .ok_or_else(|| unknown_relation(column, "direct relation"))?;
                let path = asm.derived_path(table, relation.name());
                let parent_alias = asm.alias(table);

                let mut sub = asm.nested(relation.target(), &path);
                let base = sub.base_table().clone();
                let filter = build_all(subquery, &mut sub, &base)?;
                sub.push_where(filter);
                sub.correlate(relation, &parent_alias)?;
                asm.absorb(&sub);
                let sql = crate::transpiler::ToSql::to_sql(&sub.finish());
                asm.join_derived(&path, &sql, relation.target());

                Ok(Some(build_all(conditions, asm, &path)?))
            }
            Condition::Select { targets } => {
                let mut children = Vec::new();
                for target in targets {
                    let col = &target.column;
                    if col.exists_as_column() {
                        let path = asm.join_column(table, col)?;
                        let name = col.col().unwrap_or_default();
                        let expr = asm.column(&path, name);
                        asm.select(expr);
                        continue;
                    }
                    col.visit_joins(|relations, _| {
                        asm.include(table.join(relations));
                        Ok(())
                    })?;
                    asm.include(table.join(&col.segments()));
                    if !target.nested.is_empty() {
                        let path = join_relation(asm, table, col)?;
                        children.push(build_all(&target.nested, asm, &path)?);
                    }
                }
                Ok((!children.is_empty()).then_some(Predicate::And(children)))
            }
            Condition::Function(function) => {
                if !table.is_root() {
                    return Err(SmqlError::RootOnlyFunctionMisuse {
                        function: function.kind().name(),
                        path: table.to_string(),
                    });
                }
                match function {
                    Function::Order(entries) => {
                        for (col, dir) in entries {
                            let path = asm.join_column(table, col)?;
                            asm.order(&path, col.col().unwrap_or_default(), *dir);
                        }
                    }
                    Function::Limit(n) => asm.set_limit(*n),
                    Function::Offset(n) => asm.set_offset(*n),
                }
                Ok(None)
            }
        }
    }

    /// Join every column's path and return the qualified column names.
    fn join_columns(
        asm: &mut Assembler<'s>,
        table: &TablePath,
        columns: &[Column<'s>],
    ) -> SmqlResult<Vec<String>> {
        columns
            .iter()
            .map(|col| {
                let path = asm.join_column(table, col)?;
                Ok(asm.column(&path, col.col().unwrap_or_default()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmqlConfig;
    use crate::error::ErrorKind;
    use crate::grammar::RULES;
    use crate::schema::tests::fixture;
    use crate::transpiler::ToSql;
    use serde_json::json;

    fn rule(name: &str) -> &'static Rule {
        RULES.iter().find(|r| r.name == name).unwrap()
    }

    fn cols<'s>(model: Model<'s>, names: &[&str]) -> Vec<Column<'s>> {
        names.iter().map(|n| Column::new(model, n)).collect()
    }

    fn build_one<'s>(model: Model<'s>, condition: &Condition<'s>, config: &'s SmqlConfig) -> String {
        let mut asm = Assembler::new(model, config);
        let base = asm.base_table().clone();
        if let Some(p) = condition.build(&mut asm, &base).unwrap() {
            asm.push_where(p);
        }
        asm.finish().to_sql()
    }

    #[test]
    fn test_single_column_ors_values() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let config = SmqlConfig::default();
        let c = Condition::from_rule(
            rule("Equal"),
            person,
            cols(person, &["givenname"]),
            &json!(["Peter", "Paul"]),
        )
        .unwrap();
        assert_eq!(
            build_one(person, &c, &config),
            "SELECT DISTINCT people.* FROM people WHERE people.givenname = :p1 OR people.givenname = :p2"
        );
    }

    #[test]
    fn test_column_group_ands_values() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let config = SmqlConfig::default();
        let c = Condition::from_rule(
            rule("Equal"),
            person,
            cols(person, &["givenname", "surname"]),
            &json!(["a", "b"]),
        )
        .unwrap();
        assert_eq!(
            build_one(person, &c, &config),
            "SELECT DISTINCT people.* FROM people WHERE \
             (people.givenname = :p1 OR people.surname = :p1) AND \
             (people.givenname = :p2 OR people.surname = :p2)"
        );
    }

    #[test]
    fn test_range_binds_two_params() {
        let schema = fixture();
        let article = schema.model("Article").unwrap();
        let config = SmqlConfig::default();
        let c = Condition::from_rule(rule("NotInRange"), article, cols(article, &["rating"]), &json!([1, 3]))
            .unwrap();
        let mut asm = Assembler::new(article, &config);
        let base = asm.base_table().clone();
        let p = c.build(&mut asm, &base).unwrap().unwrap().normalize();
        assert_eq!(p.to_sql(), "articles.rating NOT BETWEEN :p1 AND :p2");
        assert_eq!(
            asm.bindings(),
            [("p1".to_string(), BindValue::Int(1)), ("p2".to_string(), BindValue::Int(3))]
        );
    }

    #[test]
    fn test_ordering_on_timestamp_parses_value() {
        let schema = fixture();
        let article = schema.model("Article").unwrap();
        let c = Condition::from_rule(
            rule("GreaterThan"),
            article,
            cols(article, &["updated_at"]),
            &json!("2011-05-04"),
        )
        .unwrap();
        match c {
            Condition::Template { values, .. } => {
                assert!(matches!(values[0], BindValue::Timestamp(_)))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_overlap_requires_pairs() {
        let schema = fixture();
        let article = schema.model("Article").unwrap();
        let err = Condition::from_rule(
            rule("Overlaps"),
            article,
            cols(article, &["published_from"]),
            &json!(["2011-01-01", 60]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let config = SmqlConfig::default();
        let c = Condition::from_rule(
            rule("Overlaps"),
            article,
            cols(article, &["published_from", "published_until"]),
            &json!(["2011-01-01", 3600]),
        )
        .unwrap();
        assert_eq!(
            build_one(article, &c, &config),
            "SELECT DISTINCT articles.* FROM articles WHERE \
             (articles.published_from, articles.published_until) OVERLAPS (:p1, :p2)"
        );
    }

    #[test]
    fn test_protected_column_is_rejected() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let err = Condition::from_rule(rule("Equal"), person, cols(person, &["password"]), &json!("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtectedColumnAccess);
    }

    #[test]
    fn test_protected_include_is_rejected_before_nested_document() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let err = Condition::from_rule(
            rule("Select"),
            person,
            cols(person, &["secrets"]),
            &json!({"nope=": 1}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtectedColumnAccess);
    }

    #[test]
    fn test_function_below_root_fails() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let config = SmqlConfig::default();
        let c = Condition::from_rule(rule("Functions"), person, cols(person, &["limit"]), &json!(5))
            .unwrap();
        let mut asm = Assembler::new(person, &config);
        let deeper = asm.base_table().join(&["articles".to_string()]);
        let err = c.build(&mut asm, &deeper).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RootOnlyFunctionMisuse);
    }

    #[test]
    fn test_order_forms() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let order = parse_order(person, &json!(["surname desc", ["givenname", "ASC"]])).unwrap();
        assert_eq!(order[0].1, SortOrder::Desc);
        assert_eq!(order[1].1, SortOrder::Asc);
        assert!(parse_order(person, &json!(null)).unwrap().is_empty());
        assert_eq!(
            parse_order(person, &json!({"nope": "desc"})).unwrap_err().kind(),
            ErrorKind::UnknownColumn
        );
        assert_eq!(
            parse_order(person, &json!("password")).unwrap_err().kind(),
            ErrorKind::ProtectedColumnAccess
        );
    }
}
