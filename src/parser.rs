//! SMQL key parser using nom, and the condition dispatcher.
//!
//! # Key syntax
//!
//! ```text
//! 1:articles.title|articles.content~
//! ┬─ ───────────────┬────────────── ┬
//! │                 │               └── Operator (trailing non-word run)
//! │                 └── Column paths, `|`-separated alternatives
//! └── Optional ordering prefix
//! ```

use nom::{
    IResult,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit0},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{pair, terminated},
};
use serde_json::{Map, Value};

use crate::column::Column;
use crate::condition::Condition;
use crate::error::{SmqlError, SmqlResult};
use crate::grammar::{RULES, RuleKind, find_function};
use crate::schema::Model;

/// A query key split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'k> {
    /// Ordering prefix without the colon, if present.
    pub ordinal: Option<&'k str>,
    /// Column path alternatives.
    pub columns: Vec<&'k str>,
    pub operator: &'k str,
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse the `<digits>:` ordering prefix.
fn parse_ordinal(input: &str) -> IResult<&str, &str> {
    terminated(digit0, char(':'))(input)
}

/// Parse the longest run ending in a word character.
fn parse_columns(input: &str) -> IResult<&str, &str> {
    recognize(many0(pair(
        take_while(|c: char| !is_word(c)),
        take_while1(is_word),
    )))(input)
}

/// Split `key` into ordering prefix, column alternatives and operator.
/// Returns `None` when no column path can be found.
pub fn split_key(key: &str) -> Option<ParsedKey<'_>> {
    let (rest, ordinal) = opt(parse_ordinal)(key).ok()?;
    let (operator, mut path) = parse_columns(rest).ok()?;
    let mut operator = operator;
    // a bracketed suffix belongs to the path
    if operator.ends_with(']') {
        path = rest;
        operator = "";
    }
    if path.is_empty() {
        return None;
    }
    Some(ParsedKey {
        ordinal,
        columns: path.split('|').collect(),
        operator,
    })
}

/// Parse one `key => value` entry into a condition.
pub fn parse_entry<'s>(model: Model<'s>, key: &str, value: &Value) -> SmqlResult<Condition<'s>> {
    let parsed = split_key(key).ok_or_else(|| SmqlError::MalformedOperator {
        model: model.name().to_string(),
        key: key.to_string(),
        value: value.clone(),
    })?;

    for rule in RULES {
        if !rule.accepts(parsed.operator, value) {
            continue;
        }
        if rule.kind == RuleKind::Function {
            let name = parsed.columns.first().copied().unwrap_or_default();
            if find_function(name, value).is_none() {
                continue;
            }
        }
        tracing::trace!(key, rule = rule.name, "matched");
        let columns = parsed
            .columns
            .iter()
            .map(|spec| Column::new(model, spec))
            .collect();
        return Condition::from_rule(rule, model, columns, value);
    }

    Err(SmqlError::UnrecognizedRule {
        model: model.name().to_string(),
        key: key.to_string(),
        value: value.clone(),
    })
}

/// Parse every entry of a query document, in document order.
pub fn parse_map<'s>(model: Model<'s>, query: &Map<String, Value>) -> SmqlResult<Vec<Condition<'s>>> {
    query
        .iter()
        .map(|(key, value)| parse_entry(model, key, value))
        .collect()
}

/// Parse a query document against `model`.
pub fn parse_query<'s>(model: Model<'s>, query: &Value) -> SmqlResult<Vec<Condition<'s>>> {
    match query {
        Value::Object(map) => parse_map(model, map),
        Value::Null => Ok(Vec::new()),
        other => Err(SmqlError::invalid_value(
            model.name(),
            format!("query must be an object, got {}", other),
        )),
    }
}

/// Parse a sub-document, wrapping any failure with the sub-document and
/// the model it was compiled against.
pub fn parse_nested<'s>(model: Model<'s>, query: &Value) -> SmqlResult<Vec<Condition<'s>>> {
    parse_query(model, query).map_err(|e| SmqlError::nested(query.clone(), model.name(), e))
}
