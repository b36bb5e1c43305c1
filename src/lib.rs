//! # SMQL: compact JSON queries compiled to parameterized SQL
//!
//! SMQL documents are JSON objects whose keys are column paths with an
//! operator suffix. They compile against a [`Schema`](schema::Schema)
//! into a [`Plan`](plan::Plan): select list, joins, a normalized WHERE
//! tree with named parameters, ordering, paging and eager includes.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use smql::prelude::*;
//! use serde_json::json;
//!
//! let schema = Schema::load("schema.json")?;
//! let plan = smql::compile(&schema, "Person", &json!({"givenname=": "Peter"}), &SmqlConfig::default())?;
//! assert_eq!(plan.to_sql(), "SELECT DISTINCT people.* FROM people WHERE people.givenname = :p1");
//! ```
//!
//! ## Operators
//!
//! | Operator    | Meaning                         |
//! |-------------|---------------------------------|
//! | `=`, empty  | equals (any of, for arrays)     |
//! | `!=`, `<>`  | not equal                       |
//! | `>` `>=` `<` `<=` | ordering                  |
//! | `..`, `!..` | inside / outside a range        |
//! | `<=>`, `!<=>` | interval overlap              |
//! | `\|=`, `!\|=` | membership                    |
//! | `~`, `!~`   | case-insensitive pattern        |
//! | `=>`        | related rows match sub-queries  |
//! | `()`        | correlated sub-query join       |
//! | `:`         | `order`, `limit`, `offset`      |

pub mod assembler;
pub mod column;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod parser;
pub mod plan;
pub mod predicate;
pub mod schema;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::config::SmqlConfig;
    pub use crate::engine::SmqlDb;
    pub use crate::error::*;
    pub use crate::plan::Plan;
    pub use crate::schema::{ModelDef, RelationDef, Schema};
    pub use crate::transpiler::ToSql;
    pub use crate::value::BindValue;
    pub use crate::{compile, compile_str};
}

use crate::assembler::Assembler;
use crate::condition::Condition;
use crate::config::SmqlConfig;
use crate::error::{SmqlError, SmqlResult};
use crate::plan::Plan;
use crate::schema::{Model, Schema};
use crate::transpiler::ToSql;
use serde_json::Value;
use std::time::Instant;

fn root_model<'s>(schema: &'s Schema, model: &str) -> SmqlResult<Model<'s>> {
    schema
        .model(model)
        .ok_or_else(|| SmqlError::Schema(format!("unknown model '{}'", model)))
}

/// Parse a query document into conditions without building them.
pub fn parse<'s>(schema: &'s Schema, model: &str, query: &Value) -> SmqlResult<Vec<Condition<'s>>> {
    parser::parse_query(root_model(schema, model)?, query)
}

/// Compile `query` against `model` of `schema`.
///
/// # Example
///
/// ```
/// use smql::prelude::*;
/// use serde_json::json;
///
/// let schema = Schema::new().with_model(
///     "Person",
///     ModelDef::new("people").column("id").column("givenname"),
/// );
/// let plan = smql::compile(&schema, "Person", &json!({"givenname=": "Peter"}), &SmqlConfig::default()).unwrap();
/// assert_eq!(plan.where_clause.as_deref(), Some("people.givenname = :p1"));
/// assert_eq!(plan.binding("p1"), Some(&BindValue::from("Peter")));
/// ```
pub fn compile(schema: &Schema, model: &str, query: &Value, config: &SmqlConfig) -> SmqlResult<Plan> {
    let span = tracing::debug_span!("smql_compile", model);
    let _guard = span.enter();

    let root = root_model(schema, model)?;

    let started = Instant::now();
    let conditions = parser::parse_query(root, query)?;
    tracing::debug!(conditions = conditions.len(), elapsed = ?started.elapsed(), "parsed");

    let started = Instant::now();
    let mut asm = Assembler::new(root, config);
    let base = asm.base_table().clone();
    for condition in &conditions {
        if let Some(predicate) = condition.build(&mut asm, &base)? {
            asm.push_where(predicate);
        }
    }
    tracing::debug!(joins = asm.joins().len(), elapsed = ?started.elapsed(), "built");

    let started = Instant::now();
    let plan = asm.finish();
    tracing::debug!(elapsed = ?started.elapsed(), "assembled");

    if config.log_plans {
        tracing::debug!(sql = %plan.to_sql(), bindings = ?plan.bindings, "plan");
    }
    Ok(plan)
}

/// [`compile`] a query given as JSON text.
pub fn compile_str(schema: &Schema, model: &str, query: &str, config: &SmqlConfig) -> SmqlResult<Plan> {
    let query: Value = serde_json::from_str(query)?;
    compile(schema, model, &query, config)
}
