//! Error types for SMQL.

use serde_json::{Value, json};
use thiserror::Error;

/// Classification of a [`SmqlError`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedOperator,
    UnrecognizedRule,
    UnknownColumn,
    UnknownRelation,
    ProtectedColumnAccess,
    RootOnlyFunctionMisuse,
    UnknownSchemaRelationKind,
    NestedQueryFailure,
    InvalidValue,
    Schema,
    Config,
    Connection,
    Execution,
    Io,
    Json,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// The main error type for SMQL operations.
#[derive(Debug, Error)]
pub enum SmqlError {
    /// The key could not be split into a column path and an operator.
    #[error("Malformed operator in '{key}' on {model}")]
    MalformedOperator {
        model: String,
        key: String,
        value: Value,
    },

    /// No grammar rule accepted the operator/value combination.
    #[error("Unrecognized operator/value combination: {key} => {value} on {model}")]
    UnrecognizedRule {
        model: String,
        key: String,
        value: Value,
    },

    /// The path does not end in an existing column.
    #[error("Unknown column '{column}' on {model} (expected {expected})")]
    UnknownColumn {
        expected: &'static str,
        model: String,
        column: String,
    },

    /// The path does not end in an existing relation.
    #[error("Unknown relation '{column}' on {model} (expected {expected})")]
    UnknownRelation {
        expected: &'static str,
        model: String,
        column: String,
    },

    /// A column or relation along the path is protected.
    #[error("Access to protected column '{column}' on {model}")]
    ProtectedColumnAccess { model: String, column: String },

    /// `limit`, `offset` or `order` used below the root query.
    #[error("Function '{function}' is only allowed on the root query (table path {path})")]
    RootOnlyFunctionMisuse {
        function: &'static str,
        path: String,
    },

    /// The schema declared a relation kind the join builder does not know.
    #[error("Unknown reflection '{kind}' for {model}.{relation}")]
    UnknownSchemaRelationKind {
        model: String,
        relation: String,
        kind: String,
    },

    /// Compiling a nested sub-document failed.
    #[error("Nested query on {model} failed: {source}")]
    NestedQueryFailure {
        query: Value,
        model: String,
        #[source]
        source: Box<SmqlError>,
    },

    /// A value could not be converted for the column it targets.
    #[error("Invalid value for '{column}': {message}")]
    InvalidValue { column: String, message: String },

    /// Schema document is inconsistent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SmqlError {
    /// Wrap an error raised while compiling `query` against `model`.
    pub fn nested(query: Value, model: impl Into<String>, source: SmqlError) -> Self {
        Self::NestedQueryFailure {
            query,
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedOperator { .. } => ErrorKind::MalformedOperator,
            Self::UnrecognizedRule { .. } => ErrorKind::UnrecognizedRule,
            Self::UnknownColumn { .. } => ErrorKind::UnknownColumn,
            Self::UnknownRelation { .. } => ErrorKind::UnknownRelation,
            Self::ProtectedColumnAccess { .. } => ErrorKind::ProtectedColumnAccess,
            Self::RootOnlyFunctionMisuse { .. } => ErrorKind::RootOnlyFunctionMisuse,
            Self::UnknownSchemaRelationKind { .. } => ErrorKind::UnknownSchemaRelationKind,
            Self::NestedQueryFailure { .. } => ErrorKind::NestedQueryFailure,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Config(_) => ErrorKind::Config,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
        }
    }

    /// Structured payload of the error, suitable for returning to a client.
    pub fn data(&self) -> Value {
        match self {
            Self::MalformedOperator { model, key, value }
            | Self::UnrecognizedRule { model, key, value } => {
                json!({ "got": { key.as_str(): value }, "model": model })
            }
            Self::UnknownColumn {
                expected,
                model,
                column,
            }
            | Self::UnknownRelation {
                expected,
                model,
                column,
            } => json!({ "expected": expected, "got": column, "model": model }),
            Self::ProtectedColumnAccess { model, column } => {
                json!({ "protected_column": column, "model": model })
            }
            Self::RootOnlyFunctionMisuse { function, path } => {
                json!({ "function": function, "path": path })
            }
            Self::UnknownSchemaRelationKind {
                model,
                relation,
                kind,
            } => json!({ "model": model, "relation": relation, "kind": kind }),
            Self::NestedQueryFailure {
                query,
                model,
                source,
            } => json!({
                "query": query,
                "model": model,
                "exception": {
                    "kind": source.kind().to_string(),
                    "message": source.to_string(),
                    "data": source.data(),
                },
            }),
            Self::InvalidValue { column, message } => {
                json!({ "column": column, "message": message })
            }
            other => json!({ "message": other.to_string() }),
        }
    }

    /// The innermost error, looking through nested query wrappers.
    pub fn root_cause(&self) -> &SmqlError {
        match self {
            Self::NestedQueryFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for SMQL operations.
pub type SmqlResult<T> = Result<T, SmqlError>;
