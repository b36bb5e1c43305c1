//! Column paths relative to a model.
//!
//! `articles.author.givenname` names the column `givenname` reached over
//! the relations `articles` then `author`. `/` is accepted as separator
//! too, and the segment `self` is dropped so `self` alone addresses the
//! root model.

use crate::error::{SmqlError, SmqlResult};
use crate::schema::{Model, Relation};
use std::cell::OnceCell;

/// Path segment that refers to the current model.
pub const SELF_SEGMENT: &str = "self";

/// A column (or relation) reached from `model` over `path`.
#[derive(Clone)]
pub struct Column<'s> {
    model: Model<'s>,
    path: Vec<String>,
    col: Option<String>,
    terminal: OnceCell<Option<Model<'s>>>,
}

impl<'s> Column<'s> {
    /// Parse `spec` (`a.b/c`) relative to `model`.
    pub fn new(model: Model<'s>, spec: &str) -> Self {
        let mut segments: Vec<String> = spec
            .split(['.', '/'])
            .filter(|s| *s != SELF_SEGMENT)
            .map(str::to_string)
            .collect();
        let col = segments.pop();
        Self {
            model,
            path: segments,
            col,
            terminal: OnceCell::new(),
        }
    }

    pub fn model(&self) -> Model<'s> {
        self.model
    }

    /// Relation names walked before the terminal column.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Terminal column name; `None` addresses the model itself.
    pub fn col(&self) -> Option<&str> {
        self.col.as_deref()
    }

    /// Path and terminal column as one segment list.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = self.path.clone();
        segments.extend(self.col.clone());
        segments
    }

    /// Model at the end of `path`, or `None` if a hop does not exist.
    pub fn terminal(&self) -> Option<Model<'s>> {
        *self.terminal.get_or_init(|| {
            self.path
                .iter()
                .try_fold(self.model, |model, rel| Some(model.relation(rel)?.target()))
        })
    }

    /// The terminal model has exactly this column.
    pub fn exists_as_column(&self) -> bool {
        match (self.terminal(), self.col()) {
            (Some(model), Some(col)) => model.has_column(col),
            _ => false,
        }
    }

    /// The terminal column read as a relation of the terminal model.
    pub fn relation(&self) -> Option<Relation<'s>> {
        self.terminal()?.relation(self.col()?)
    }

    /// Model reached when the terminal is followed as a relation. A path
    /// without a column denotes its terminal model.
    pub fn relation_target(&self) -> Option<Model<'s>> {
        match self.col() {
            Some(_) => self.relation().map(|r| r.target()),
            None => self.terminal(),
        }
    }

    /// Whether the terminal column is chronological.
    pub fn is_chronological(&self) -> bool {
        match (self.terminal(), self.col()) {
            (Some(model), Some(col)) => model.is_chronological(col),
            _ => false,
        }
    }

    /// Protection is inherited: a protected relation anywhere on the path,
    /// or a protected terminal name, denies access.
    pub fn is_protected(&self) -> bool {
        let mut model = self.model;
        for rel in &self.path {
            if model.is_protected(rel) {
                return true;
            }
            match model.relation(rel) {
                Some(r) => model = r.target(),
                None => return false,
            }
        }
        self.col().is_some_and(|col| model.is_protected(col))
    }

    pub fn is_allowed(&self) -> bool {
        !self.is_protected()
    }

    /// Call `visit` for every hop of the path, in order, with the relation
    /// names walked so far (including this hop) and the resolved relation.
    pub fn visit_joins<F>(&self, mut visit: F) -> SmqlResult<()>
    where
        F: FnMut(&[String], Relation<'s>) -> SmqlResult<()>,
    {
        let mut model = self.model;
        for (i, rel) in self.path.iter().enumerate() {
            let relation = model.relation(rel).ok_or_else(|| SmqlError::UnknownRelation {
                expected: "relation",
                model: model.name().to_string(),
                column: self.path[..=i].join("."),
            })?;
            visit(&self.path[..=i], relation)?;
            model = relation.target();
        }
        Ok(())
    }
}

impl PartialEq for Column<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.path == other.path && self.col == other.col
    }
}

impl Eq for Column<'_> {}

impl std::fmt::Display for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let segments = self.segments();
        if segments.is_empty() {
            f.write_str(SELF_SEGMENT)
        } else {
            f.write_str(&segments.join("."))
        }
    }
}

impl std::fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#<Column: {} {}>", self.model, self)
    }
}
