//! Schema definitions the compiler resolves paths against.
//!
//! A [`Schema`] is a set of named models, each mapping to a table with
//! columns, relations to other models and an optional list of protected
//! names. Schemas load from JSON or TOML, or are built in code.
//!
//! # Example
//! ```
//! use smql::schema::Schema;
//!
//! let json = r#"{
//!     "models": {
//!         "Person": {
//!             "table": "people",
//!             "columns": ["id", "givenname", { "name": "born_at", "type": "date" }],
//!             "relations": {
//!                 "articles": { "kind": "has_many", "target": "Article", "foreign_key": "person_id" }
//!             }
//!         },
//!         "Article": { "table": "articles", "columns": ["id", "person_id", "content"] }
//!     }
//! }"#;
//!
//! let schema = Schema::from_json(json).unwrap();
//! let person = schema.model("Person").unwrap();
//! assert!(person.has_column("givenname"));
//! assert!(person.is_chronological("born_at"));
//! assert_eq!(person.relation("articles").unwrap().target().table_name(), "articles");
//! ```

use crate::error::{SmqlError, SmqlResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column types that make string operands parse as timestamps.
const CHRONOLOGICAL_TYPES: &[&str] = &["timestamp", "timestamptz", "datetime", "date", "time"];

/// Database schema definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub models: BTreeMap<String, ModelDef>,
}

/// One model: a table, its columns and its relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDef>,
    /// Column and relation names hidden from queries.
    #[serde(default)]
    pub protected: Vec<String>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Column definition with optional type information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColumnEntry")]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub typ: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnEntry {
    Name(String),
    Full {
        name: String,
        #[serde(rename = "type", alias = "typ", default)]
        typ: String,
    },
}

impl From<ColumnEntry> for ColumnDef {
    fn from(entry: ColumnEntry) -> Self {
        match entry {
            ColumnEntry::Name(name) => ColumnDef {
                name,
                typ: String::new(),
            },
            ColumnEntry::Full { name, typ } => ColumnDef { name, typ },
        }
    }
}

/// How two models are related.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationKind {
    /// one-to-many, foreign key on the target
    HasMany,
    /// many-to-one, foreign key on the owner
    BelongsTo,
    /// many-to-many over a join table
    HasAndBelongsToMany,
    /// two hops: `through` on the owner, then `source` on its target
    HasManyThrough,
    Unknown(String),
}

impl From<String> for RelationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "has_many" | "one_to_many" => RelationKind::HasMany,
            "belongs_to" | "has_one" | "many_to_one" => RelationKind::BelongsTo,
            "has_and_belongs_to_many" | "many_to_many" => RelationKind::HasAndBelongsToMany,
            "has_many_through" | "through" => RelationKind::HasManyThrough,
            _ => RelationKind::Unknown(s),
        }
    }
}

impl From<RelationKind> for String {
    fn from(kind: RelationKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::HasMany => write!(f, "has_many"),
            RelationKind::BelongsTo => write!(f, "belongs_to"),
            RelationKind::HasAndBelongsToMany => write!(f, "has_and_belongs_to_many"),
            RelationKind::HasManyThrough => write!(f, "has_many_through"),
            RelationKind::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Relation metadata ("reflection").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub kind: RelationKind,
    /// Target model name. Derived from `source` for through relations.
    #[serde(default)]
    pub target: Option<String>,
    /// `has_many`: column on the target; `belongs_to`: column on the owner
    /// (defaults to `<relation>_id`); habtm: join table column pointing at
    /// the owner.
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub join_table: Option<String>,
    /// habtm: join table column pointing at the target.
    #[serde(default)]
    pub association_foreign_key: Option<String>,
    #[serde(default)]
    pub through: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RelationDef {
    fn with_kind(kind: RelationKind) -> Self {
        Self {
            kind,
            target: None,
            foreign_key: None,
            join_table: None,
            association_foreign_key: None,
            through: None,
            source: None,
        }
    }

    pub fn has_many(target: &str, foreign_key: &str) -> Self {
        Self {
            target: Some(target.to_string()),
            foreign_key: Some(foreign_key.to_string()),
            ..Self::with_kind(RelationKind::HasMany)
        }
    }

    pub fn belongs_to(target: &str, foreign_key: &str) -> Self {
        Self {
            target: Some(target.to_string()),
            foreign_key: Some(foreign_key.to_string()),
            ..Self::with_kind(RelationKind::BelongsTo)
        }
    }

    pub fn has_and_belongs_to_many(
        target: &str,
        join_table: &str,
        foreign_key: &str,
        association_foreign_key: &str,
    ) -> Self {
        Self {
            target: Some(target.to_string()),
            join_table: Some(join_table.to_string()),
            foreign_key: Some(foreign_key.to_string()),
            association_foreign_key: Some(association_foreign_key.to_string()),
            ..Self::with_kind(RelationKind::HasAndBelongsToMany)
        }
    }

    pub fn through(through: &str, source: &str) -> Self {
        Self {
            through: Some(through.to_string()),
            source: Some(source.to_string()),
            ..Self::with_kind(RelationKind::HasManyThrough)
        }
    }
}

impl ModelDef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            primary_key: default_primary_key(),
            columns: Vec::new(),
            relations: BTreeMap::new(),
            protected: Vec::new(),
        }
    }

    pub fn column(self, name: &str) -> Self {
        self.typed_column(name, "")
    }

    pub fn typed_column(mut self, name: &str, typ: &str) -> Self {
        self.columns.push(ColumnDef {
            name: name.to_string(),
            typ: typ.to_string(),
        });
        self
    }

    pub fn relation(mut self, name: &str, def: RelationDef) -> Self {
        self.relations.insert(name.to_string(), def);
        self
    }

    pub fn protect(mut self, name: &str) -> Self {
        self.protected.push(name.to_string());
        self
    }
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model to the schema.
    pub fn add_model(&mut self, name: &str, def: ModelDef) {
        self.models.insert(name.to_string(), def);
    }

    /// Builder-style [`Schema::add_model`].
    pub fn with_model(mut self, name: &str, def: ModelDef) -> Self {
        self.add_model(name, def);
        self
    }

    /// Load schema from a JSON string and validate it.
    pub fn from_json(json: &str) -> SmqlResult<Self> {
        let schema: Schema =
            serde_json::from_str(json).map_err(|e| SmqlError::Schema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load schema from a TOML string and validate it.
    pub fn from_toml(input: &str) -> SmqlResult<Self> {
        let schema: Schema = toml::from_str(input).map_err(|e| SmqlError::Schema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema file, choosing the format by extension.
    pub fn load(path: impl AsRef<std::path::Path>) -> SmqlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let schema = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_json(&content)?,
        };
        tracing::info!("Loaded {} models from {}", schema.models.len(), path.display());
        Ok(schema)
    }

    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Option<Model<'_>> {
        self.models
            .get_key_value(name)
            .map(|(name, def)| Model {
                schema: self,
                name,
                def,
            })
    }

    /// Check that every relation points at existing models and carries
    /// the keys its kind needs.
    pub fn validate(&self) -> SmqlResult<()> {
        for (model_name, model) in &self.models {
            for (rel_name, rel) in &model.relations {
                let missing = |what: &str| {
                    SmqlError::Schema(format!("{}.{}: missing {}", model_name, rel_name, what))
                };
                if rel.kind == RelationKind::HasManyThrough {
                    let through = rel.through.as_deref().ok_or_else(|| missing("through"))?;
                    let source = rel.source.as_deref().ok_or_else(|| missing("source"))?;
                    let hop = model.relations.get(through).ok_or_else(|| {
                        missing(&format!("relation '{}' named by through", through))
                    })?;
                    if hop.kind == RelationKind::HasManyThrough {
                        return Err(SmqlError::Schema(format!(
                            "{}.{}: nested through relations are not supported",
                            model_name, rel_name
                        )));
                    }
                    let hop_target = hop
                        .target
                        .as_deref()
                        .and_then(|t| self.models.get(t))
                        .ok_or_else(|| missing(&format!("target of '{}'", through)))?;
                    if !hop_target.relations.contains_key(source) {
                        return Err(missing(&format!("source relation '{}'", source)));
                    }
                    continue;
                }

                let target = rel.target.as_deref().ok_or_else(|| missing("target"))?;
                if !self.models.contains_key(target) {
                    return Err(SmqlError::Schema(format!(
                        "{}.{}: unknown target model '{}'",
                        model_name, rel_name, target
                    )));
                }
                match rel.kind {
                    RelationKind::HasMany if rel.foreign_key.is_none() => {
                        return Err(missing("foreign_key"));
                    }
                    RelationKind::HasAndBelongsToMany => {
                        rel.join_table.as_ref().ok_or_else(|| missing("join_table"))?;
                        rel.foreign_key.as_ref().ok_or_else(|| missing("foreign_key"))?;
                        rel.association_foreign_key
                            .as_ref()
                            .ok_or_else(|| missing("association_foreign_key"))?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Handle on one model of a [`Schema`].
#[derive(Clone, Copy)]
pub struct Model<'s> {
    schema: &'s Schema,
    name: &'s str,
    def: &'s ModelDef,
}

impl<'s> Model<'s> {
    pub fn name(&self) -> &'s str {
        self.name
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn table_name(&self) -> &'s str {
        &self.def.table
    }

    pub fn primary_key(&self) -> &'s str {
        &self.def.primary_key
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'s str> + use<'s> {
        self.def.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.def.columns.iter().any(|c| c.name == name)
    }

    /// Whether string operands against this column are timestamps.
    pub fn is_chronological(&self, name: &str) -> bool {
        self.def
            .columns
            .iter()
            .find(|c| c.name == name)
            .is_some_and(|c| {
                CHRONOLOGICAL_TYPES
                    .iter()
                    .any(|t| c.typ.eq_ignore_ascii_case(t))
            })
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.def.protected.iter().any(|p| p == name)
    }

    /// Resolve a relation and its target model.
    pub fn relation(&self, name: &str) -> Option<Relation<'s>> {
        let (name, def) = self.def.relations.get_key_value(name)?;
        let target = match def.kind {
            RelationKind::HasManyThrough => {
                let hop = self.relation(def.through.as_deref()?)?;
                hop.target.relation(def.source.as_deref()?)?.target
            }
            _ => self.schema.model(def.target.as_deref()?)?,
        };
        Some(Relation {
            name,
            owner: *self,
            def,
            target,
        })
    }
}

impl PartialEq for Model<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.name == other.name
    }
}

impl Eq for Model<'_> {}

impl std::fmt::Debug for Model<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Model({})", self.name)
    }
}

impl std::fmt::Display for Model<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A resolved relation of a model.
#[derive(Debug, Clone, Copy)]
pub struct Relation<'s> {
    name: &'s str,
    owner: Model<'s>,
    def: &'s RelationDef,
    target: Model<'s>,
}

impl<'s> Relation<'s> {
    pub fn name(&self) -> &'s str {
        self.name
    }

    pub fn owner(&self) -> Model<'s> {
        self.owner
    }

    pub fn target(&self) -> Model<'s> {
        self.target
    }

    pub fn kind(&self) -> &'s RelationKind {
        &self.def.kind
    }

    pub fn def(&self) -> &'s RelationDef {
        self.def
    }

    /// Foreign key column, defaulting to `<relation>_id` for `belongs_to`.
    pub fn foreign_key(&self) -> String {
        match (&self.def.foreign_key, &self.def.kind) {
            (Some(fk), _) => fk.clone(),
            (None, RelationKind::BelongsTo) => format!("{}_id", self.name),
            (None, _) => format!("{}_id", self.owner.table_name()),
        }
    }

    /// The two hops of a through relation.
    pub fn through_hops(&self) -> Option<(Relation<'s>, Relation<'s>)> {
        if self.def.kind != RelationKind::HasManyThrough {
            return None;
        }
        let first = self.owner.relation(self.def.through.as_deref()?)?;
        let second = first.target.relation(self.def.source.as_deref()?)?;
        Some((first, second))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// People with articles, groups over memberships, tags over a join table.
    pub(crate) fn fixture() -> Schema {
        Schema::new()
            .with_model(
                "Person",
                ModelDef::new("people")
                    .column("id")
                    .column("givenname")
                    .column("surname")
                    .column("nick")
                    .column("password")
                    .typed_column("born_at", "date")
                    .typed_column("updated_at", "timestamp")
                    .relation("articles", RelationDef::has_many("Article", "person_id"))
                    .relation("memberships", RelationDef::has_many("Membership", "person_id"))
                    .relation("groups", RelationDef::through("memberships", "group"))
                    .relation("secrets", RelationDef::has_many("Secret", "person_id"))
                    .protect("password")
                    .protect("secrets"),
            )
            .with_model(
                "Article",
                ModelDef::new("articles")
                    .column("id")
                    .column("person_id")
                    .column("title")
                    .column("content")
                    .column("rating")
                    .typed_column("published_from", "timestamp")
                    .typed_column("published_until", "timestamp")
                    .typed_column("updated_at", "timestamp")
                    .relation("author", RelationDef::belongs_to("Person", "person_id"))
                    .relation(
                        "tags",
                        RelationDef::has_and_belongs_to_many(
                            "Tag",
                            "articles_tags",
                            "article_id",
                            "tag_id",
                        ),
                    )
                    .relation(
                        "reviews",
                        RelationDef {
                            kind: RelationKind::Unknown("polymorphic".to_string()),
                            target: Some("Tag".to_string()),
                            ..RelationDef::has_many("Tag", "article_id")
                        },
                    ),
            )
            .with_model(
                "Membership",
                ModelDef::new("memberships")
                    .column("id")
                    .column("person_id")
                    .column("group_id")
                    .relation("group", RelationDef::belongs_to("Group", "group_id")),
            )
            .with_model("Group", ModelDef::new("groups").column("id").column("name"))
            .with_model("Tag", ModelDef::new("tags").column("id").column("name"))
            .with_model(
                "Secret",
                ModelDef::new("secrets").column("id").column("person_id").column("value"),
            )
    }

    #[test]
    fn test_fixture_validates() {
        fixture().validate().unwrap();
    }

    #[test]
    fn test_through_relation_resolves_target() {
        let schema = fixture();
        let person = schema.model("Person").unwrap();
        let groups = person.relation("groups").unwrap();
        assert_eq!(groups.target().name(), "Group");
        let (first, second) = groups.through_hops().unwrap();
        assert_eq!(first.name(), "memberships");
        assert_eq!(second.name(), "group");
    }

    #[test]
    fn test_belongs_to_default_foreign_key() {
        let schema = Schema::new()
            .with_model(
                "Article",
                ModelDef::new("articles").relation(
                    "author",
                    RelationDef {
                        foreign_key: None,
                        ..RelationDef::belongs_to("Person", "unused")
                    },
                ),
            )
            .with_model("Person", ModelDef::new("people"));
        let rel = schema.model("Article").unwrap().relation("author").unwrap();
        assert_eq!(rel.foreign_key(), "author_id");
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let json = r#"{"models": {
            "A": {"table": "a", "relations": {"b": {"kind": "polymorphic", "target": "B"}}},
            "B": {"table": "b"}
        }}"#;
        let schema = Schema::from_json(json).unwrap();
        let rel = schema.model("A").unwrap().relation("b").unwrap();
        assert_eq!(rel.kind(), &RelationKind::Unknown("polymorphic".to_string()));
    }

    #[test]
    fn test_validate_reports_missing_target() {
        let json = r#"{"models": {
            "A": {"table": "a", "relations": {"b": {"kind": "has_many", "target": "Nope", "foreign_key": "a_id"}}}
        }}"#;
        let err = Schema::from_json(json).unwrap_err();
        assert!(err.to_string().contains("unknown target model 'Nope'"));
    }

    #[test]
    fn test_toml_schema() {
        let schema = Schema::from_toml(
            r#"
            [models.Person]
            table = "people"
            columns = ["id", { name = "updated_at", type = "timestamp" }]
            protected = ["id"]
            "#,
        )
        .unwrap();
        let person = schema.model("Person").unwrap();
        assert_eq!(person.primary_key(), "id");
        assert!(person.is_chronological("updated_at"));
        assert!(person.is_protected("id"));
    }
}
