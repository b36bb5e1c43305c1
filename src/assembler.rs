//! Query assembler: table aliases, joins, parameters and result shaping.
//!
//! Every table reachable in a compile is identified by a [`TablePath`],
//! the sequence of tokens leading to it from the base table. Paths are
//! interned into an alias table so each path gets one deterministic,
//! length-bounded SQL alias, and each path is joined at most once.

use crate::config::SmqlConfig;
use crate::error::{SmqlError, SmqlResult};
use crate::plan::{IncludeTree, Plan};
use crate::predicate::Predicate;
use crate::schema::{Model, Relation, RelationKind};
use crate::transpiler::ToSql;
use crate::value::BindValue;
use std::collections::{HashMap, HashSet};

/// One step of a table path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathToken {
    /// Base table of a (sub-)query.
    Base(String),
    Relation(String),
    /// Anonymous join table of a many-to-many relation.
    JoinTable(String),
    /// Derived table of a sub-equal-join.
    Sub(String),
}

impl PathToken {
    fn alias_part(&self) -> String {
        match self {
            PathToken::Base(name) => format!("base_{}", name),
            PathToken::Relation(name) => name.clone(),
            PathToken::JoinTable(name) => format!("jt_{}", name),
            PathToken::Sub(name) => format!("sub_{}", name),
        }
    }
}

impl std::fmt::Display for PathToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathToken::Base(name) | PathToken::Relation(name) => f.write_str(name),
            PathToken::JoinTable(name) => write!(f, "<jt:{}>", name),
            PathToken::Sub(name) => write!(f, "<sub:{}>", name),
        }
    }
}

/// Canonical key of a table within one compile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TablePath(Vec<PathToken>);

impl TablePath {
    pub fn root(table: &str) -> Self {
        TablePath(vec![PathToken::Base(table.to_string())])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Only the base table; `limit`, `offset` and `order` require this.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.0
    }

    pub fn parent(&self) -> Option<TablePath> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(TablePath(self.0[..n - 1].to_vec())),
        }
    }

    pub fn child(&self, token: PathToken) -> TablePath {
        let mut tokens = self.0.clone();
        tokens.push(token);
        TablePath(tokens)
    }

    /// Extend by relation names.
    pub fn join(&self, relations: &[String]) -> TablePath {
        let mut tokens = self.0.clone();
        tokens.extend(relations.iter().cloned().map(PathToken::Relation));
        TablePath(tokens)
    }

    /// Relation names after the base, as used for eager includes.
    pub fn relation_names(&self) -> Vec<String> {
        self.0
            .iter()
            .skip(1)
            .filter_map(|t| match t {
                PathToken::Relation(name) | PathToken::Sub(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl std::fmt::Display for TablePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Sort direction of an `order:` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Mutable state of one compile.
pub struct Assembler<'a> {
    config: &'a SmqlConfig,
    model: Model<'a>,
    base: TablePath,
    base_alias: String,
    aliases: HashMap<TablePath, String>,
    used_aliases: HashSet<String>,
    table_model: HashMap<TablePath, Model<'a>>,
    joined: HashSet<TablePath>,
    vid: usize,
    select: Vec<String>,
    joins: Vec<String>,
    predicate: Predicate,
    bindings: Vec<(String, BindValue)>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    includes: Vec<TablePath>,
}

impl<'a> Assembler<'a> {
    /// Assembler for a root query; the base table is its own alias.
    pub fn new(model: Model<'a>, config: &'a SmqlConfig) -> Self {
        let table = model.table_name().to_string();
        Self::with_base_alias(model, config, table, HashSet::new(), 0)
    }

    fn with_base_alias(
        model: Model<'a>,
        config: &'a SmqlConfig,
        base_alias: String,
        mut used_aliases: HashSet<String>,
        vid: usize,
    ) -> Self {
        let base = TablePath::root(model.table_name());
        let mut aliases = HashMap::new();
        aliases.insert(base.clone(), base_alias.clone());
        used_aliases.insert(base_alias.clone());
        let mut table_model = HashMap::new();
        table_model.insert(base.clone(), model);
        let mut joined = HashSet::new();
        joined.insert(base.clone());

        let mut asm = Self {
            config,
            model,
            base,
            base_alias,
            aliases,
            used_aliases,
            table_model,
            joined,
            vid,
            select: Vec::new(),
            joins: Vec::new(),
            predicate: Predicate::default(),
            bindings: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            includes: Vec::new(),
        };
        let all = format!("DISTINCT {}.*", asm.quote(&asm.base_alias));
        asm.select.push(all);
        asm
    }

    /// Assembler for a sub-query over `model`, embedded at `at`. Parameter
    /// ids continue from this assembler and aliases stay unique across
    /// both; hand the sub-assembler back through [`Assembler::absorb`].
    pub fn nested(&mut self, model: Model<'a>, at: &TablePath) -> Assembler<'a> {
        let base_alias = self.alias(&at.child(PathToken::Base(model.table_name().to_string())));
        Self::with_base_alias(
            model,
            self.config,
            base_alias,
            self.used_aliases.clone(),
            self.vid,
        )
    }

    /// Take over parameter state of a sub-assembler created by
    /// [`Assembler::nested`].
    pub fn absorb(&mut self, sub: &Assembler<'a>) {
        self.vid = self.vid.max(sub.vid);
        self.bindings.extend(sub.bindings.iter().cloned());
        self.used_aliases.extend(sub.used_aliases.iter().cloned());
    }

    pub fn config(&self) -> &'a SmqlConfig {
        self.config
    }

    pub fn model(&self) -> Model<'a> {
        self.model
    }

    pub fn base_table(&self) -> &TablePath {
        &self.base
    }

    pub fn base_alias(&self) -> &str {
        &self.base_alias
    }

    pub fn model_at(&self, path: &TablePath) -> Option<Model<'a>> {
        self.table_model.get(path).copied()
    }

    pub fn is_joined(&self, path: &TablePath) -> bool {
        self.joined.contains(path)
    }

    /// Next parameter name (`p1`, `p2`, ...).
    pub fn vid(&mut self) -> String {
        self.vid += 1;
        format!("{}{}", self.config.param_prefix, self.vid)
    }

    /// Allocate a parameter for `value` and return its name.
    pub fn bind(&mut self, value: BindValue) -> String {
        let name = self.vid();
        self.bindings.push((name.clone(), value));
        name
    }

    pub fn placeholder(name: &str) -> String {
        format!(":{}", name)
    }

    pub fn quote(&self, ident: &str) -> String {
        if self.config.quote_identifiers {
            format!("\"{}\"", ident.replace('"', "\"\""))
        } else {
            ident.to_string()
        }
    }

    /// Alias of `path`, allocating it on first use.
    pub fn alias(&mut self, path: &TablePath) -> String {
        if let Some(alias) = self.aliases.get(path) {
            return alias.clone();
        }
        let parts: Vec<String> = path.0.iter().skip(1).map(PathToken::alias_part).collect();
        let alias = self.unique_alias(format!("{}_{}", self.config.alias_prefix, parts.join("_")));
        self.aliases.insert(path.clone(), alias.clone());
        alias
    }

    /// Bound `wanted` to the identifier length limit and make it unique,
    /// appending `_<n>` when truncated or already taken.
    fn unique_alias(&mut self, wanted: String) -> String {
        let max = self.config.max_identifier_len;
        if wanted.len() <= max && !self.used_aliases.contains(&wanted) {
            self.used_aliases.insert(wanted.clone());
            return wanted;
        }
        let mut n = 1usize;
        loop {
            let suffix = format!("_{}", n);
            let mut head = wanted.as_str();
            let keep = max.saturating_sub(suffix.len());
            if head.len() > keep {
                let mut cut = keep;
                while !head.is_char_boundary(cut) {
                    cut -= 1;
                }
                head = &head[..cut];
            }
            let candidate = format!("{}{}", head, suffix);
            if !self.used_aliases.contains(&candidate) {
                self.used_aliases.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }

    /// `alias.column` for a column of the table at `path`.
    pub fn column(&mut self, path: &TablePath, col: &str) -> String {
        let alias = self.alias(path);
        format!("{}.{}", self.quote(&alias), self.quote(col))
    }

    fn build_join(&self, table: &str, alias: &str, left: (&str, &str), right_key: &str) -> String {
        format!(
            "JOIN {} AS {} ON {}.{} = {}.{}",
            self.quote(table),
            self.quote(alias),
            self.quote(left.0),
            self.quote(left.1),
            self.quote(alias),
            self.quote(right_key)
        )
    }

    /// Join the table at `path`, reached from its parent over `relation`.
    /// Joining an already joined path does nothing.
    pub fn join(&mut self, path: &TablePath, relation: Relation<'a>) -> SmqlResult<()> {
        if self.joined.contains(path) {
            return Ok(());
        }
        let parent = path.parent().ok_or_else(|| {
            SmqlError::Schema(format!("cannot join the base table {} to itself", path))
        })?;
        let parent_alias = self.alias(&parent);
        let owner = relation.owner();
        let target = relation.target();

        match relation.kind() {
            RelationKind::HasMany => {
                let alias = self.alias(path);
                let fk = relation.foreign_key();
                let clause = self.build_join(
                    target.table_name(),
                    &alias,
                    (&parent_alias, owner.primary_key()),
                    &fk,
                );
                self.joins.push(clause);
            }
            RelationKind::BelongsTo => {
                let alias = self.alias(path);
                let fk = relation.foreign_key();
                let clause = self.build_join(
                    target.table_name(),
                    &alias,
                    (&parent_alias, &fk),
                    target.primary_key(),
                );
                self.joins.push(clause);
            }
            RelationKind::HasAndBelongsToMany => {
                let def = relation.def();
                let join_table = def.join_table.as_deref().unwrap_or_default();
                let association_fk = def.association_foreign_key.as_deref().unwrap_or_default();
                let jt_alias =
                    self.alias(&parent.child(PathToken::JoinTable(relation.name().to_string())));
                let alias = self.alias(path);
                let fk = relation.foreign_key();
                let first = self.build_join(
                    join_table,
                    &jt_alias,
                    (&parent_alias, owner.primary_key()),
                    &fk,
                );
                let second = self.build_join(
                    target.table_name(),
                    &alias,
                    (&jt_alias, association_fk),
                    target.primary_key(),
                );
                self.joins.push(first);
                self.joins.push(second);
            }
            RelationKind::HasManyThrough => {
                let (through, source) =
                    relation
                        .through_hops()
                        .ok_or_else(|| SmqlError::UnknownRelation {
                            expected: "through relation",
                            model: owner.name().to_string(),
                            column: relation.name().to_string(),
                        })?;
                let through_path = parent.child(PathToken::Relation(through.name().to_string()));
                self.join(&through_path, through)?;
                let source_path =
                    through_path.child(PathToken::Relation(source.name().to_string()));
                self.join(&source_path, source)?;
                // the caller sees a single hop
                let alias = self.alias(&source_path);
                self.aliases.insert(path.clone(), alias);
            }
            RelationKind::Unknown(kind) => {
                return Err(SmqlError::UnknownSchemaRelationKind {
                    model: owner.name().to_string(),
                    relation: relation.name().to_string(),
                    kind: kind.clone(),
                });
            }
        }

        tracing::trace!(path = %path, relation = relation.name(), "joined");
        self.table_model.insert(path.clone(), target);
        self.joined.insert(path.clone());
        Ok(())
    }

    /// Join every hop of `col`'s path below `table`, returning the path of
    /// the table that holds the terminal column.
    pub fn join_column(
        &mut self,
        table: &TablePath,
        col: &crate::column::Column<'a>,
    ) -> SmqlResult<TablePath> {
        col.visit_joins(|relations, relation| self.join(&table.join(relations), relation))?;
        Ok(table.join(col.path()))
    }

    /// Free path for a derived table of `relation` below `table`. Repeated
    /// sub-equal-joins over one relation each get their own table.
    pub fn derived_path(&self, table: &TablePath, relation: &str) -> TablePath {
        let mut path = table.child(PathToken::Sub(relation.to_string()));
        let mut n = 1;
        while self.joined.contains(&path) {
            n += 1;
            path = table.child(PathToken::Sub(format!("{}_{}", relation, n)));
        }
        path
    }

    /// Join a derived table built from `sql` at `path`.
    pub fn join_derived(&mut self, path: &TablePath, sql: &str, model: Model<'a>) {
        if self.joined.contains(path) {
            return;
        }
        let alias = self.alias(path);
        let clause = format!("JOIN LATERAL ({}) AS {} ON TRUE", sql, self.quote(&alias));
        self.joins.push(clause);
        self.table_model.insert(path.clone(), model);
        self.joined.insert(path.clone());
    }

    /// Restrict this (sub-)query to the rows related to `parent_alias`
    /// over `relation`.
    pub fn correlate(&mut self, relation: Relation<'a>, parent_alias: &str) -> SmqlResult<()> {
        let base = self.base.clone();
        let owner = relation.owner();
        let parent = self.quote(parent_alias);
        let sql = match relation.kind() {
            RelationKind::HasMany => format!(
                "{} = {}.{}",
                self.column(&base, &relation.foreign_key()),
                parent,
                self.quote(owner.primary_key())
            ),
            RelationKind::BelongsTo => format!(
                "{} = {}.{}",
                self.column(&base, relation.target().primary_key()),
                parent,
                self.quote(&relation.foreign_key())
            ),
            RelationKind::HasAndBelongsToMany => {
                let def = relation.def();
                let jt_path = base.child(PathToken::JoinTable(relation.name().to_string()));
                let jt_alias = self.alias(&jt_path);
                let base_alias = self.base_alias.clone();
                let clause = self.build_join(
                    def.join_table.as_deref().unwrap_or_default(),
                    &jt_alias,
                    (&base_alias, relation.target().primary_key()),
                    def.association_foreign_key.as_deref().unwrap_or_default(),
                );
                self.joins.push(clause);
                self.joined.insert(jt_path);
                format!(
                    "{}.{} = {}.{}",
                    self.quote(&jt_alias),
                    self.quote(&relation.foreign_key()),
                    parent,
                    self.quote(owner.primary_key())
                )
            }
            RelationKind::HasManyThrough => {
                return Err(SmqlError::UnknownRelation {
                    expected: "direct relation",
                    model: owner.name().to_string(),
                    column: relation.name().to_string(),
                });
            }
            RelationKind::Unknown(kind) => {
                return Err(SmqlError::UnknownSchemaRelationKind {
                    model: owner.name().to_string(),
                    relation: relation.name().to_string(),
                    kind: kind.clone(),
                });
            }
        };
        self.push_where(Predicate::leaf(sql, vec![]));
        Ok(())
    }

    /// Add an expression to the select list unless already present.
    pub fn select(&mut self, expr: String) {
        if !self.select.contains(&expr) {
            self.select.push(expr);
        }
    }

    /// Order by a column. Columns of joined tables are selected too, as
    /// `SELECT DISTINCT` requires.
    pub fn order(&mut self, path: &TablePath, col: &str, dir: SortOrder) {
        let column = self.column(path, col);
        if path != &self.base {
            self.select(column.clone());
        }
        self.order.push(format!("{} {}", column, dir.keyword()));
    }

    pub fn include(&mut self, path: TablePath) {
        if !self.includes.contains(&path) {
            self.includes.push(path);
        }
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    pub fn push_where(&mut self, predicate: Predicate) {
        self.predicate.push(predicate);
    }

    pub fn bindings(&self) -> &[(String, BindValue)] {
        &self.bindings
    }

    pub fn joins(&self) -> &[String] {
        &self.joins
    }

    /// Normalize the predicate tree and emit the plan.
    pub fn finish(mut self) -> Plan {
        let predicate = std::mem::take(&mut self.predicate).normalize();
        let where_clause = (!predicate.is_empty()).then(|| predicate.to_sql());
        let from = if self.base_alias == self.model.table_name() {
            self.quote(&self.base_alias)
        } else {
            format!(
                "{} AS {}",
                self.quote(self.model.table_name()),
                self.quote(&self.base_alias)
            )
        };
        let mut includes = IncludeTree::default();
        for path in &self.includes {
            includes.insert(&path.relation_names());
        }
        Plan {
            model: self.model.name().to_string(),
            base_table: self.model.table_name().to_string(),
            from,
            select: self.select,
            joins: self.joins,
            predicate,
            where_clause,
            bindings: self.bindings,
            order: self.order,
            limit: self.limit,
            offset: self.offset,
            includes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::fixture;
    use crate::schema::{ModelDef, RelationDef, Schema};

    #[test]
    fn test_base_table_is_its_own_alias() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let mut asm = Assembler::new(schema.model("Person").unwrap(), &config);
        let base = asm.base_table().clone();
        assert!(base.is_root());
        assert_eq!(asm.alias(&base), "people");
        assert_eq!(asm.column(&base, "givenname"), "people.givenname");
    }

    #[test]
    fn test_join_is_idempotent() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let person = schema.model("Person").unwrap();
        let mut asm = Assembler::new(person, &config);
        let path = asm.base_table().join(&["articles".to_string()]);
        let rel = person.relation("articles").unwrap();
        asm.join(&path, rel).unwrap();
        asm.join(&path, rel).unwrap();
        assert_eq!(
            asm.joins(),
            ["JOIN articles AS smql_articles ON people.id = smql_articles.person_id"]
        );
        assert_eq!(asm.model_at(&path).unwrap().name(), "Article");
    }

    #[test]
    fn test_belongs_to_join() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let article = schema.model("Article").unwrap();
        let mut asm = Assembler::new(article, &config);
        let path = asm.base_table().join(&["author".to_string()]);
        asm.join(&path, article.relation("author").unwrap()).unwrap();
        assert_eq!(
            asm.joins(),
            ["JOIN people AS smql_author ON articles.person_id = smql_author.id"]
        );
    }

    #[test]
    fn test_many_to_many_uses_join_table() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let article = schema.model("Article").unwrap();
        let mut asm = Assembler::new(article, &config);
        let path = asm.base_table().join(&["tags".to_string()]);
        asm.join(&path, article.relation("tags").unwrap()).unwrap();
        assert_eq!(
            asm.joins(),
            [
                "JOIN articles_tags AS smql_jt_tags ON articles.id = smql_jt_tags.article_id",
                "JOIN tags AS smql_tags ON smql_jt_tags.tag_id = smql_tags.id",
            ]
        );
    }

    #[test]
    fn test_through_relation_looks_like_one_hop() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let person = schema.model("Person").unwrap();
        let mut asm = Assembler::new(person, &config);
        let path = asm.base_table().join(&["groups".to_string()]);
        asm.join(&path, person.relation("groups").unwrap()).unwrap();
        assert_eq!(
            asm.joins(),
            [
                "JOIN memberships AS smql_memberships ON people.id = smql_memberships.person_id",
                "JOIN groups AS smql_memberships_group ON smql_memberships.group_id = smql_memberships_group.id",
            ]
        );
        assert_eq!(asm.column(&path, "name"), "smql_memberships_group.name");
        assert_eq!(asm.model_at(&path).unwrap().name(), "Group");
    }

    #[test]
    fn test_unknown_relation_kind_is_fatal() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let article = schema.model("Article").unwrap();
        let mut asm = Assembler::new(article, &config);
        let path = asm.base_table().join(&["reviews".to_string()]);
        let err = asm.join(&path, article.relation("reviews").unwrap()).unwrap_err();
        assert!(matches!(err, SmqlError::UnknownSchemaRelationKind { ref kind, .. } if kind == "polymorphic"));
    }

    #[test]
    fn test_long_aliases_are_truncated_and_unique() {
        let config = SmqlConfig::builder().max_identifier_len(20).build().unwrap();
        let schema = Schema::new().with_model("A", ModelDef::new("a"));
        let mut asm = Assembler::new(schema.model("A").unwrap(), &config);
        let base = asm.base_table().clone();
        let first = asm.alias(&base.join(&["a_very_long_relation_name".to_string()]));
        let second = asm.alias(&base.join(&["a_very_long_relation_other".to_string()]));
        assert_eq!(first, "smql_a_very_long_r_1");
        assert_eq!(second, "smql_a_very_long_r_2");
        assert!(first.len() <= 20 && second.len() <= 20);
        // stable on repeat
        assert_eq!(asm.alias(&base.join(&["a_very_long_relation_name".to_string()])), first);
    }

    #[test]
    fn test_textual_alias_collision_gets_suffix() {
        let config = SmqlConfig::default();
        let schema = Schema::new()
            .with_model(
                "A",
                ModelDef::new("a")
                    .relation("b", RelationDef::has_many("A", "a_id"))
                    .relation("b_c", RelationDef::has_many("A", "a_id")),
            );
        let mut asm = Assembler::new(schema.model("A").unwrap(), &config);
        let base = asm.base_table().clone();
        let nested = asm.alias(&base.join(&["b".to_string(), "c".to_string()]));
        let flat = asm.alias(&base.join(&["b_c".to_string()]));
        assert_eq!(nested, "smql_b_c");
        assert_eq!(flat, "smql_b_c_1");
    }

    #[test]
    fn test_vids_are_monotonic_across_nested() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let person = schema.model("Person").unwrap();
        let mut asm = Assembler::new(person, &config);
        assert_eq!(asm.bind(BindValue::Int(1)), "p1");
        let at = asm.base_table().child(PathToken::Sub("articles".to_string()));
        let mut sub = asm.nested(schema.model("Article").unwrap(), &at);
        assert_eq!(sub.bind(BindValue::Int(2)), "p2");
        asm.absorb(&sub);
        assert_eq!(asm.bind(BindValue::Int(3)), "p3");
        assert_eq!(asm.bindings().len(), 3);
    }

    #[test]
    fn test_nested_plan_is_aliased_and_filtered() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let person = schema.model("Person").unwrap();
        let mut asm = Assembler::new(person, &config);
        let at = asm.base_table().child(PathToken::Sub("articles".to_string()));
        let mut sub = asm.nested(schema.model("Article").unwrap(), &at);
        let base = sub.base_table().clone();
        let title = sub.column(&base, "title");
        let param = sub.bind("x".into());
        sub.push_where(Predicate::leaf(
            format!("{} = {}", title, Assembler::placeholder(&param)),
            vec![param.clone()],
        ));
        let plan = sub.finish();
        assert_eq!(plan.from, "articles AS smql_sub_articles_base_articles");
        assert_eq!(
            plan.where_clause.as_deref(),
            Some("smql_sub_articles_base_articles.title = :p1")
        );
    }

    #[test]
    fn test_derived_paths_do_not_repeat() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let person = schema.model("Person").unwrap();
        let article = schema.model("Article").unwrap();
        let mut asm = Assembler::new(person, &config);
        let base = asm.base_table().clone();

        let first = asm.derived_path(&base, "articles");
        asm.join_derived(&first, "SELECT 1", article);
        let second = asm.derived_path(&base, "articles");
        assert_ne!(first, second);
        asm.join_derived(&second, "SELECT 2", article);

        assert_eq!(
            asm.joins(),
            [
                "JOIN LATERAL (SELECT 1) AS smql_sub_articles ON TRUE",
                "JOIN LATERAL (SELECT 2) AS smql_sub_articles_2 ON TRUE",
            ]
        );
    }

    #[test]
    fn test_quoted_identifiers() {
        let schema = fixture();
        let config = SmqlConfig::builder().quote_identifiers(true).build().unwrap();
        let person = schema.model("Person").unwrap();
        let mut asm = Assembler::new(person, &config);
        let path = asm.base_table().join(&["articles".to_string()]);
        asm.join(&path, person.relation("articles").unwrap()).unwrap();
        assert_eq!(
            asm.joins(),
            [r#"JOIN "articles" AS "smql_articles" ON "people"."id" = "smql_articles"."person_id""#]
        );
    }

    #[test]
    fn test_order_selects_joined_columns_only() {
        let schema = fixture();
        let config = SmqlConfig::default();
        let person = schema.model("Person").unwrap();
        let mut asm = Assembler::new(person, &config);
        let base = asm.base_table().clone();
        asm.order(&base, "surname", SortOrder::Desc);
        let plan = asm.finish();
        assert_eq!(plan.select, ["DISTINCT people.*"]);
        assert_eq!(plan.order, ["people.surname DESC"]);
    }
}
