//! The compiled mapping model: databases, pattern relations and the
//! compiler that turns a raw declarative mapping document into them.
//!
//! A mapping document is plain data (serde-deserializable). `compile`
//! resolves every name, template and join once, so that anything malformed
//! fails here with a mapping error and never during result iteration.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::algebra::RelationOp;
use crate::errors::RelGraphError;
use crate::expr::Expression;
use crate::names::{ColumnName, TableName};
use crate::nodes::{NodeMaker, Term, TermKind, TriplePattern};
use crate::plan::GraphIterator;
use crate::rename::Renamer;
use crate::sql::{ResultRow, SelectStatement};
use crate::values::{TranslationTable, ValueConstraint, ValueMaker, ValuePattern};
use crate::vendor::Vendor;

/// A database the mapping reads from. The connection is established lazily
/// on first query and reused for the descriptor's lifetime.
pub struct Database {
    name: String,
    path: String,
    vendor: Vendor,
    result_limit: Option<u64>,
    connection: Mutex<Option<rusqlite::Connection>>,
}

impl Database {
    pub fn new(name: impl Into<String>, path: impl Into<String>, vendor: Vendor) -> Database {
        Database {
            name: name.into(),
            path: path.into(),
            vendor,
            result_limit: None,
            connection: Mutex::new(None),
        }
    }

    pub fn with_result_limit(mut self, limit: u64) -> Database {
        self.result_limit = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn result_limit(&self) -> Option<u64> {
        self.result_limit
    }

    /// Runs `f` against the lazily established connection.
    pub fn with_connection<R>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> Result<R, RelGraphError>,
    ) -> Result<R, RelGraphError> {
        let mut guard = self.connection.lock();
        if guard.is_none() {
            let conn = rusqlite::Connection::open(&self.path).map_err(|e| {
                RelGraphError::connection(format!(
                    "cannot open database \"{}\" at \"{}\": {e}",
                    self.name, self.path
                ))
            })?;
            *guard = Some(conn);
        }
        let conn = guard
            .as_ref()
            .ok_or_else(|| RelGraphError::connection("connection vanished under lock"))?;
        f(conn)
    }

    /// Executes a generated statement and materializes its rows. Cell values
    /// are carried as strings; NULL stays None.
    pub fn query(&self, statement: &SelectStatement) -> Result<Vec<ResultRow>, RelGraphError> {
        log::debug!("db \"{}\": {}", self.name, statement.sql);
        self.with_connection(|conn| {
            let mut prepared = conn
                .prepare(&statement.sql)
                .map_err(|e| RelGraphError::sql_execution(&statement.sql, e.to_string()))?;
            let column_count = statement.columns.len();
            let mut rows = prepared
                .query([])
                .map_err(|e| RelGraphError::sql_execution(&statement.sql, e.to_string()))?;
            let mut out = Vec::new();
            loop {
                if let Some(limit) = self.result_limit {
                    if out.len() as u64 >= limit {
                        break;
                    }
                }
                let row = match rows.next() {
                    Ok(Some(row)) => row,
                    Ok(None) => break,
                    Err(e) => {
                        return Err(RelGraphError::sql_execution(&statement.sql, e.to_string()));
                    }
                };
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| RelGraphError::sql_execution(&statement.sql, e.to_string()))?;
                    values.push(cell_to_string(value));
                }
                out.push(ResultRow::new(statement.columns.clone(), values));
            }
            Ok(out)
        })
    }
}

pub(crate) fn cell_to_string(value: rusqlite::types::ValueRef<'_>) -> Option<String> {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(r.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

/// Maps database names to open descriptors. A plain value owned by the
/// compiled mapping; there is no process-wide registry.
#[derive(Debug, Default)]
pub struct DatabaseRegistry {
    databases: AHashMap<String, Arc<Database>>,
}

impl DatabaseRegistry {
    pub fn new() -> DatabaseRegistry {
        DatabaseRegistry::default()
    }

    pub fn register(&mut self, database: Database) -> Arc<Database> {
        let db = Arc::new(database);
        self.databases.insert(db.name.clone(), db.clone());
        db
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Database>> {
        self.databases.get(name)
    }
}

/// One mapping rule: a relational tree plus the three makers that turn each
/// of its rows into a statement.
#[derive(Clone, Debug)]
pub struct PatternRelation {
    database: Arc<Database>,
    tree: Arc<RelationOp>,
    subject: NodeMaker,
    predicate: NodeMaker,
    object: NodeMaker,
    unique: bool,
}

impl PatternRelation {
    /// Builds a relation, checking that every column any maker reads is
    /// projected by the tree.
    pub fn new(
        database: Arc<Database>,
        tree: Arc<RelationOp>,
        subject: NodeMaker,
        predicate: NodeMaker,
        object: NodeMaker,
        unique: bool,
    ) -> Result<PatternRelation, RelGraphError> {
        let projected: BTreeSet<ColumnName> = tree.projected_columns().into_iter().collect();
        let needed: BTreeSet<ColumnName> = subject
            .columns()
            .into_iter()
            .chain(predicate.columns())
            .chain(object.columns())
            .collect();
        if let Some(missing) = needed.difference(&projected).next() {
            return Err(RelGraphError::mapping(format!(
                "column {} is read by a node maker but not projected",
                missing.qualified()
            )));
        }
        Ok(PatternRelation {
            database,
            tree,
            subject,
            predicate,
            object,
            unique,
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn tree(&self) -> &Arc<RelationOp> {
        &self.tree
    }

    pub fn subject(&self) -> &NodeMaker {
        &self.subject
    }

    pub fn predicate(&self) -> &NodeMaker {
        &self.predicate
    }

    pub fn object(&self) -> &NodeMaker {
        &self.object
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Specializes this relation to a pattern. Bound positions are pushed
    /// down into selection conditions; None when the result is statically
    /// empty (the pattern can never match this rule).
    pub fn select_triple(&self, pattern: &TriplePattern) -> Option<PatternRelation> {
        let mut tree = self.tree.clone();
        let mut makers = [
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        ];
        let bound = [&pattern.subject, &pattern.predicate, &pattern.object];
        let mut conditions = Vec::new();
        for (maker, term) in makers.iter_mut().zip(bound) {
            if let Some(term) = term {
                let (specialized, condition) = maker.select_term(term);
                if condition.is_false() {
                    return None;
                }
                conditions.push(condition);
                *maker = specialized;
            }
        }
        tree = RelationOp::select(tree, Expression::and(conditions));
        if tree.is_statically_empty() {
            return None;
        }
        let remaining: Vec<ColumnName> = makers
            .iter()
            .flat_map(|m| m.columns())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        // A fully bound unique pattern is an existence probe; one row is
        // enough to answer it.
        if remaining.is_empty() && self.unique {
            tree = RelationOp::limit(tree, 1);
        }
        tree = RelationOp::project(tree, remaining);
        let [subject, predicate, object] = makers;
        Some(PatternRelation {
            database: self.database.clone(),
            tree,
            subject,
            predicate,
            object,
            unique: self.unique,
        })
    }

    /// Applies one renaming to the tree and all three makers at once.
    pub fn rename(&self, renamer: &Renamer) -> PatternRelation {
        PatternRelation {
            database: self.database.clone(),
            tree: RelationOp::rename(&self.tree, renamer),
            subject: self.subject.rename(renamer),
            predicate: self.predicate.rename(renamer),
            object: self.object.rename(renamer),
            unique: self.unique,
        }
    }
}

/// The immutable ownership root produced by [`compile`].
#[derive(Debug)]
pub struct CompiledMapping {
    registry: DatabaseRegistry,
    relations: Vec<Arc<PatternRelation>>,
    prefixes: Vec<(String, String)>,
}

impl CompiledMapping {
    pub fn relations(&self) -> &[Arc<PatternRelation>] {
        &self.relations
    }

    pub fn database(&self, name: &str) -> Option<&Arc<Database>> {
        self.registry.get(name)
    }

    pub fn prefixes(&self) -> &[(String, String)] {
        &self.prefixes
    }

    /// Finds all statements matching the pattern. Each call plans afresh
    /// and returns a forward-only iterator.
    pub fn find(&self, pattern: &TriplePattern) -> GraphIterator {
        GraphIterator::plan(self.relations(), pattern)
    }
}

// ---------------------------------------------------------------------------
// Raw mapping document

/// The declarative mapping structure as deserialized from JSON.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMapping {
    #[serde(default)]
    pub prefixes: Vec<RawPrefix>,
    pub databases: Vec<RawDatabase>,
    #[serde(default)]
    pub translation_tables: Vec<RawTranslationTable>,
    pub relations: Vec<RawRelation>,
}

impl RawMapping {
    pub fn from_json(text: &str) -> Result<RawMapping, RelGraphError> {
        serde_json::from_str(text)
            .map_err(|e| RelGraphError::mapping(format!("cannot parse mapping document: {e}")))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawPrefix {
    pub prefix: String,
    pub iri: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawDatabase {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub vendor: Vendor,
    #[serde(default)]
    pub result_limit: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawTranslationTable {
    pub name: String,
    /// Pairs of (database value, graph value).
    pub entries: Vec<(String, String)>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawRelation {
    pub database: String,
    pub table: String,
    #[serde(default)]
    pub aliases: Vec<RawAlias>,
    /// Join conditions in `left.column = right.column` form.
    #[serde(default)]
    pub joins: Vec<String>,
    /// Extra `column = value` restrictions.
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
    pub subject: RawTermSpec,
    pub predicate: RawTermSpec,
    pub object: RawTermSpec,
    #[serde(default = "default_true")]
    pub unique: bool,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_desc: bool,
    #[serde(default)]
    pub limit: Option<u64>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawAlias {
    pub table: String,
    #[serde(rename = "as")]
    pub alias: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawCondition {
    pub column: String,
    pub equals: String,
}

/// One term position of a rule. Exactly one of the base fields (`iri`,
/// `iri_pattern`, `iri_column`, `blank_node`, `literal`, `column`,
/// `pattern`) must be present; the rest refine it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTermSpec {
    pub iri: Option<String>,
    pub iri_pattern: Option<String>,
    pub iri_column: Option<String>,
    pub blank_node: Option<RawBlankNode>,
    pub literal: Option<String>,
    pub column: Option<String>,
    pub pattern: Option<String>,
    pub language: Option<String>,
    pub datatype: Option<String>,
    pub translate_with: Option<String>,
    pub max_length: Option<usize>,
    pub contains: Option<String>,
    pub regex: Option<String>,
}

// ---------------------------------------------------------------------------
// Compilation

/// Compiles a raw mapping into its executable form. All resolution errors
/// surface here as mapping errors.
pub fn compile(raw: RawMapping) -> Result<CompiledMapping, RelGraphError> {
    let mut registry = DatabaseRegistry::new();
    for db in &raw.databases {
        let mut database = Database::new(&db.name, &db.path, db.vendor);
        if let Some(limit) = db.result_limit {
            database = database.with_result_limit(limit);
        }
        registry.register(database);
    }
    let mut tables: AHashMap<String, Arc<TranslationTable>> = AHashMap::new();
    for raw_table in &raw.translation_tables {
        tables.insert(
            raw_table.name.clone(),
            Arc::new(TranslationTable::from_pairs(raw_table.entries.iter().cloned())),
        );
    }
    let mut relations = Vec::with_capacity(raw.relations.len());
    for (index, rule) in raw.relations.iter().enumerate() {
        let relation =
            compile_relation(rule, index, &registry, &tables).map_err(|e| match e {
                RelGraphError::Mapping(msg) => {
                    RelGraphError::mapping(format!("relation #{index}: {msg}"))
                }
                other => other,
            })?;
        relations.push(Arc::new(relation));
    }
    Ok(CompiledMapping {
        registry,
        relations,
        prefixes: raw
            .prefixes
            .iter()
            .map(|p| (p.prefix.clone(), p.iri.clone()))
            .collect(),
    })
}

fn compile_relation(
    rule: &RawRelation,
    index: usize,
    registry: &DatabaseRegistry,
    tables: &AHashMap<String, Arc<TranslationTable>>,
) -> Result<PatternRelation, RelGraphError> {
    let database = registry
        .get(&rule.database)
        .ok_or_else(|| RelGraphError::mapping(format!("unknown database \"{}\"", rule.database)))?
        .clone();
    let vendor = database.vendor();

    // FROM items: the primary table plus every alias.
    let primary = TableName::parse(vendor, &rule.table)?;
    let mut visible: Vec<TableName> = vec![primary.clone()];
    let mut tree = RelationOp::table(primary);
    for raw_alias in &rule.aliases {
        let from = TableName::parse(vendor, &raw_alias.table)?;
        let to = TableName::parse(vendor, &raw_alias.alias)?;
        if visible.contains(&to) {
            return Err(RelGraphError::mapping(format!(
                "alias \"{}\" clashes with a visible table",
                to.qualified()
            )));
        }
        visible.push(to.clone());
        tree = RelationOp::join(
            tree,
            RelationOp::alias(RelationOp::table(from.clone()), from, to),
            Expression::True,
        );
    }

    let mut conditions = Vec::new();
    for join in &rule.joins {
        conditions.push(parse_join(vendor, join, &visible)?);
    }
    for condition in &rule.conditions {
        let column = resolve_column(vendor, &condition.column, &visible)?;
        conditions.push(Expression::column_equals(column, &condition.equals));
    }
    tree = RelationOp::select(tree, Expression::and(conditions));

    let class_map = format!("rel{index}");
    let subject = compile_term(vendor, &rule.subject, &visible, tables, &class_map, rule.unique)?;
    let predicate =
        compile_term(vendor, &rule.predicate, &visible, tables, &class_map, rule.unique)?;
    let object = compile_term(vendor, &rule.object, &visible, tables, &class_map, rule.unique)?;
    match subject {
        NodeMaker::Fixed(Term::Iri(_) | Term::BlankNode(_)) => {}
        NodeMaker::Typed {
            kind: TermKind::Iri | TermKind::BlankNode,
            ..
        } => {}
        _ => return Err(RelGraphError::mapping("subject must be an IRI or blank node")),
    }
    match predicate {
        NodeMaker::Fixed(Term::Iri(_))
        | NodeMaker::Typed {
            kind: TermKind::Iri,
            ..
        } => {}
        _ => return Err(RelGraphError::mapping("predicate must be an IRI")),
    }

    if let Some(order_column) = &rule.order_by {
        let column = resolve_column(vendor, order_column, &visible)?;
        tree = RelationOp::order(tree, vec![(column, rule.order_desc)]);
    }
    if let Some(n) = rule.limit {
        tree = RelationOp::limit(tree, n);
    }

    let projected: Vec<ColumnName> = subject
        .columns()
        .into_iter()
        .chain(predicate.columns())
        .chain(object.columns())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    tree = RelationOp::project(tree, projected);

    PatternRelation::new(database, tree, subject, predicate, object, rule.unique)
}

fn parse_join(
    vendor: Vendor,
    text: &str,
    visible: &[TableName],
) -> Result<Expression, RelGraphError> {
    let (left, right) = text.split_once('=').ok_or_else(|| {
        RelGraphError::mapping(format!("join \"{text}\" is not in left = right form"))
    })?;
    let left = resolve_column(vendor, left.trim(), visible)?;
    let right = resolve_column(vendor, right.trim(), visible)?;
    Ok(Expression::columns_equal(left, right))
}

/// Parses a column reference and checks it against the visible tables, so a
/// typo fails at compile time instead of producing broken SQL.
fn resolve_column(
    vendor: Vendor,
    text: &str,
    visible: &[TableName],
) -> Result<ColumnName, RelGraphError> {
    let column = ColumnName::parse(vendor, text)?;
    if !visible.contains(&column.table) {
        return Err(RelGraphError::mapping(format!(
            "column {} does not belong to any visible table",
            column.qualified()
        )));
    }
    Ok(column)
}

fn compile_term(
    vendor: Vendor,
    spec: &RawTermSpec,
    visible: &[TableName],
    tables: &AHashMap<String, Arc<TranslationTable>>,
    class_map: &str,
    unique: bool,
) -> Result<NodeMaker, RelGraphError> {
    let bases = [
        spec.iri.is_some(),
        spec.iri_pattern.is_some(),
        spec.iri_column.is_some(),
        spec.blank_node.is_some(),
        spec.literal.is_some(),
        spec.column.is_some(),
        spec.pattern.is_some(),
    ];
    if bases.iter().filter(|b| **b).count() != 1 {
        return Err(RelGraphError::mapping(
            "term spec must have exactly one of iri, iri_pattern, iri_column, \
             blank_node, literal, column, pattern",
        ));
    }

    let literal_kind = || match (&spec.language, &spec.datatype) {
        (Some(_), Some(_)) => Err(RelGraphError::mapping(
            "a literal cannot carry both a language and a datatype",
        )),
        (Some(lang), None) => Ok(TermKind::LanguageLiteral(lang.clone())),
        (None, Some(dt)) => Ok(TermKind::TypedLiteral(dt.clone())),
        (None, None) => Ok(TermKind::PlainLiteral),
    };

    // Fixed terms need no row access and no decoration.
    if let Some(iri) = &spec.iri {
        return Ok(NodeMaker::Fixed(Term::iri(iri.clone())));
    }
    if let Some(lexical) = &spec.literal {
        return Ok(NodeMaker::Fixed(match literal_kind()? {
            TermKind::PlainLiteral => Term::literal(lexical.clone()),
            TermKind::LanguageLiteral(lang) => Term::language_literal(lexical.clone(), lang),
            TermKind::TypedLiteral(dt) => Term::typed_literal(lexical.clone(), dt),
            _ => return Err(RelGraphError::mapping("unreachable literal kind")),
        }));
    }

    let (mut value, kind) = if let Some(template) = &spec.iri_pattern {
        let pattern = checked_pattern(vendor, template, visible)?;
        (ValueMaker::Pattern(pattern), TermKind::Iri)
    } else if let Some(column) = &spec.iri_column {
        let column = resolve_column(vendor, column, visible)?;
        (ValueMaker::Column(column), TermKind::Iri)
    } else if let Some(blank) = &spec.blank_node {
        let columns = blank
            .columns
            .iter()
            .map(|c| resolve_column(vendor, c, visible))
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(RelGraphError::mapping("blank node needs at least one column"));
        }
        let id = if blank.id.is_empty() {
            class_map.to_string()
        } else {
            blank.id.clone()
        };
        (
            ValueMaker::BlankNodeId {
                class_map: id,
                columns,
            },
            TermKind::BlankNode,
        )
    } else if let Some(column) = &spec.column {
        let column = resolve_column(vendor, column, visible)?;
        (ValueMaker::Column(column), literal_kind()?)
    } else if let Some(template) = &spec.pattern {
        let pattern = checked_pattern(vendor, template, visible)?;
        (ValueMaker::Pattern(pattern), literal_kind()?)
    } else {
        return Err(RelGraphError::mapping("empty term spec"));
    };

    if let Some(table_name) = &spec.translate_with {
        let table = tables.get(table_name).ok_or_else(|| {
            RelGraphError::mapping(format!("unknown translation table \"{table_name}\""))
        })?;
        value = ValueMaker::Translated {
            base: Box::new(value),
            table: table.clone(),
        };
    }
    let mut constraints = Vec::new();
    if let Some(n) = spec.max_length {
        constraints.push(ValueConstraint::MaxLength(n));
    }
    if let Some(sub) = &spec.contains {
        constraints.push(ValueConstraint::Contains(sub.clone()));
    }
    if let Some(pattern) = &spec.regex {
        constraints.push(ValueConstraint::regex(pattern)?);
    }
    if !constraints.is_empty() {
        value = ValueMaker::Decorated {
            base: Box::new(value),
            constraints,
        };
    }

    Ok(NodeMaker::Typed {
        value,
        kind,
        unique,
    })
}

fn checked_pattern(
    vendor: Vendor,
    template: &str,
    visible: &[TableName],
) -> Result<ValuePattern, RelGraphError> {
    let pattern = ValuePattern::parse(vendor, template)?;
    let maker = ValueMaker::Pattern(pattern.clone());
    for column in maker.columns() {
        if !visible.contains(&column.table) {
            return Err(RelGraphError::mapping(format!(
                "template column {} does not belong to any visible table",
                column.qualified()
            )));
        }
    }
    Ok(pattern)
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawBlankNode {
    /// Identifier prefix distinguishing this rule's blank nodes. Defaults
    /// to a per-rule generated id when empty.
    #[serde(default)]
    pub id: String,
    pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_mapping(extra_relation_fields: &str) -> String {
        format!(
            r#"{{
              "databases": [{{"name": "db", "path": ":memory:"}}],
              "relations": [{{
                "database": "db",
                "table": "foo",
                "subject": {{"iri_pattern": "http://ex/@@foo.col1@@"}},
                "predicate": {{"iri": "http://ex/p"}},
                "object": {{"column": "foo.col2"}}{extra_relation_fields}
              }}]
            }}"#
        )
    }

    #[test]
    fn compiles_minimal_mapping() {
        let raw = RawMapping::from_json(&minimal_mapping("")).unwrap();
        let mapping = compile(raw).unwrap();
        assert_eq!(mapping.relations().len(), 1);
        let relation = &mapping.relations()[0];
        assert!(relation.is_unique());
        let projected = relation.tree().projected_columns();
        assert_eq!(projected.len(), 2);
    }

    #[test]
    fn rejects_unknown_database() {
        let text = minimal_mapping("").replace("\"database\": \"db\"", "\"database\": \"nope\"");
        let raw = RawMapping::from_json(&text).unwrap();
        assert!(compile(raw).is_err());
    }

    #[test]
    fn rejects_column_outside_visible_tables() {
        let text = minimal_mapping("").replace("foo.col2", "bar.col2");
        let raw = RawMapping::from_json(&text).unwrap();
        let err = compile(raw).unwrap_err();
        assert!(err.to_string().contains("bar.col2"));
    }

    #[test]
    fn rejects_ambiguous_term_spec() {
        let text = minimal_mapping("").replace(
            "{\"column\": \"foo.col2\"}",
            "{\"column\": \"foo.col2\", \"iri\": \"http://ex/x\"}",
        );
        let raw = RawMapping::from_json(&text).unwrap();
        assert!(compile(raw).is_err());
    }

    #[test]
    fn rejects_literal_subject() {
        let text = minimal_mapping("").replace(
            "{\"iri_pattern\": \"http://ex/@@foo.col1@@\"}",
            "{\"column\": \"foo.col1\"}",
        );
        let raw = RawMapping::from_json(&text).unwrap();
        assert!(compile(raw).is_err());
    }

    #[test]
    fn select_triple_pushes_subject_into_condition() {
        let raw = RawMapping::from_json(&minimal_mapping("")).unwrap();
        let mapping = compile(raw).unwrap();
        let relation = &mapping.relations()[0];
        let pattern = TriplePattern::new(Some(Term::iri("http://ex/7")), None, None);
        let specialized = relation.select_triple(&pattern).unwrap();
        let condition = specialized.tree().condition();
        let expected = Expression::column_equals(
            ColumnName::parse(Vendor::Sqlite, "foo.col1").unwrap(),
            "7",
        );
        assert_eq!(condition, expected);
        // Subject is now fixed; only the object column remains projected.
        assert_eq!(specialized.tree().projected_columns().len(), 1);
    }

    #[test]
    fn select_triple_rejects_foreign_predicate() {
        let raw = RawMapping::from_json(&minimal_mapping("")).unwrap();
        let mapping = compile(raw).unwrap();
        let relation = &mapping.relations()[0];
        let pattern = TriplePattern::new(None, Some(Term::iri("http://ex/other")), None);
        assert!(relation.select_triple(&pattern).is_none());
    }

    #[test]
    fn fully_bound_unique_pattern_limits_to_one_row() {
        let raw = RawMapping::from_json(&minimal_mapping("")).unwrap();
        let mapping = compile(raw).unwrap();
        let relation = &mapping.relations()[0];
        let pattern = TriplePattern::new(
            Some(Term::iri("http://ex/7")),
            Some(Term::iri("http://ex/p")),
            Some(Term::literal("hello")),
        );
        let specialized = relation.select_triple(&pattern).unwrap();
        let sql = crate::sql::generate_select(specialized.tree(), Vendor::Sqlite)
            .unwrap()
            .sql;
        assert!(sql.starts_with("SELECT 1 "), "got: {sql}");
        assert!(sql.ends_with("LIMIT 1"), "got: {sql}");
    }

    #[test]
    fn alias_and_join_compile_into_tree() {
        let extra = r#",
            "aliases": [{"table": "foo", "as": "f2"}],
            "joins": ["foo.col1 = f2.col1"]"#;
        let raw = RawMapping::from_json(&minimal_mapping(extra)).unwrap();
        let mapping = compile(raw).unwrap();
        let relation = &mapping.relations()[0];
        let tables = relation.tree().base_tables();
        let foo = TableName::parse(Vendor::Sqlite, "foo").unwrap();
        assert_eq!(tables.get(&TableName::parse(Vendor::Sqlite, "f2").unwrap()), Some(&foo));
        assert_eq!(tables.get(&foo), Some(&foo));
    }
}
