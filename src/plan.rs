//! Query planning and execution.
//!
//! Answering a pattern runs through fixed stages: specialize every mapping
//! rule to the pattern, drop the statically empty ones, group relations that
//! can share one SQL statement, canonically rename each group's aliases,
//! then execute group by group. A group's SQL only runs when the consuming
//! iterator reaches it; the statement is released as soon as its rows are
//! drained, and conversion of rows into triples stays lazy.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::algebra::RelationOp;
use crate::errors::RelGraphError;
use crate::expr::Expression;
use crate::mapping::{Database, PatternRelation};
use crate::names::{ColumnName, TableName};
use crate::nodes::{Triple, TriplePattern};
use crate::rename::{AliasAllocator, Renamer};
use crate::sql::{generate_select, ResultRow, SelectStatement};

/// The plan for one pattern over one mapping.
#[derive(Debug)]
pub enum QueryPlan {
    /// No rule can match the pattern.
    Empty,
    /// One relation answered by its own statement (or no statement at all
    /// when the relation is trivial).
    Single(PatternRelation),
    /// Several relations sharing a single statement; every member converts
    /// every row.
    CompatibleGroup(Vec<PatternRelation>),
    Sequence(Vec<QueryPlan>),
}

impl QueryPlan {
    pub fn execute(self) -> GraphIterator {
        let mut stages = Vec::new();
        self.emit(&mut stages);
        GraphIterator {
            stages: stages.into_iter(),
            current: None,
            done: false,
        }
    }

    fn emit(self, stages: &mut Vec<Stage>) {
        match self {
            QueryPlan::Empty => {}
            QueryPlan::Single(relation) => emit_relations(vec![relation], stages),
            QueryPlan::CompatibleGroup(members) => emit_relations(members, stages),
            QueryPlan::Sequence(plans) => {
                for plan in plans {
                    plan.emit(stages);
                }
            }
        }
    }
}

/// Builds the plan for `pattern`: Filter, Specialize and Group.
pub fn build_plan(relations: &[Arc<PatternRelation>], pattern: &TriplePattern) -> QueryPlan {
    let mut plans = Vec::new();
    let mut groups: Vec<Group> = Vec::new();
    for relation in relations {
        let Some(specialized) = relation.select_triple(pattern) else {
            continue;
        };
        if specialized.tree().is_statically_empty() {
            continue;
        }
        // Non-unique relations may produce duplicate rows; merging them
        // could change multiplicities. Row-scoped relations (Order/Limit)
        // must keep their own statement for the scoping to stay exact.
        if !specialized.is_unique() || specialized.tree().has_row_scoping() {
            plans.push(QueryPlan::Single(specialized));
            continue;
        }
        let canonical = canonicalize(&specialized);
        let condition = canonical.tree().condition();
        let tables = canonical.tree().base_tables();
        match groups
            .iter()
            .position(|g| g.admits(&canonical, &condition, &tables))
        {
            Some(i) => groups[i].members.push(canonical),
            None => groups.push(Group {
                database: canonical.database().clone(),
                condition,
                tables,
                members: vec![canonical],
            }),
        }
    }
    for group in groups {
        let mut members = group.members;
        if members.len() == 1 {
            if let Some(member) = members.pop() {
                plans.push(QueryPlan::Single(member));
            }
        } else {
            plans.push(QueryPlan::CompatibleGroup(members));
        }
    }
    match plans.len() {
        0 => QueryPlan::Empty,
        1 => plans.pop().unwrap_or(QueryPlan::Empty),
        _ => QueryPlan::Sequence(plans),
    }
}

struct Group {
    database: Arc<Database>,
    condition: Expression,
    tables: BTreeMap<TableName, TableName>,
    members: Vec<PatternRelation>,
}

impl Group {
    /// Two relations share a statement iff they read the same database,
    /// carry structurally equal conditions after canonical renaming, and
    /// range over the same tables with the same underlying origins.
    fn admits(
        &self,
        candidate: &PatternRelation,
        condition: &Expression,
        tables: &BTreeMap<TableName, TableName>,
    ) -> bool {
        Arc::ptr_eq(&self.database, candidate.database())
            && self.condition == *condition
            && self.tables == *tables
    }
}

/// Rewrites a relation's visible table names into a canonical form derived
/// from the underlying origins, with the deterministic first-seen numeric
/// suffix on repeats. Relations that differ only in alias spelling become
/// structurally identical.
fn canonicalize(relation: &PatternRelation) -> PatternRelation {
    let vendor = relation.database().vendor();
    let mut allocator = AliasAllocator::new();
    let mut renamer = Renamer::new();
    for (visible, origin) in relation.tree().base_tables() {
        let canonical = allocator.allocate(vendor, &origin);
        if canonical != visible {
            renamer = renamer.rename_table(visible, canonical);
        }
    }
    if renamer.is_empty() {
        relation.clone()
    } else {
        relation.rename(&renamer)
    }
}

enum Stage {
    /// A triple known without touching the database.
    Fixed(Triple),
    /// One statement whose rows are converted by every member.
    Query {
        database: Arc<Database>,
        statement: SelectStatement,
        members: Vec<PatternRelation>,
    },
    /// SQL generation failed; surfaces once through the iterator.
    Failed(RelGraphError),
}

fn emit_relations(members: Vec<PatternRelation>, stages: &mut Vec<Stage>) {
    let Some(first) = members.first() else {
        return;
    };
    if first.tree().is_trivial() {
        // No columns, exactly one row: every member yields its fixed triple.
        let probe = ResultRow::new(Vec::new(), Vec::new());
        for member in &members {
            if let (Some(subject), Some(predicate), Some(object)) = (
                member.subject().make_term(&probe),
                member.predicate().make_term(&probe),
                member.object().make_term(&probe),
            ) {
                stages.push(Stage::Fixed(Triple {
                    subject,
                    predicate,
                    object,
                }));
            }
        }
        return;
    }
    let database = first.database().clone();
    let vendor = database.vendor();
    let union: BTreeSet<ColumnName> = members
        .iter()
        .flat_map(|m| m.tree().projected_columns())
        .collect();
    let tree = RelationOp::project(
        first.tree().clone(),
        union.into_iter().collect(),
    );
    match generate_select(&tree, vendor) {
        Ok(statement) => stages.push(Stage::Query {
            database,
            statement,
            members,
        }),
        Err(e) => stages.push(Stage::Failed(e)),
    }
}

struct ActiveStage {
    rows: Vec<ResultRow>,
    members: Vec<PatternRelation>,
    row: usize,
    member: usize,
}

impl ActiveStage {
    fn next_triple(&mut self) -> Option<Triple> {
        while self.row < self.rows.len() {
            let row = &self.rows[self.row];
            while self.member < self.members.len() {
                let maker = &self.members[self.member];
                self.member += 1;
                let subject = maker.subject().make_term(row);
                let predicate = maker.predicate().make_term(row);
                let object = maker.object().make_term(row);
                // A rejected value (null column, failed constraint) means
                // this member contributes nothing for the row.
                if let (Some(subject), Some(predicate), Some(object)) =
                    (subject, predicate, object)
                {
                    return Some(Triple {
                        subject,
                        predicate,
                        object,
                    });
                }
            }
            self.member = 0;
            self.row += 1;
        }
        None
    }
}

/// Forward-only stream of matching triples. Each stage's SQL runs when the
/// iterator first reaches it. A fatal error is yielded once, after which
/// the iterator is exhausted; triples already yielded remain valid.
pub struct GraphIterator {
    stages: std::vec::IntoIter<Stage>,
    current: Option<ActiveStage>,
    done: bool,
}

impl GraphIterator {
    pub(crate) fn plan(
        relations: &[Arc<PatternRelation>],
        pattern: &TriplePattern,
    ) -> GraphIterator {
        build_plan(relations, pattern).execute()
    }
}

impl Iterator for GraphIterator {
    type Item = Result<Triple, RelGraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(active) = &mut self.current {
                if let Some(triple) = active.next_triple() {
                    return Some(Ok(triple));
                }
                self.current = None;
            }
            match self.stages.next() {
                None => return None,
                Some(Stage::Fixed(triple)) => return Some(Ok(triple)),
                Some(Stage::Failed(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Stage::Query {
                    database,
                    statement,
                    members,
                }) => match database.query(&statement) {
                    Ok(rows) => {
                        self.current = Some(ActiveStage {
                            rows,
                            members,
                            row: 0,
                            member: 0,
                        });
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{compile, RawMapping};

    fn two_rule_mapping(second_condition: &str) -> Vec<Arc<PatternRelation>> {
        let text = format!(
            r#"{{
              "databases": [{{"name": "db", "path": ":memory:"}}],
              "relations": [
                {{
                  "database": "db",
                  "table": "foo",
                  "subject": {{"iri_pattern": "http://ex/@@foo.id@@"}},
                  "predicate": {{"iri": "http://ex/name"}},
                  "object": {{"column": "foo.name"}}
                }},
                {{
                  "database": "db",
                  "table": "foo",
                  {second_condition}
                  "subject": {{"iri_pattern": "http://ex/@@foo.id@@"}},
                  "predicate": {{"iri": "http://ex/age"}},
                  "object": {{"column": "foo.age"}}
                }}
              ]
            }}"#
        );
        let raw = RawMapping::from_json(&text).unwrap();
        compile(raw).unwrap().relations().to_vec()
    }

    #[test]
    fn compatible_relations_share_one_statement() {
        let relations = two_rule_mapping("");
        let plan = build_plan(&relations, &TriplePattern::any());
        match plan {
            QueryPlan::CompatibleGroup(members) => assert_eq!(members.len(), 2),
            other => panic!("expected one group, got {other:?}"),
        }
    }

    #[test]
    fn differing_conditions_split_the_group() {
        let relations =
            two_rule_mapping(r#""conditions": [{"column": "foo.age", "equals": "30"}],"#);
        let plan = build_plan(&relations, &TriplePattern::any());
        match plan {
            QueryPlan::Sequence(plans) => {
                assert_eq!(plans.len(), 2);
                assert!(plans.iter().all(|p| matches!(p, QueryPlan::Single(_))));
            }
            other => panic!("expected two singles, got {other:?}"),
        }
    }

    #[test]
    fn non_unique_relations_never_merge() {
        let relations = two_rule_mapping(r#""unique": false,"#);
        let plan = build_plan(&relations, &TriplePattern::any());
        match plan {
            QueryPlan::Sequence(plans) => assert_eq!(plans.len(), 2),
            other => panic!("expected two singles, got {other:?}"),
        }
    }

    #[test]
    fn limited_relations_never_merge() {
        let relations = two_rule_mapping(r#""limit": 1,"#);
        let plan = build_plan(&relations, &TriplePattern::any());
        match plan {
            QueryPlan::Sequence(plans) => assert_eq!(plans.len(), 2),
            other => panic!("expected two singles, got {other:?}"),
        }
    }

    #[test]
    fn unmatchable_pattern_plans_empty() {
        let relations = two_rule_mapping("");
        let pattern = TriplePattern::new(
            None,
            Some(crate::nodes::Term::iri("http://ex/unknown")),
            None,
        );
        assert!(matches!(build_plan(&relations, &pattern), QueryPlan::Empty));
    }

    #[test]
    fn alias_spelling_does_not_block_grouping() {
        let text = r#"{
          "databases": [{"name": "db", "path": ":memory:"}],
          "relations": [
            {
              "database": "db",
              "table": "People",
              "aliases": [{"table": "People", "as": "p1"}],
              "joins": ["People.grp = p1.grp"],
              "subject": {"iri_pattern": "http://ex/@@People.id@@"},
              "predicate": {"iri": "http://ex/peer"},
              "object": {"iri_pattern": "http://ex/@@p1.id@@"}
            },
            {
              "database": "db",
              "table": "People",
              "aliases": [{"table": "People", "as": "q"}],
              "joins": ["People.grp = q.grp"],
              "subject": {"iri_pattern": "http://ex/@@People.id@@"},
              "predicate": {"iri": "http://ex/colleague"},
              "object": {"iri_pattern": "http://ex/@@q.id@@"}
            }
          ]
        }"#;
        let raw = RawMapping::from_json(text).unwrap();
        let relations = compile(raw).unwrap().relations().to_vec();
        let plan = build_plan(&relations, &TriplePattern::any());
        match plan {
            QueryPlan::CompatibleGroup(members) => assert_eq!(members.len(), 2),
            other => panic!("expected one group, got {other:?}"),
        }
    }
}
