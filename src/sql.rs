//! SQL SELECT text generation from operator trees.
//!
//! [`generate_select`] walks a [`RelationOp`] tree bottom-up and collapses
//! contiguous Table / Alias / Select / Join / Project / Order / Limit runs
//! into a single SELECT level. An Order or Limit beneath a Join cannot share
//! that level, so the scoped operand becomes a parenthesized sub-select.
//! Generation is pure string work; no connection is touched here.

use std::sync::Arc;

use ahash::AHashMap;

use crate::algebra::RelationOp;
use crate::errors::RelGraphError;
use crate::expr::Expression;
use crate::names::{ColumnName, TableName};
use crate::vendor::Vendor;

/// A generated statement plus the ordered columns of its result set, so
/// each row position can be mapped back to the column it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectStatement {
    pub sql: String,
    pub columns: Vec<ColumnName>,
}

/// One item in a FROM clause.
enum FromItem {
    Table {
        table: TableName,
        alias: Option<TableName>,
    },
    SubSelect {
        sql: String,
        alias: TableName,
    },
}

impl FromItem {
    fn visible(&self) -> &TableName {
        match self {
            FromItem::Table { table, alias } => alias.as_ref().unwrap_or(table),
            FromItem::SubSelect { alias, .. } => alias,
        }
    }

    fn render(&self, vendor: Vendor) -> String {
        match self {
            FromItem::Table { table, alias: None } => table.render(vendor),
            FromItem::Table {
                table,
                alias: Some(alias),
            } if alias == table => table.render(vendor),
            FromItem::Table {
                table,
                alias: Some(alias),
            } => format!(
                "{} {} {}",
                table.render(vendor),
                vendor.alias_keyword(),
                alias.render(vendor)
            ),
            FromItem::SubSelect { sql, alias } => format!(
                "({sql}) {} {}",
                vendor.alias_keyword(),
                alias.render(vendor)
            ),
        }
    }
}

#[derive(Default)]
struct QueryParts {
    from: Vec<FromItem>,
    conditions: Vec<Expression>,
    columns: Vec<ColumnName>,
    /// Whether a projection has been seen; an empty outermost projection
    /// still decides the SELECT list.
    columns_set: bool,
    order: Vec<(ColumnName, bool)>,
    limit: Option<u64>,
}

/// Generates a single SELECT statement for the tree.
///
/// `Empty` and `Trivial` trees still produce runnable SQL (a contradiction
/// probe and a one-row probe respectively), though the executor normally
/// short-circuits them without calling here.
pub fn generate_select(
    op: &Arc<RelationOp>,
    vendor: Vendor,
) -> Result<SelectStatement, RelGraphError> {
    if op.is_statically_empty() {
        return Ok(SelectStatement {
            sql: "SELECT 1 WHERE 1=0".to_string(),
            columns: Vec::new(),
        });
    }
    let mut parts = QueryParts::default();
    collect(op, vendor, &mut parts)?;
    Ok(render_parts(&parts, vendor))
}

fn render_parts(parts: &QueryParts, vendor: Vendor) -> SelectStatement {
    let mut sql = String::from("SELECT ");
    sql.push_str(&vendor.select_modifier(parts.limit));
    if parts.columns.is_empty() {
        sql.push('1');
    } else {
        let rendered: Vec<String> = parts
            .columns
            .iter()
            .map(|c| c.render(vendor))
            .collect();
        sql.push_str(&rendered.join(", "));
    }
    if !parts.from.is_empty() {
        sql.push_str(" FROM ");
        let rendered: Vec<String> = parts.from.iter().map(|f| f.render(vendor)).collect();
        sql.push_str(&rendered.join(", "));
    }
    let condition = Expression::and(parts.conditions.iter().cloned());
    if !condition.is_true() {
        sql.push_str(" WHERE ");
        sql.push_str(&condition.render(vendor));
    }
    if !parts.order.is_empty() {
        sql.push_str(" ORDER BY ");
        let rendered: Vec<String> = parts
            .order
            .iter()
            .map(|(c, desc)| {
                if *desc {
                    format!("{} DESC", c.render(vendor))
                } else {
                    c.render(vendor)
                }
            })
            .collect();
        sql.push_str(&rendered.join(", "));
    }
    sql.push_str(&vendor.limit_clause(parts.limit));
    SelectStatement {
        sql,
        columns: parts.columns.clone(),
    }
}

fn collect(
    op: &Arc<RelationOp>,
    vendor: Vendor,
    parts: &mut QueryParts,
) -> Result<(), RelGraphError> {
    match &**op {
        RelationOp::Empty => {
            parts.conditions.push(Expression::False);
        }
        RelationOp::Trivial => {}
        RelationOp::Table { name } => {
            parts.from.push(FromItem::Table {
                table: name.clone(),
                alias: None,
            });
        }
        RelationOp::Alias { child, from, to } => {
            // Collect the subtree separately so the alias attaches to its
            // own occurrence, not to an identically named table elsewhere
            // in the enclosing FROM list.
            let mut inner = QueryParts::default();
            collect(child, vendor, &mut inner)?;
            let item = inner
                .from
                .iter_mut()
                .find(|item| item.visible() == from)
                .ok_or_else(|| {
                    RelGraphError::mapping(format!(
                        "alias target \"{}\" is not a visible table",
                        from.qualified()
                    ))
                })?;
            match item {
                FromItem::Table { alias, .. } => *alias = Some(to.clone()),
                FromItem::SubSelect { alias, .. } => *alias = to.clone(),
            }
            merge_parts(parts, inner);
        }
        RelationOp::Select { child, condition } => {
            parts.conditions.push(condition.clone());
            collect(child, vendor, parts)?;
        }
        RelationOp::Project { child, columns } => {
            // The outermost projection wins; anything projected below it
            // is superseded.
            if !parts.columns_set {
                parts.columns = columns.clone();
                parts.columns_set = true;
            }
            collect(child, vendor, parts)?;
        }
        RelationOp::Join {
            left,
            right,
            condition,
        } => {
            parts.conditions.push(condition.clone());
            collect_join_operand(left, vendor, parts)?;
            collect_join_operand(right, vendor, parts)?;
        }
        RelationOp::Order { child, by } => {
            if parts.order.is_empty() {
                parts.order = by.clone();
            }
            collect(child, vendor, parts)?;
        }
        RelationOp::Limit { child, n } => {
            parts.limit = Some(match parts.limit {
                Some(existing) => existing.min(*n),
                None => *n,
            });
            collect(child, vendor, parts)?;
        }
    }
    Ok(())
}

fn merge_parts(outer: &mut QueryParts, inner: QueryParts) {
    outer.from.extend(inner.from);
    outer.conditions.extend(inner.conditions);
    if !outer.columns_set {
        outer.columns = inner.columns;
        outer.columns_set = inner.columns_set;
    }
    if outer.order.is_empty() {
        outer.order = inner.order;
    }
    outer.limit = match (outer.limit, inner.limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
}

/// A join operand that carries its own Order or Limit cannot be flattened
/// into the enclosing level; it becomes a sub-select under its visible name.
fn collect_join_operand(
    op: &Arc<RelationOp>,
    vendor: Vendor,
    parts: &mut QueryParts,
) -> Result<(), RelGraphError> {
    if !op.has_row_scoping() {
        return collect(op, vendor, parts);
    }
    let base = op.base_tables();
    if base.len() != 1 {
        return Err(RelGraphError::mapping(
            "row-limited join operand must expose exactly one table",
        ));
    }
    let visible = base
        .keys()
        .next()
        .cloned()
        .ok_or_else(|| RelGraphError::mapping("join operand has no base table"))?;
    let mut inner_columns: Vec<ColumnName> = op.projected_columns();
    if inner_columns.is_empty() {
        inner_columns = op.referenced_columns().into_iter().collect();
    }
    let inner = generate_select(
        &RelationOp::project(op.clone(), inner_columns),
        vendor,
    )?;
    // The sub-select keeps the operand's visible name, so outer references
    // to its columns resolve unchanged.
    parts.from.push(FromItem::SubSelect {
        sql: inner.sql,
        alias: visible,
    });
    Ok(())
}

/// One materialized result row, addressable by column name.
#[derive(Clone, Debug)]
pub struct ResultRow {
    values: Vec<Option<String>>,
    index: AHashMap<ColumnName, usize>,
}

impl ResultRow {
    pub fn new(columns: Vec<ColumnName>, values: Vec<Option<String>>) -> ResultRow {
        let index = columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| (c, i))
            .collect();
        ResultRow { values, index }
    }

    /// The value of `column`, or None when the column is absent or null.
    pub fn get(&self, column: &ColumnName) -> Option<&str> {
        let i = *self.index.get(column)?;
        self.values.get(i)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> TableName {
        TableName::parse(Vendor::Sqlite, text).unwrap()
    }

    fn col(text: &str) -> ColumnName {
        ColumnName::parse(Vendor::Sqlite, text).unwrap()
    }

    #[test]
    fn simple_select_with_condition() {
        let tree = RelationOp::project(
            RelationOp::select(
                RelationOp::table(table("foo")),
                Expression::column_equals(col("foo.col1"), "1"),
            ),
            vec![col("foo.col2")],
        );
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT foo.col2 FROM foo WHERE foo.col1 = '1'"
        );
        assert_eq!(stmt.columns, vec![col("foo.col2")]);
    }

    #[test]
    fn self_join_renders_two_aliases() {
        let people = table("People");
        let p1 = RelationOp::alias(
            RelationOp::table(people.clone()),
            people.clone(),
            table("p1"),
        );
        let p2 = RelationOp::alias(
            RelationOp::table(people.clone()),
            people.clone(),
            table("p2"),
        );
        let tree = RelationOp::project(
            RelationOp::join(
                p1,
                p2,
                Expression::columns_equal(col("p1.grp"), col("p2.grp")),
            ),
            vec![col("p1.name"), col("p2.name")],
        );
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT p1.name, p2.name FROM People AS p1, People AS p2 \
             WHERE p1.grp = p2.grp"
        );
    }

    #[test]
    fn alias_attaches_to_its_own_occurrence() {
        let people = table("People");
        let tree = RelationOp::project(
            RelationOp::join(
                RelationOp::table(people.clone()),
                RelationOp::alias(RelationOp::table(people.clone()), people, table("p2")),
                Expression::columns_equal(col("People.grp"), col("p2.grp")),
            ),
            vec![col("People.id"), col("p2.id")],
        );
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT People.id, p2.id FROM People, People AS p2 \
             WHERE People.grp = p2.grp"
        );
    }

    #[test]
    fn limit_and_order_share_the_level() {
        let tree = RelationOp::limit(
            RelationOp::order(
                RelationOp::project(RelationOp::table(table("t")), vec![col("t.a")]),
                vec![(col("t.a"), true)],
            ),
            5,
        );
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT t.a FROM t ORDER BY t.a DESC LIMIT 5"
        );
    }

    #[test]
    fn sqlserver_uses_top() {
        let tree = RelationOp::limit(
            RelationOp::project(RelationOp::table(table("t")), vec![col("t.a")]),
            3,
        );
        let stmt = generate_select(&tree, Vendor::SqlServer).unwrap();
        assert_eq!(stmt.sql, "SELECT TOP 3 t.a FROM t");
    }

    #[test]
    fn limited_join_operand_becomes_subselect() {
        let limited = RelationOp::limit(
            RelationOp::project(RelationOp::table(table("a")), vec![col("a.k")]),
            1,
        );
        let tree = RelationOp::project(
            RelationOp::join(
                limited,
                RelationOp::table(table("b")),
                Expression::columns_equal(col("a.k"), col("b.k")),
            ),
            vec![col("b.v")],
        );
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT b.v FROM (SELECT a.k FROM a LIMIT 1) AS a, b WHERE a.k = b.k"
        );
    }

    #[test]
    fn empty_projection_probes_one() {
        let tree = RelationOp::project(RelationOp::table(table("t")), vec![]);
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(stmt.sql, "SELECT 1 FROM t");
        assert!(stmt.columns.is_empty());
    }

    #[test]
    fn empty_outer_projection_supersedes_inner_projection() {
        // Specializing a relation to a fully bound pattern stacks an empty
        // projection above the original one; the probe must not pick up the
        // inner column list.
        let inner = RelationOp::project(RelationOp::table(table("foo")), vec![col("foo.col1")]);
        let selected = RelationOp::select(inner, Expression::column_equals(col("foo.col1"), "7"));
        let tree = RelationOp::project(RelationOp::limit(selected, 1), vec![]);
        let stmt = generate_select(&tree, Vendor::Sqlite).unwrap();
        assert_eq!(stmt.sql, "SELECT 1 FROM foo WHERE foo.col1 = '7' LIMIT 1");
        assert!(stmt.columns.is_empty());
    }

    #[test]
    fn quoted_names_requote_per_vendor() {
        let tree = RelationOp::project(
            RelationOp::table(TableName::parse(Vendor::Mysql, "`we`` ird`").unwrap()),
            vec![ColumnName::parse(Vendor::Mysql, "`we`` ird`.c").unwrap()],
        );
        let stmt = generate_select(&tree, Vendor::Mysql).unwrap();
        assert_eq!(stmt.sql, "SELECT `we`` ird`.c FROM `we`` ird`");
    }

    #[test]
    fn result_row_lookup() {
        let row = ResultRow::new(
            vec![col("t.a"), col("t.b")],
            vec![Some("1".to_string()), None],
        );
        assert_eq!(row.get(&col("t.a")), Some("1"));
        assert_eq!(row.get(&col("t.b")), None);
        assert_eq!(row.get(&col("t.c")), None);
    }
}
