//! Relational algebra operator trees.
//!
//! A [`RelationOp`] tree is the symbolic form of a SQL-equivalent query.
//! Trees are persistent: every transformation returns a new tree sharing
//! unmodified subtrees through `Arc`, and no node is ever mutated in place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::expr::Expression;
use crate::names::{ColumnName, TableName};
use crate::rename::Renamer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationOp {
    /// Produces zero rows. Needs no SQL round-trip.
    Empty,
    /// Produces exactly one row with no columns. Needs no SQL round-trip.
    Trivial,
    /// A physical base table.
    Table { name: TableName },
    /// The child relation visible under a different table name.
    Alias {
        child: Arc<RelationOp>,
        from: TableName,
        to: TableName,
    },
    Select {
        child: Arc<RelationOp>,
        condition: Expression,
    },
    Project {
        child: Arc<RelationOp>,
        columns: Vec<ColumnName>,
    },
    Join {
        left: Arc<RelationOp>,
        right: Arc<RelationOp>,
        condition: Expression,
    },
    /// Sort by columns; the flag is `true` for descending order.
    Order {
        child: Arc<RelationOp>,
        by: Vec<(ColumnName, bool)>,
    },
    Limit { child: Arc<RelationOp>, n: u64 },
}

impl RelationOp {
    pub fn table(name: TableName) -> Arc<RelationOp> {
        Arc::new(RelationOp::Table { name })
    }

    /// Wraps with a Select node, fusing consecutive Selects into one
    /// conjunction. A statically false condition collapses to Empty.
    pub fn select(tree: Arc<RelationOp>, condition: Expression) -> Arc<RelationOp> {
        if condition.is_true() {
            return tree;
        }
        if condition.is_false() || tree.is_statically_empty() {
            return Arc::new(RelationOp::Empty);
        }
        if let RelationOp::Select {
            child,
            condition: existing,
        } = &*tree
        {
            let fused = Expression::and([existing.clone(), condition]);
            return RelationOp::select(child.clone(), fused);
        }
        Arc::new(RelationOp::Select {
            child: tree,
            condition,
        })
    }

    /// Projects to `columns`. A no-op when the tree already projects exactly
    /// this set; an existing Project is replaced rather than nested, so a
    /// sub-select is never introduced.
    pub fn project(tree: Arc<RelationOp>, columns: Vec<ColumnName>) -> Arc<RelationOp> {
        if tree.is_statically_empty() {
            return Arc::new(RelationOp::Empty);
        }
        if let RelationOp::Project { child, columns: existing } = &*tree {
            if *existing == columns {
                return tree;
            }
            return Arc::new(RelationOp::Project {
                child: child.clone(),
                columns,
            });
        }
        Arc::new(RelationOp::Project {
            child: tree,
            columns,
        })
    }

    pub fn join(
        left: Arc<RelationOp>,
        right: Arc<RelationOp>,
        condition: Expression,
    ) -> Arc<RelationOp> {
        if condition.is_false() || left.is_statically_empty() || right.is_statically_empty() {
            return Arc::new(RelationOp::Empty);
        }
        Arc::new(RelationOp::Join {
            left,
            right,
            condition,
        })
    }

    /// Makes the child visible under the table name `to`.
    pub fn alias(tree: Arc<RelationOp>, from: TableName, to: TableName) -> Arc<RelationOp> {
        if from == to {
            return tree;
        }
        Arc::new(RelationOp::Alias {
            child: tree,
            from,
            to,
        })
    }

    /// Limits the row count, keeping the smaller of two stacked limits.
    pub fn limit(tree: Arc<RelationOp>, n: u64) -> Arc<RelationOp> {
        if n == 0 || tree.is_statically_empty() {
            return Arc::new(RelationOp::Empty);
        }
        if let RelationOp::Limit { child, n: existing } = &*tree {
            return Arc::new(RelationOp::Limit {
                child: child.clone(),
                n: n.min(*existing),
            });
        }
        Arc::new(RelationOp::Limit { child: tree, n })
    }

    pub fn order(tree: Arc<RelationOp>, by: Vec<(ColumnName, bool)>) -> Arc<RelationOp> {
        if by.is_empty() {
            return tree;
        }
        Arc::new(RelationOp::Order { child: tree, by })
    }

    /// True when the tree can produce no rows at all, so the executor can
    /// skip the database entirely.
    pub fn is_statically_empty(&self) -> bool {
        match self {
            RelationOp::Empty => true,
            RelationOp::Select { child, condition } => {
                condition.is_false() || child.is_statically_empty()
            }
            RelationOp::Join { left, right, condition } => {
                condition.is_false()
                    || left.is_statically_empty()
                    || right.is_statically_empty()
            }
            RelationOp::Alias { child, .. }
            | RelationOp::Project { child, .. }
            | RelationOp::Order { child, .. } => child.is_statically_empty(),
            RelationOp::Limit { child, n } => *n == 0 || child.is_statically_empty(),
            _ => false,
        }
    }

    /// True when the tree is known to produce exactly one row with no
    /// columns, so a query yields its one result without touching the
    /// database.
    pub fn is_trivial(&self) -> bool {
        match self {
            RelationOp::Trivial => true,
            RelationOp::Select { child, condition } => {
                condition.is_true() && child.is_trivial()
            }
            RelationOp::Project { child, columns } => columns.is_empty() && child.is_trivial(),
            RelationOp::Alias { child, .. } => child.is_trivial(),
            RelationOp::Limit { child, n } => *n >= 1 && child.is_trivial(),
            _ => false,
        }
    }

    /// Maps each visible table name to the underlying physical table it
    /// stands for. For unaliased tables the two coincide.
    pub fn base_tables(&self) -> BTreeMap<TableName, TableName> {
        let mut out = BTreeMap::new();
        self.collect_base_tables(&mut out);
        out
    }

    fn collect_base_tables(&self, out: &mut BTreeMap<TableName, TableName>) {
        match self {
            RelationOp::Table { name } => {
                out.insert(name.clone(), name.clone());
            }
            RelationOp::Alias { child, from, to } => {
                let mut inner = BTreeMap::new();
                child.collect_base_tables(&mut inner);
                for (visible, origin) in inner {
                    if visible == *from {
                        out.insert(to.clone(), origin);
                    } else {
                        out.insert(visible, origin);
                    }
                }
            }
            RelationOp::Join { left, right, .. } => {
                left.collect_base_tables(out);
                right.collect_base_tables(out);
            }
            RelationOp::Select { child, .. }
            | RelationOp::Project { child, .. }
            | RelationOp::Order { child, .. }
            | RelationOp::Limit { child, .. } => child.collect_base_tables(out),
            RelationOp::Empty | RelationOp::Trivial => {}
        }
    }

    /// The conjunction of every Select and Join condition in the tree,
    /// written against visible table names.
    pub fn condition(&self) -> Expression {
        let mut conjuncts = Vec::new();
        self.collect_conditions(&mut conjuncts);
        Expression::and(conjuncts)
    }

    fn collect_conditions(&self, out: &mut Vec<Expression>) {
        match self {
            RelationOp::Select { child, condition } => {
                out.push(condition.clone());
                child.collect_conditions(out);
            }
            RelationOp::Join { left, right, condition } => {
                out.push(condition.clone());
                left.collect_conditions(out);
                right.collect_conditions(out);
            }
            RelationOp::Alias { child, .. }
            | RelationOp::Project { child, .. }
            | RelationOp::Order { child, .. }
            | RelationOp::Limit { child, .. } => child.collect_conditions(out),
            _ => {}
        }
    }

    /// Columns delivered by the outermost projection, if any.
    pub fn projected_columns(&self) -> Vec<ColumnName> {
        match self {
            RelationOp::Project { columns, .. } => columns.clone(),
            RelationOp::Select { child, .. }
            | RelationOp::Alias { child, .. }
            | RelationOp::Order { child, .. }
            | RelationOp::Limit { child, .. } => child.projected_columns(),
            _ => Vec::new(),
        }
    }

    /// True when the tree carries an Order or Limit node anywhere. Such
    /// relations must not be merged with others.
    pub fn has_row_scoping(&self) -> bool {
        match self {
            RelationOp::Order { .. } | RelationOp::Limit { .. } => true,
            RelationOp::Select { child, .. }
            | RelationOp::Alias { child, .. }
            | RelationOp::Project { child, .. } => child.has_row_scoping(),
            RelationOp::Join { left, right, .. } => {
                left.has_row_scoping() || right.has_row_scoping()
            }
            _ => false,
        }
    }

    /// Every column the tree itself mentions in conditions, projections and
    /// orderings, expressed in visible names.
    pub fn referenced_columns(&self) -> BTreeSet<ColumnName> {
        let mut out = self.condition().columns();
        out.extend(self.projected_columns());
        self.collect_order_columns(&mut out);
        out
    }

    fn collect_order_columns(&self, out: &mut BTreeSet<ColumnName>) {
        match self {
            RelationOp::Order { child, by } => {
                out.extend(by.iter().map(|(c, _)| c.clone()));
                child.collect_order_columns(out);
            }
            RelationOp::Select { child, .. }
            | RelationOp::Alias { child, .. }
            | RelationOp::Project { child, .. }
            | RelationOp::Limit { child, .. } => child.collect_order_columns(out),
            RelationOp::Join { left, right, .. } => {
                left.collect_order_columns(out);
                right.collect_order_columns(out);
            }
            _ => {}
        }
    }

    /// Rewrites visible table names throughout the tree. Renaming an
    /// unaliased base table introduces an Alias node, so the physical table
    /// referenced by the query is preserved.
    pub fn rename(tree: &Arc<RelationOp>, renamer: &Renamer) -> Arc<RelationOp> {
        if renamer.is_empty() {
            return tree.clone();
        }
        match &**tree {
            RelationOp::Empty | RelationOp::Trivial => tree.clone(),
            RelationOp::Table { name } => {
                let renamed = renamer.apply_to_table(name);
                if renamed == *name {
                    tree.clone()
                } else {
                    Arc::new(RelationOp::Alias {
                        child: tree.clone(),
                        from: name.clone(),
                        to: renamed,
                    })
                }
            }
            RelationOp::Alias { child, from, to } => Arc::new(RelationOp::Alias {
                child: child.clone(),
                from: from.clone(),
                to: renamer.apply_to_table(to),
            }),
            RelationOp::Select { child, condition } => Arc::new(RelationOp::Select {
                child: RelationOp::rename(child, renamer),
                condition: condition.rename(renamer),
            }),
            RelationOp::Project { child, columns } => Arc::new(RelationOp::Project {
                child: RelationOp::rename(child, renamer),
                columns: columns.iter().map(|c| renamer.apply_to_column(c)).collect(),
            }),
            RelationOp::Join { left, right, condition } => Arc::new(RelationOp::Join {
                left: RelationOp::rename(left, renamer),
                right: RelationOp::rename(right, renamer),
                condition: condition.rename(renamer),
            }),
            RelationOp::Order { child, by } => Arc::new(RelationOp::Order {
                child: RelationOp::rename(child, renamer),
                by: by
                    .iter()
                    .map(|(c, desc)| (renamer.apply_to_column(c), *desc))
                    .collect(),
            }),
            RelationOp::Limit { child, n } => Arc::new(RelationOp::Limit {
                child: RelationOp::rename(child, renamer),
                n: *n,
            }),
        }
    }
}
