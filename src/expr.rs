//! Boolean expression trees over column references.
//!
//! Expressions describe selection conditions symbolically. They are only
//! rendered to SQL text at generation time; until then they support column
//! substitution (for renaming) and partial evaluation to a boolean constant
//! when no column reference remains.

use std::collections::BTreeSet;

use crate::names::ColumnName;
use crate::rename::Renamer;
use crate::vendor::Vendor;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expression {
    True,
    False,
    /// A string constant.
    Constant(String),
    /// A reference to a column's value.
    Column(ColumnName),
    Equality(Box<Expression>, Box<Expression>),
    Conjunction(Vec<Expression>),
    Disjunction(Vec<Expression>),
    Negation(Box<Expression>),
    /// A raw SQL fragment with column placeholders. `parts` has exactly one
    /// more element than `columns`; columns are interleaved between parts.
    SqlFragment {
        parts: Vec<String>,
        columns: Vec<ColumnName>,
    },
}

impl Expression {
    pub fn is_true(&self) -> bool {
        matches!(self, Expression::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Expression::False)
    }

    /// Column = constant equality, the workhorse of selection pushdown.
    pub fn column_equals(column: ColumnName, value: &str) -> Expression {
        Expression::Equality(
            Box::new(Expression::Column(column)),
            Box::new(Expression::Constant(value.to_string())),
        )
    }

    /// Equality between two columns (join conditions).
    pub fn columns_equal(a: ColumnName, b: ColumnName) -> Expression {
        if a == b {
            return Expression::True;
        }
        Expression::Equality(
            Box::new(Expression::Column(a)),
            Box::new(Expression::Column(b)),
        )
    }

    /// Conjunction that flattens nested conjunctions, drops `True` operands
    /// and collapses to `False` if any operand is statically false.
    pub fn and(operands: impl IntoIterator<Item = Expression>) -> Expression {
        let mut flat = Vec::new();
        for op in operands {
            match op {
                Expression::True => {}
                Expression::False => return Expression::False,
                Expression::Conjunction(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => Expression::True,
            1 => flat.pop().unwrap_or(Expression::True),
            _ => Expression::Conjunction(flat),
        }
    }

    /// Disjunction with the dual simplifications of [`Expression::and`].
    pub fn or(operands: impl IntoIterator<Item = Expression>) -> Expression {
        let mut flat = Vec::new();
        for op in operands {
            match op {
                Expression::False => {}
                Expression::True => return Expression::True,
                Expression::Disjunction(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => Expression::False,
            1 => flat.pop().unwrap_or(Expression::False),
            _ => Expression::Disjunction(flat),
        }
    }

    pub fn negate(self) -> Expression {
        match self {
            Expression::True => Expression::False,
            Expression::False => Expression::True,
            Expression::Negation(inner) => *inner,
            other => Expression::Negation(Box::new(other)),
        }
    }

    /// All columns referenced anywhere in the expression.
    pub fn columns(&self) -> BTreeSet<ColumnName> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<ColumnName>) {
        match self {
            Expression::True | Expression::False | Expression::Constant(_) => {}
            Expression::Column(c) => {
                out.insert(c.clone());
            }
            Expression::Equality(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            Expression::Conjunction(ops) | Expression::Disjunction(ops) => {
                for op in ops {
                    op.collect_columns(out);
                }
            }
            Expression::Negation(inner) => inner.collect_columns(out),
            Expression::SqlFragment { columns, .. } => {
                out.extend(columns.iter().cloned());
            }
        }
    }

    /// Applies a column substitution, then re-simplifies through the smart
    /// constructors so partial evaluation opportunities are not lost.
    pub fn rename(&self, renamer: &Renamer) -> Expression {
        match self {
            Expression::True => Expression::True,
            Expression::False => Expression::False,
            Expression::Constant(v) => Expression::Constant(v.clone()),
            Expression::Column(c) => Expression::Column(renamer.apply_to_column(c)),
            Expression::Equality(a, b) => {
                Expression::equality(a.rename(renamer), b.rename(renamer))
            }
            Expression::Conjunction(ops) => {
                Expression::and(ops.iter().map(|op| op.rename(renamer)))
            }
            Expression::Disjunction(ops) => {
                Expression::or(ops.iter().map(|op| op.rename(renamer)))
            }
            Expression::Negation(inner) => inner.rename(renamer).negate(),
            Expression::SqlFragment { parts, columns } => Expression::SqlFragment {
                parts: parts.clone(),
                columns: columns.iter().map(|c| renamer.apply_to_column(c)).collect(),
            },
        }
    }

    /// Equality constructor with partial evaluation: two constants compare
    /// immediately, identical operands are trivially true.
    pub fn equality(a: Expression, b: Expression) -> Expression {
        match (&a, &b) {
            (Expression::Constant(x), Expression::Constant(y)) => {
                if x == y {
                    Expression::True
                } else {
                    Expression::False
                }
            }
            _ if a == b => Expression::True,
            _ => Expression::Equality(Box::new(a), Box::new(b)),
        }
    }

    /// Renders the expression as SQL text through the vendor's quoting.
    pub fn render(&self, vendor: Vendor) -> String {
        match self {
            Expression::True => "1=1".to_string(),
            Expression::False => "1=0".to_string(),
            Expression::Constant(v) => vendor.quote_string_literal(v),
            Expression::Column(c) => c.render(vendor),
            Expression::Equality(a, b) => {
                format!("{} = {}", a.render(vendor), b.render(vendor))
            }
            Expression::Conjunction(ops) => {
                let rendered: Vec<String> =
                    ops.iter().map(|op| format!("({})", op.render(vendor))).collect();
                rendered.join(" AND ")
            }
            Expression::Disjunction(ops) => {
                let rendered: Vec<String> =
                    ops.iter().map(|op| format!("({})", op.render(vendor))).collect();
                rendered.join(" OR ")
            }
            Expression::Negation(inner) => format!("NOT ({})", inner.render(vendor)),
            Expression::SqlFragment { parts, columns } => {
                let mut out = String::new();
                for (i, part) in parts.iter().enumerate() {
                    out.push_str(part);
                    if let Some(col) = columns.get(i) {
                        out.push_str(&col.render(vendor));
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::ColumnName;

    fn col(text: &str) -> ColumnName {
        ColumnName::parse(Vendor::Sqlite, text).unwrap()
    }

    #[test]
    fn and_flattens_and_short_circuits() {
        let a = Expression::column_equals(col("t.a"), "1");
        let b = Expression::column_equals(col("t.b"), "2");
        let nested = Expression::and([a.clone(), Expression::and([b.clone()])]);
        assert_eq!(nested, Expression::and([a.clone(), b.clone()]));
        assert!(Expression::and([a.clone(), Expression::False]).is_false());
        assert_eq!(Expression::and([Expression::True, a.clone()]), a);
        assert!(Expression::and([] as [Expression; 0]).is_true());
    }

    #[test]
    fn constant_equality_partially_evaluates() {
        let t = Expression::equality(
            Expression::Constant("x".into()),
            Expression::Constant("x".into()),
        );
        assert!(t.is_true());
        let f = Expression::equality(
            Expression::Constant("x".into()),
            Expression::Constant("y".into()),
        );
        assert!(f.is_false());
    }

    #[test]
    fn render_equality() {
        let e = Expression::column_equals(col("t.a"), "o'clock");
        assert_eq!(e.render(Vendor::Sqlite), "t.a = 'o''clock'");
    }

    #[test]
    fn sql_fragment_interleaves_columns() {
        let e = Expression::SqlFragment {
            parts: vec!["LENGTH(".into(), ") > 3".into()],
            columns: vec![col("t.a")],
        };
        assert_eq!(e.render(Vendor::Sqlite), "LENGTH(t.a) > 3");
        assert!(e.columns().contains(&col("t.a")));
    }

    #[test]
    fn negation_involution() {
        let e = Expression::column_equals(col("t.a"), "1");
        assert_eq!(e.clone().negate().negate(), e);
        assert!(Expression::True.negate().is_false());
    }
}
