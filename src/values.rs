//! Value makers: rules that translate between database cell values and the
//! string values carried by graph terms.
//!
//! Each maker knows three things: which columns it reads, how to extract its
//! value from a materialized row, and how to turn a concrete value back into
//! a selection expression (selection pushdown). All kinds are closed
//! variants of [`ValueMaker`]; shared behaviour lives in its methods.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use regex::Regex;

use crate::errors::RelGraphError;
use crate::expr::Expression;
use crate::names::ColumnName;
use crate::rename::Renamer;
use crate::sql::ResultRow;
use crate::vendor::Vendor;

/// Delimiter for column placeholders in templates and for the segments of a
/// synthesized blank node identifier.
pub const PLACEHOLDER_DELIMITER: &str = "@@";

#[derive(Clone, Debug, PartialEq)]
pub enum ValueMaker {
    /// Always produces the same value.
    Constant(String),
    /// The raw value of one column.
    Column(ColumnName),
    /// A literal template with embedded column placeholders.
    Pattern(ValuePattern),
    /// A deterministic identifier built from a class-map id and one or more
    /// column values, delimited by [`PLACEHOLDER_DELIMITER`].
    BlankNodeId {
        class_map: String,
        columns: Vec<ColumnName>,
    },
    /// Values passed through a finite bidirectional lookup table.
    Translated {
        base: Box<ValueMaker>,
        table: Arc<TranslationTable>,
    },
    /// A wrapped maker with extra validity predicates.
    Decorated {
        base: Box<ValueMaker>,
        constraints: Vec<ValueConstraint>,
    },
}

impl ValueMaker {
    /// The set of columns this maker reads.
    pub fn columns(&self) -> BTreeSet<ColumnName> {
        match self {
            ValueMaker::Constant(_) => BTreeSet::new(),
            ValueMaker::Column(c) => BTreeSet::from([c.clone()]),
            ValueMaker::Pattern(p) => p.columns.iter().cloned().collect(),
            ValueMaker::BlankNodeId { columns, .. } => columns.iter().cloned().collect(),
            ValueMaker::Translated { base, .. } | ValueMaker::Decorated { base, .. } => {
                base.columns()
            }
        }
    }

    /// Extracts the value from a row. None when any required column is null
    /// or a constraint/translation rejects the underlying value.
    pub fn extract(&self, row: &ResultRow) -> Option<String> {
        match self {
            ValueMaker::Constant(v) => Some(v.clone()),
            ValueMaker::Column(c) => row.get(c).map(|s| s.to_string()),
            ValueMaker::Pattern(p) => p.extract(row),
            ValueMaker::BlankNodeId { class_map, columns } => {
                let mut out = class_map.clone();
                for column in columns {
                    out.push_str(PLACEHOLDER_DELIMITER);
                    out.push_str(row.get(column)?);
                }
                Some(out)
            }
            ValueMaker::Translated { base, table } => {
                table.to_graph(&base.extract(row)?).map(|s| s.to_string())
            }
            ValueMaker::Decorated { base, constraints } => {
                let value = base.extract(row)?;
                if constraints.iter().all(|c| c.accepts(&value)) {
                    Some(value)
                } else {
                    None
                }
            }
        }
    }

    /// A selection expression that restricts rows to those for which this
    /// maker would produce `value`. `Expression::False` when the maker
    /// cannot produce it at all.
    pub fn matches_expression(&self, value: &str) -> Expression {
        match self {
            ValueMaker::Constant(v) => {
                if v == value {
                    Expression::True
                } else {
                    Expression::False
                }
            }
            ValueMaker::Column(c) => Expression::column_equals(c.clone(), value),
            ValueMaker::Pattern(p) => p.matches_expression(value),
            ValueMaker::BlankNodeId { class_map, columns } => {
                let parts: Vec<&str> = value.split(PLACEHOLDER_DELIMITER).collect();
                if parts.len() != columns.len() + 1 || parts[0] != class_map {
                    return Expression::False;
                }
                Expression::and(
                    columns
                        .iter()
                        .zip(&parts[1..])
                        .map(|(c, v)| Expression::column_equals(c.clone(), v)),
                )
            }
            ValueMaker::Translated { base, table } => match table.to_db(value) {
                Some(db_value) => base.matches_expression(db_value),
                None => Expression::False,
            },
            ValueMaker::Decorated { base, constraints } => {
                if constraints.iter().all(|c| c.accepts(value)) {
                    base.matches_expression(value)
                } else {
                    Expression::False
                }
            }
        }
    }

    pub fn rename(&self, renamer: &Renamer) -> ValueMaker {
        match self {
            ValueMaker::Constant(v) => ValueMaker::Constant(v.clone()),
            ValueMaker::Column(c) => ValueMaker::Column(renamer.apply_to_column(c)),
            ValueMaker::Pattern(p) => ValueMaker::Pattern(p.rename(renamer)),
            ValueMaker::BlankNodeId { class_map, columns } => ValueMaker::BlankNodeId {
                class_map: class_map.clone(),
                columns: columns.iter().map(|c| renamer.apply_to_column(c)).collect(),
            },
            ValueMaker::Translated { base, table } => ValueMaker::Translated {
                base: Box::new(base.rename(renamer)),
                table: table.clone(),
            },
            ValueMaker::Decorated { base, constraints } => ValueMaker::Decorated {
                base: Box::new(base.rename(renamer)),
                constraints: constraints.clone(),
            },
        }
    }
}

/// A literal template with `@@table.column@@` placeholders.
#[derive(Clone, Debug)]
pub struct ValuePattern {
    template: String,
    first_literal: String,
    columns: Vec<ColumnName>,
    /// Literal text following each column, same length as `columns`.
    literals: Vec<String>,
    regex: Regex,
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.first_literal == other.first_literal
            && self.columns == other.columns
            && self.literals == other.literals
    }
}

impl ValuePattern {
    pub fn parse(vendor: Vendor, template: &str) -> Result<ValuePattern, RelGraphError> {
        let mut columns = Vec::new();
        let mut literals = Vec::new();
        let mut segments = template.split(PLACEHOLDER_DELIMITER);
        let first_literal = segments
            .next()
            .unwrap_or_default()
            .to_string();
        let mut rest: Vec<&str> = segments.collect();
        if rest.len() % 2 != 0 {
            return Err(RelGraphError::mapping(format!(
                "unbalanced placeholder delimiters in template \"{template}\""
            )));
        }
        let mut regex_text = format!("^{}", regex::escape(&first_literal));
        while !rest.is_empty() {
            let column_text = rest.remove(0);
            let literal = rest.remove(0).to_string();
            columns.push(ColumnName::parse(vendor, column_text)?);
            regex_text.push_str("(.*?)");
            regex_text.push_str(&regex::escape(&literal));
            literals.push(literal);
        }
        regex_text.push('$');
        let regex = Regex::new(&regex_text)
            .map_err(|e| RelGraphError::mapping(format!("bad template regex: {e}")))?;
        Ok(ValuePattern {
            template: template.to_string(),
            first_literal,
            columns,
            literals,
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn extract(&self, row: &ResultRow) -> Option<String> {
        let mut out = self.first_literal.clone();
        for (column, literal) in self.columns.iter().zip(&self.literals) {
            out.push_str(row.get(column)?);
            out.push_str(literal);
        }
        Some(out)
    }

    /// Decomposes `value` against the template. False when the literal
    /// parts do not match; otherwise one equality per placeholder.
    fn matches_expression(&self, value: &str) -> Expression {
        let Some(captures) = self.regex.captures(value) else {
            return Expression::False;
        };
        Expression::and(self.columns.iter().enumerate().map(|(i, column)| {
            match captures.get(i + 1) {
                Some(m) => Expression::column_equals(column.clone(), m.as_str()),
                None => Expression::False,
            }
        }))
    }

    fn rename(&self, renamer: &Renamer) -> ValuePattern {
        let columns: Vec<ColumnName> =
            self.columns.iter().map(|c| renamer.apply_to_column(c)).collect();
        let mut template = self.first_literal.clone();
        for (column, literal) in columns.iter().zip(&self.literals) {
            template.push_str(PLACEHOLDER_DELIMITER);
            template.push_str(&column.qualified());
            template.push_str(PLACEHOLDER_DELIMITER);
            template.push_str(literal);
        }
        ValuePattern {
            template,
            first_literal: self.first_literal.clone(),
            columns,
            literals: self.literals.clone(),
            regex: self.regex.clone(),
        }
    }
}

/// A validity predicate attached to a decorated maker.
#[derive(Clone, Debug)]
pub enum ValueConstraint {
    MaxLength(usize),
    Contains(String),
    Regex(Regex),
}

impl PartialEq for ValueConstraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueConstraint::MaxLength(a), ValueConstraint::MaxLength(b)) => a == b,
            (ValueConstraint::Contains(a), ValueConstraint::Contains(b)) => a == b,
            (ValueConstraint::Regex(a), ValueConstraint::Regex(b)) => {
                a.as_str() == b.as_str()
            }
            _ => false,
        }
    }
}

impl ValueConstraint {
    pub fn regex(pattern: &str) -> Result<ValueConstraint, RelGraphError> {
        Regex::new(pattern)
            .map(ValueConstraint::Regex)
            .map_err(|e| RelGraphError::mapping(format!("bad constraint regex: {e}")))
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueConstraint::MaxLength(n) => value.chars().count() <= *n,
            ValueConstraint::Contains(sub) => value.contains(sub.as_str()),
            ValueConstraint::Regex(re) => re.is_match(value),
        }
    }
}

/// A finite, bidirectional lookup between database values and graph values.
#[derive(Debug, Default, PartialEq)]
pub struct TranslationTable {
    db_to_graph: AHashMap<String, String>,
    graph_to_db: AHashMap<String, String>,
}

impl TranslationTable {
    pub fn from_pairs<I, A, B>(pairs: I) -> TranslationTable
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut table = TranslationTable::default();
        for (db, graph) in pairs {
            let db = db.into();
            let graph = graph.into();
            table.db_to_graph.insert(db.clone(), graph.clone());
            table.graph_to_db.insert(graph, db);
        }
        table
    }

    pub fn to_graph(&self, db_value: &str) -> Option<&str> {
        self.db_to_graph.get(db_value).map(|s| s.as_str())
    }

    pub fn to_db(&self, graph_value: &str) -> Option<&str> {
        self.graph_to_db.get(graph_value).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.db_to_graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db_to_graph.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::TableName;

    fn col(text: &str) -> ColumnName {
        ColumnName::parse(Vendor::Sqlite, text).unwrap()
    }

    fn row(columns: &[&str], values: &[Option<&str>]) -> ResultRow {
        ResultRow::new(
            columns.iter().map(|c| col(c)).collect(),
            values.iter().map(|v| v.map(|s| s.to_string())).collect(),
        )
    }

    #[test]
    fn pattern_extracts_and_rejects_null() {
        let p = ValuePattern::parse(Vendor::Sqlite, "http://ex/@@foo.col1@@").unwrap();
        let maker = ValueMaker::Pattern(p);
        let r = row(&["foo.col1"], &[Some("1")]);
        assert_eq!(maker.extract(&r), Some("http://ex/1".to_string()));
        let null_row = row(&["foo.col1"], &[None]);
        assert_eq!(maker.extract(&null_row), None);
    }

    #[test]
    fn pattern_matches_decomposes_to_equalities() {
        let p = ValuePattern::parse(Vendor::Sqlite, "http://ex/@@foo.col1@@/x").unwrap();
        let maker = ValueMaker::Pattern(p);
        let expr = maker.matches_expression("http://ex/42/x");
        assert_eq!(expr, Expression::column_equals(col("foo.col1"), "42"));
        assert!(maker.matches_expression("http://other/42/x").is_false());
        assert!(maker.matches_expression("http://ex/42/y").is_false());
    }

    #[test]
    fn pattern_value_round_trip() {
        let p = ValuePattern::parse(
            Vendor::Sqlite,
            "urn:@@t.a@@:@@t.b@@",
        )
        .unwrap();
        let maker = ValueMaker::Pattern(p);
        let value = "urn:left:right";
        let expr = maker.matches_expression(value);
        // Build a row satisfying the returned equalities and extract.
        let r = row(&["t.a", "t.b"], &[Some("left"), Some("right")]);
        assert!(!expr.is_false());
        assert_eq!(maker.extract(&r), Some(value.to_string()));
    }

    #[test]
    fn blank_node_round_trip() {
        let maker = ValueMaker::BlankNodeId {
            class_map: "people".to_string(),
            columns: vec![col("t.id"), col("t.grp")],
        };
        let r = row(&["t.id", "t.grp"], &[Some("7"), Some("a")]);
        let value = maker.extract(&r).unwrap();
        assert_eq!(value, "people@@7@@a");
        let expr = maker.matches_expression(&value);
        assert_eq!(
            expr,
            Expression::and([
                Expression::column_equals(col("t.id"), "7"),
                Expression::column_equals(col("t.grp"), "a"),
            ])
        );
        assert!(maker.matches_expression("other@@7@@a").is_false());
    }

    #[test]
    fn decorator_conjunction() {
        let base = ValueMaker::Column(col("t.a"));
        let maker = ValueMaker::Decorated {
            base: Box::new(base),
            constraints: vec![
                ValueConstraint::MaxLength(5),
                ValueConstraint::Contains("x".to_string()),
            ],
        };
        assert!(!maker.matches_expression("axb").is_false());
        assert!(maker.matches_expression("ab").is_false()); // missing "x"
        assert!(maker.matches_expression("xxxxxx").is_false()); // too long
        // Extraction enforces the same constraints
        let ok = row(&["t.a"], &[Some("axb")]);
        let bad = row(&["t.a"], &[Some("toolongxx")]);
        assert_eq!(maker.extract(&ok), Some("axb".to_string()));
        assert_eq!(maker.extract(&bad), None);
    }

    #[test]
    fn translation_table_is_bidirectional() {
        let table = Arc::new(TranslationTable::from_pairs([("1", "male"), ("2", "female")]));
        let maker = ValueMaker::Translated {
            base: Box::new(ValueMaker::Column(col("t.sex"))),
            table,
        };
        let r = row(&["t.sex"], &[Some("1")]);
        assert_eq!(maker.extract(&r), Some("male".to_string()));
        assert_eq!(
            maker.matches_expression("female"),
            Expression::column_equals(col("t.sex"), "2")
        );
        assert!(maker.matches_expression("unknown").is_false());
        let unmapped = row(&["t.sex"], &[Some("3")]);
        assert_eq!(maker.extract(&unmapped), None);
    }

    #[test]
    fn translated_makers_compare_by_table_contents() {
        let make = |pairs: &[(&str, &str)]| ValueMaker::Translated {
            base: Box::new(ValueMaker::Column(col("t.sex"))),
            table: Arc::new(TranslationTable::from_pairs(pairs.to_vec())),
        };
        assert_eq!(make(&[("1", "male")]), make(&[("1", "male")]));
        assert_ne!(make(&[("1", "male")]), make(&[("1", "female")]));
    }

    #[test]
    fn rename_rewrites_pattern_columns() {
        let p = ValuePattern::parse(Vendor::Sqlite, "http://ex/@@a.k@@").unwrap();
        let maker = ValueMaker::Pattern(p);
        let renamer = Renamer::new().rename_table(
            TableName::parse(Vendor::Sqlite, "a").unwrap(),
            TableName::parse(Vendor::Sqlite, "a_2").unwrap(),
        );
        let renamed = maker.rename(&renamer);
        assert_eq!(renamed.columns(), BTreeSet::from([col("a_2.k")]));
        let r = row(&["a_2.k"], &[Some("9")]);
        assert_eq!(renamed.extract(&r), Some("http://ex/9".to_string()));
    }
}
