//! Structured schema names: identifiers, table names, column names.
//!
//! Names are immutable value types usable as map keys. Undelimited
//! identifiers are case-folded at parse time according to the vendor, so
//! equality and hashing afterwards are plain structural comparisons.

use crate::errors::RelGraphError;
use crate::vendor::Vendor;

/// A single identifier with its delimited (quoted, case-sensitive) flag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    name: String,
    delimited: bool,
}

impl Identifier {
    /// Creates an undelimited identifier, folding case per the vendor.
    pub fn new(vendor: Vendor, name: &str) -> Identifier {
        Identifier {
            name: vendor.fold_identifier_case(name),
            delimited: false,
        }
    }

    /// Creates a delimited identifier. No folding; the name is exact.
    pub fn delimited(name: &str) -> Identifier {
        Identifier {
            name: name.to_string(),
            delimited: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_delimited(&self) -> bool {
        self.delimited
    }

    /// Renders the identifier for use in SQL text. Undelimited identifiers
    /// that are legal without quoting are emitted verbatim.
    pub fn render(&self, vendor: Vendor) -> String {
        if !self.delimited && vendor.is_valid_unquoted(&self.name) {
            self.name.clone()
        } else {
            vendor.quote_identifier(&self.name)
        }
    }
}

/// A table name with an optional schema qualifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: Option<Identifier>,
    pub table: Identifier,
}

impl TableName {
    pub fn new(vendor: Vendor, table: &str) -> TableName {
        TableName {
            schema: None,
            table: Identifier::new(vendor, table),
        }
    }

    pub fn with_schema(vendor: Vendor, schema: &str, table: &str) -> TableName {
        TableName {
            schema: Some(Identifier::new(vendor, schema)),
            table: Identifier::new(vendor, table),
        }
    }

    /// Parses `[schema.]table` text, honouring the vendor's quoting.
    pub fn parse(vendor: Vendor, text: &str) -> Result<TableName, RelGraphError> {
        let parts = split_qualified(vendor, text)?;
        match parts.as_slice() {
            [table] => Ok(TableName {
                schema: None,
                table: table.clone(),
            }),
            [schema, table] => Ok(TableName {
                schema: Some(schema.clone()),
                table: table.clone(),
            }),
            _ => Err(RelGraphError::mapping(format!(
                "table name \"{text}\" is not in [schema.]table notation"
            ))),
        }
    }

    /// Unquoted `schema.table` display form, used in templates and as the
    /// canonical key text.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s.name(), self.table.name()),
            None => self.table.name().to_string(),
        }
    }

    /// Vendor-quoted SQL rendering.
    pub fn render(&self, vendor: Vendor) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s.render(vendor), self.table.render(vendor)),
            None => self.table.render(vendor),
        }
    }

    /// The same table under a different name, keeping the schema.
    pub fn renamed(&self, new_table: Identifier) -> TableName {
        TableName {
            schema: self.schema.clone(),
            table: new_table,
        }
    }
}

/// A fully qualified column name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName {
    pub table: TableName,
    pub column: Identifier,
}

impl ColumnName {
    pub fn new(table: TableName, column: Identifier) -> ColumnName {
        ColumnName { table, column }
    }

    /// Parses `[schema.]table.column` text.
    pub fn parse(vendor: Vendor, text: &str) -> Result<ColumnName, RelGraphError> {
        let parts = split_qualified(vendor, text)?;
        match parts.as_slice() {
            [table, column] => Ok(ColumnName {
                table: TableName {
                    schema: None,
                    table: table.clone(),
                },
                column: column.clone(),
            }),
            [schema, table, column] => Ok(ColumnName {
                table: TableName {
                    schema: Some(schema.clone()),
                    table: table.clone(),
                },
                column: column.clone(),
            }),
            _ => Err(RelGraphError::mapping(format!(
                "column name \"{text}\" is not in [schema.]table.column notation"
            ))),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table.qualified(), self.column.name())
    }

    pub fn render(&self, vendor: Vendor) -> String {
        format!(
            "{}.{}",
            self.table.render(vendor),
            self.column.render(vendor)
        )
    }

    /// The same column on a different table.
    pub fn with_table(&self, table: TableName) -> ColumnName {
        ColumnName {
            table,
            column: self.column.clone(),
        }
    }
}

/// Splits dotted, possibly quoted name text into identifiers. A closing
/// quote character inside a delimited segment is escaped by doubling.
fn split_qualified(vendor: Vendor, text: &str) -> Result<Vec<Identifier>, RelGraphError> {
    let open = vendor.identifier_quote();
    let close = vendor.identifier_quote_close();
    let mut parts = Vec::new();
    let mut chars = text.chars().peekable();
    loop {
        let mut segment = String::new();
        let delimited = chars.peek() == Some(&open);
        if delimited {
            chars.next();
            loop {
                match chars.next() {
                    Some(c) if c == close => {
                        if chars.peek() == Some(&close) {
                            chars.next();
                            segment.push(close);
                        } else {
                            break;
                        }
                    }
                    Some(c) => segment.push(c),
                    None => {
                        return Err(RelGraphError::mapping(format!(
                            "unterminated quoted identifier in \"{text}\""
                        )));
                    }
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                chars.next();
                segment.push(c);
            }
        }
        if segment.is_empty() {
            return Err(RelGraphError::mapping(format!(
                "empty identifier segment in \"{text}\""
            )));
        }
        parts.push(if delimited {
            Identifier::delimited(&segment)
        } else {
            Identifier::new(vendor, &segment)
        });
        match chars.next() {
            Some('.') => continue,
            Some(c) => {
                return Err(RelGraphError::mapping(format!(
                    "unexpected character '{c}' in name \"{text}\""
                )));
            }
            None => break,
        }
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_plain_column() {
        let col = ColumnName::parse(Vendor::Sqlite, "foo.col1").unwrap();
        assert_eq!(col.qualified(), "foo.col1");
        assert_eq!(col.render(Vendor::Sqlite), "foo.col1");
    }

    #[test]
    fn parse_schema_qualified() {
        let col = ColumnName::parse(Vendor::Sqlite, "s.t.c").unwrap();
        assert_eq!(col.table.schema.as_ref().unwrap().name(), "s");
        assert_eq!(col.table.table.name(), "t");
        assert_eq!(col.column.name(), "c");
    }

    #[test]
    fn dollar_identifier_round_trips_unquoted() {
        let table = TableName::parse(Vendor::Sqlite, "A$B").unwrap();
        assert_eq!(table.render(Vendor::Sqlite), "A$B");
        let reparsed = TableName::parse(Vendor::Sqlite, &table.render(Vendor::Sqlite)).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn quoted_identifier_with_quote_char_round_trips() {
        let original = Identifier::delimited(r#"we"ird"#);
        let rendered = original.render(Vendor::Sqlite);
        assert_eq!(rendered, r#""we""ird""#);
        let table = TableName::parse(Vendor::Sqlite, &rendered).unwrap();
        assert_eq!(table.table.name(), r#"we"ird"#);
        assert!(table.table.is_delimited());
    }

    #[test]
    fn case_folding_respects_vendor() {
        let a = TableName::parse(Vendor::Sql92, "People").unwrap();
        let b = TableName::parse(Vendor::Sql92, "PEOPLE").unwrap();
        assert_eq!(a, b);
        let c = TableName::parse(Vendor::Sqlite, "People").unwrap();
        let d = TableName::parse(Vendor::Sqlite, "PEOPLE").unwrap();
        assert_ne!(c, d);
        // Delimited identifiers never fold
        let e = TableName::parse(Vendor::Sql92, "\"People\"").unwrap();
        assert_ne!(a, e);
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(ColumnName::parse(Vendor::Sqlite, "onlytable").is_err());
        assert!(ColumnName::parse(Vendor::Sqlite, "a..b").is_err());
        assert!(TableName::parse(Vendor::Sqlite, "\"unterminated").is_err());
    }
}
