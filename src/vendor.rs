//! Vendor-specific SQL syntax rules.
//!
//! Encapsulates the differences between database engines that matter for
//! text generation: identifier quoting, string literal escaping, case
//! folding of unquoted identifiers, generic-to-native type names, and row
//! limit syntax. Everything here is pure; no method touches a connection.

use serde::{Deserialize, Serialize};

/// Database product whose SQL syntax rules apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Plain SQL-92 syntax. Unquoted identifiers fold to uppercase.
    Sql92,
    /// SQLite. The only vendor this crate can also execute against.
    #[default]
    Sqlite,
    /// MySQL: backtick identifier quoting, backslash escaping in strings.
    Mysql,
    /// PostgreSQL: unquoted identifiers fold to lowercase.
    Postgres,
    /// SQL Server: bracket identifier quoting, `TOP n` limits.
    SqlServer,
}

/// Generic column type categories used by the mapping layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenericType {
    Boolean,
    Integer,
    Decimal,
    Character,
    Binary,
    Date,
    Time,
    Timestamp,
    LargeObject,
}

impl Vendor {
    /// The character that opens a delimited identifier.
    pub fn identifier_quote(self) -> char {
        match self {
            Vendor::Mysql => '`',
            Vendor::SqlServer => '[',
            _ => '"',
        }
    }

    /// The character that closes a delimited identifier. Differs from the
    /// opening character only for bracket-quoting vendors.
    pub fn identifier_quote_close(self) -> char {
        match self {
            Vendor::Mysql => '`',
            Vendor::SqlServer => ']',
            _ => '"',
        }
    }

    /// Quotes an identifier, escaping embedded closing quotes by doubling.
    pub fn quote_identifier(self, name: &str) -> String {
        let open = self.identifier_quote();
        let close = self.identifier_quote_close();
        let mut out = String::with_capacity(name.len() + 2);
        out.push(open);
        for c in name.chars() {
            out.push(c);
            if c == close {
                out.push(close);
            }
        }
        out.push(close);
        out
    }

    /// Quotes a string literal. All vendors double embedded single quotes;
    /// MySQL treats backslash as an escape introducer, so it is doubled too.
    pub fn quote_string_literal(self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        for c in s.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self == Vendor::Mysql => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Case folding applied to undelimited identifiers.
    pub fn fold_identifier_case(self, name: &str) -> String {
        match self {
            Vendor::Sql92 => name.to_uppercase(),
            Vendor::Postgres => name.to_lowercase(),
            Vendor::Sqlite | Vendor::Mysql | Vendor::SqlServer => name.to_string(),
        }
    }

    /// Whether `c` may appear in the body of an undelimited identifier.
    pub fn allows_unquoted_char(self, c: char) -> bool {
        if c.is_ascii_alphanumeric() || c == '_' {
            return true;
        }
        c == '$' && matches!(self, Vendor::Sqlite | Vendor::Postgres | Vendor::SqlServer)
    }

    /// Whether `name` can be rendered without delimiters.
    pub fn is_valid_unquoted(self, name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| self.allows_unquoted_char(c))
    }

    /// Native type name for a generic type category.
    pub fn native_type(self, generic: GenericType) -> &'static str {
        use GenericType::*;
        match (self, generic) {
            (Vendor::Sqlite, Boolean) => "INTEGER",
            (Vendor::Sqlite, Integer) => "INTEGER",
            (Vendor::Sqlite, Decimal) => "REAL",
            (Vendor::Sqlite, Character) => "TEXT",
            (Vendor::Sqlite, Binary) => "BLOB",
            (Vendor::Sqlite, Date | Time | Timestamp) => "TEXT",
            (Vendor::Sqlite, LargeObject) => "BLOB",

            (Vendor::Mysql, Boolean) => "TINYINT(1)",
            (Vendor::Mysql, LargeObject) => "LONGBLOB",
            (Vendor::SqlServer, Boolean) => "BIT",
            (Vendor::SqlServer, Timestamp) => "DATETIME2",
            (Vendor::SqlServer, LargeObject) => "VARBINARY(MAX)",
            (Vendor::Postgres, Binary) => "BYTEA",
            (Vendor::Postgres, LargeObject) => "BYTEA",
            (Vendor::Postgres, Decimal) => "NUMERIC",

            (_, Boolean) => "BOOLEAN",
            (_, Integer) => "INTEGER",
            (_, Decimal) => "DECIMAL",
            (_, Character) => "VARCHAR(255)",
            (_, Binary) => "VARBINARY(255)",
            (_, Date) => "DATE",
            (_, Time) => "TIME",
            (_, Timestamp) => "TIMESTAMP",
            (_, LargeObject) => "BLOB",
        }
    }

    /// `LIMIT n` appendage, empty for vendors that limit elsewhere.
    pub fn limit_clause(self, limit: Option<u64>) -> String {
        match (self, limit) {
            (Vendor::SqlServer, _) | (_, None) => String::new(),
            (_, Some(n)) => format!(" LIMIT {n}"),
        }
    }

    /// SELECT keyword modifier for vendors that limit up front (`TOP n`).
    pub fn select_modifier(self, limit: Option<u64>) -> String {
        match (self, limit) {
            (Vendor::SqlServer, Some(n)) => format!("TOP {n} "),
            _ => String::new(),
        }
    }

    /// `AS` keyword between a table and its alias in FROM clauses. SQL-92
    /// allows either form; every engine here understands the explicit one.
    pub fn alias_keyword(self) -> &'static str {
        "AS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_identifier_doubles_embedded_quote() {
        assert_eq!(Vendor::Sql92.quote_identifier(r#"a"b"#), r#""a""b""#);
        assert_eq!(Vendor::Mysql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Vendor::SqlServer.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn string_literal_escaping() {
        assert_eq!(Vendor::Sqlite.quote_string_literal("it's"), "'it''s'");
        // MySQL also doubles backslashes
        assert_eq!(Vendor::Mysql.quote_string_literal(r"a\b'c"), r"'a\\b''c'");
        // Other vendors leave backslashes alone
        assert_eq!(Vendor::Postgres.quote_string_literal(r"a\b"), r"'a\b'");
    }

    #[test]
    fn case_folding_per_vendor() {
        assert_eq!(Vendor::Sql92.fold_identifier_case("Foo"), "FOO");
        assert_eq!(Vendor::Postgres.fold_identifier_case("Foo"), "foo");
        assert_eq!(Vendor::Sqlite.fold_identifier_case("Foo"), "Foo");
    }

    #[test]
    fn dollar_sign_identifiers() {
        assert!(Vendor::Sqlite.is_valid_unquoted("A$B"));
        assert!(Vendor::Postgres.is_valid_unquoted("a$b"));
        assert!(!Vendor::Mysql.is_valid_unquoted("A$B"));
        assert!(!Vendor::Sqlite.is_valid_unquoted("1abc"));
    }

    #[test]
    fn limit_syntax() {
        assert_eq!(Vendor::Sqlite.limit_clause(Some(5)), " LIMIT 5");
        assert_eq!(Vendor::SqlServer.limit_clause(Some(5)), "");
        assert_eq!(Vendor::SqlServer.select_modifier(Some(5)), "TOP 5 ");
        assert_eq!(Vendor::Mysql.select_modifier(Some(5)), "");
    }
}
