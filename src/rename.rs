//! Structural renaming of tables and columns.
//!
//! A [`Renamer`] carries a table substitution plus optional per-column
//! overrides. Renaming a table implies renaming every column qualified by it
//! unless an explicit column override exists. The same renamer is applied to
//! an operator tree, its expressions and its value/node makers in one pass,
//! so a partially renamed structure is never observable.

use std::collections::HashMap;

use crate::names::{ColumnName, Identifier, TableName};
use crate::vendor::Vendor;

#[derive(Clone, Debug, Default)]
pub struct Renamer {
    tables: HashMap<TableName, TableName>,
    columns: HashMap<ColumnName, ColumnName>,
}

impl Renamer {
    pub fn new() -> Renamer {
        Renamer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty()
    }

    pub fn rename_table(mut self, from: TableName, to: TableName) -> Renamer {
        self.tables.insert(from, to);
        self
    }

    pub fn rename_column(mut self, from: ColumnName, to: ColumnName) -> Renamer {
        self.columns.insert(from, to);
        self
    }

    pub fn apply_to_table(&self, table: &TableName) -> TableName {
        self.tables.get(table).cloned().unwrap_or_else(|| table.clone())
    }

    /// Explicit column overrides win; otherwise a table rename carries the
    /// column along under its unqualified name.
    pub fn apply_to_column(&self, column: &ColumnName) -> ColumnName {
        if let Some(replacement) = self.columns.get(column) {
            return replacement.clone();
        }
        match self.tables.get(&column.table) {
            Some(new_table) => column.with_table(new_table.clone()),
            None => column.clone(),
        }
    }
}

/// Allocates collision-free table names with a deterministic numeric suffix
/// in first-seen order, so identical input always produces identical SQL.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    taken: HashMap<String, usize>,
}

impl AliasAllocator {
    pub fn new() -> AliasAllocator {
        AliasAllocator::default()
    }

    /// Returns `base` untouched the first time it is seen, and
    /// `base_2`, `base_3`, ... on later collisions.
    pub fn allocate(&mut self, vendor: Vendor, base: &TableName) -> TableName {
        let key = base.qualified();
        let n = self.taken.entry(key).or_insert(0);
        *n += 1;
        if *n == 1 {
            base.clone()
        } else {
            let renamed = format!("{}_{}", base.table.name(), n);
            base.renamed(if base.table.is_delimited() {
                Identifier::delimited(&renamed)
            } else {
                Identifier::new(vendor, &renamed)
            })
        }
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
    fn disjoint_map_is_identity() {
        let renamer = Renamer::new().rename_table(table("other"), table("other_2"));
        assert_eq!(renamer.apply_to_column(&col("t.a")), col("t.a"));
        assert_eq!(renamer.apply_to_table(&table("t")), table("t"));
    }

    #[test]
    fn table_rename_carries_columns() {
        let renamer = Renamer::new().rename_table(table("a"), table("b"));
        let renamed = renamer.apply_to_column(&col("a.x"));
        assert_eq!(renamed, col("b.x"));
        // Fixed point: applying again changes nothing (domain no longer matches)
        assert_eq!(renamer.apply_to_column(&renamed), renamed);
    }

    #[test]
    fn column_override_beats_table_rename() {
        let renamer = Renamer::new()
            .rename_table(table("a"), table("b"))
            .rename_column(col("a.x"), col("c.y"));
        assert_eq!(renamer.apply_to_column(&col("a.x")), col("c.y"));
        assert_eq!(renamer.apply_to_column(&col("a.z")), col("b.z"));
    }

    #[test]
    fn allocator_suffixes_in_first_seen_order() {
        let mut alloc = AliasAllocator::new();
        assert_eq!(alloc.allocate(Vendor::Sqlite, &table("t")), table("t"));
        assert_eq!(alloc.allocate(Vendor::Sqlite, &table("t")), table("t_2"));
        assert_eq!(alloc.allocate(Vendor::Sqlite, &table("t")), table("t_3"));
        assert_eq!(alloc.allocate(Vendor::Sqlite, &table("u")), table("u"));
    }
}
