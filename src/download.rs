//! Direct content retrieval, bypassing triple conversion.
//!
//! A [`DownloadRelation`] maps graph subjects to the raw contents of one
//! column, typically a BLOB. Given a concrete subject it runs at most one
//! row's worth of SQL and hands back the bytes verbatim, so binary data
//! never squeezes through the string-valued triple path.

use std::sync::Arc;

use crate::algebra::RelationOp;
use crate::errors::RelGraphError;
use crate::mapping::Database;
use crate::names::ColumnName;
use crate::nodes::{NodeMaker, Term};
use crate::sql::{generate_select, ResultRow};
use crate::values::ValueMaker;

/// The result of a content lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadContents {
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

pub struct DownloadRelation {
    database: Arc<Database>,
    tree: Arc<RelationOp>,
    subject: NodeMaker,
    content_column: ColumnName,
    media_type: Option<ValueMaker>,
}

impl DownloadRelation {
    pub fn new(
        database: Arc<Database>,
        tree: Arc<RelationOp>,
        subject: NodeMaker,
        content_column: ColumnName,
        media_type: Option<ValueMaker>,
    ) -> DownloadRelation {
        DownloadRelation {
            database,
            tree,
            subject,
            content_column,
            media_type,
        }
    }

    /// Fetches the content for `subject`. `Ok(None)` when no row matches or
    /// the matching row's content cell is NULL.
    pub fn get(&self, subject: &Term) -> Result<Option<DownloadContents>, RelGraphError> {
        let (_, condition) = self.subject.select_term(subject);
        if condition.is_false() {
            return Ok(None);
        }
        let mut tree = RelationOp::select(self.tree.clone(), condition);
        if tree.is_statically_empty() {
            return Ok(None);
        }
        // Content cell first, media-type columns after it.
        let media_columns: Vec<ColumnName> = self
            .media_type
            .as_ref()
            .map(|m| m.columns().into_iter().collect())
            .unwrap_or_default();
        let mut projected = vec![self.content_column.clone()];
        projected.extend(media_columns.iter().cloned());
        tree = RelationOp::project(tree, projected);
        tree = RelationOp::limit(tree, 1);
        let statement = generate_select(&tree, self.database.vendor())?;
        log::debug!("content lookup: {}", statement.sql);
        self.database.with_connection(|conn| {
            let mut prepared = conn
                .prepare(&statement.sql)
                .map_err(|e| RelGraphError::sql_execution(&statement.sql, e.to_string()))?;
            let mut rows = prepared
                .query([])
                .map_err(|e| RelGraphError::sql_execution(&statement.sql, e.to_string()))?;
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => return Ok(None),
                Err(e) => {
                    return Err(RelGraphError::sql_execution(&statement.sql, e.to_string()));
                }
            };
            let bytes = match row
                .get_ref(0)
                .map_err(|e| RelGraphError::sql_execution(&statement.sql, e.to_string()))?
            {
                rusqlite::types::ValueRef::Null => return Ok(None),
                rusqlite::types::ValueRef::Blob(b) => b.to_vec(),
                rusqlite::types::ValueRef::Text(t) => t.to_vec(),
                rusqlite::types::ValueRef::Integer(i) => i.to_string().into_bytes(),
                rusqlite::types::ValueRef::Real(r) => r.to_string().into_bytes(),
            };
            let media_type = match &self.media_type {
                Some(maker) => {
                    let mut values = Vec::with_capacity(media_columns.len());
                    for i in 0..media_columns.len() {
                        let cell = row.get_ref(i + 1).map_err(|e| {
                            RelGraphError::sql_execution(&statement.sql, e.to_string())
                        })?;
                        values.push(crate::mapping::cell_to_string(cell));
                    }
                    let media_row = ResultRow::new(media_columns.clone(), values);
                    maker.extract(&media_row)
                }
                None => None,
            };
            Ok(Some(DownloadContents { bytes, media_type }))
        })
    }
}
