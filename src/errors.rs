use thiserror::Error;

/// Error type for relgraph operations.
#[derive(Debug, Error)]
pub enum RelGraphError {
    /// Malformed mapping structure. Raised at compile time, never during
    /// iteration.
    #[error("mapping error: {0}")]
    Mapping(String),
    /// The database connection could not be established or was lost.
    /// Fatal for the affected database's queries; not retried here.
    #[error("connection error: {0}")]
    Connection(String),
    /// A database value could not be rendered into the requested term kind.
    /// Only surfaces on the content-retrieval path; during triple iteration
    /// the affected row simply produces no triple.
    #[error("translation error: {0}")]
    Translation(String),
    /// The underlying engine rejected generated SQL. Always indicates a
    /// generator or mapping defect. Carries the offending statement text.
    #[error("SQL execution error: {message} (statement: {sql})")]
    SqlExecution { sql: String, message: String },
}

impl RelGraphError {
    pub fn mapping<T: Into<String>>(msg: T) -> Self {
        RelGraphError::Mapping(msg.into())
    }

    pub fn connection<T: Into<String>>(msg: T) -> Self {
        RelGraphError::Connection(msg.into())
    }

    pub fn translation<T: Into<String>>(msg: T) -> Self {
        RelGraphError::Translation(msg.into())
    }

    pub fn sql_execution<S: Into<String>, M: Into<String>>(sql: S, msg: M) -> Self {
        RelGraphError::SqlExecution {
            sql: sql.into(),
            message: msg.into(),
        }
    }
}
