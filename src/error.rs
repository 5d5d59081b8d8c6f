use crate::load::StrategyKind;
use std::fmt;
use thiserror::Error;

/// Errors raised while preparing or executing a load run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("write error: {0}")]
    Write(#[source] sqlx::Error),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
    #[error("source error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{strategy} aborted after {committed_rows} committed rows: {source}")]
    Aborted {
        strategy: StrategyKind,
        committed_rows: u64,
        #[source]
        source: Box<LoadError>,
    },
}

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Write,
    SchemaMismatch,
    MalformedRow,
    Io,
    Config,
    Migration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Write => "write",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::MalformedRow => "malformed_row",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
            ErrorKind::Migration => "migration",
        };
        f.write_str(name)
    }
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Connection(_) => ErrorKind::Connection,
            LoadError::Write(_) => ErrorKind::Write,
            LoadError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            LoadError::MalformedRow { .. } => ErrorKind::MalformedRow,
            LoadError::Io(_) => ErrorKind::Io,
            LoadError::Config(_) => ErrorKind::Config,
            LoadError::Migration(_) => ErrorKind::Migration,
            LoadError::Aborted { source, .. } => source.kind(),
        }
    }

    /// Source row offset a row-at-a-time load can restart from.
    ///
    /// Only the row insert strategy commits periodically inside a run, so every
    /// other strategy has to be rerun from scratch and yields `None`.
    pub fn resume_offset(&self) -> Option<u64> {
        match self {
            LoadError::Aborted {
                strategy: StrategyKind::RowInsert,
                committed_rows,
                ..
            } => Some(*committed_rows),
            _ => None,
        }
    }

    /// Classify a sqlx error raised by a statement, commit, or COPY.
    ///
    /// Pool and socket failures are connection errors; everything else the
    /// server rejected aborts the current write.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => LoadError::Connection(err),
            other => LoadError::Write(other),
        }
    }
}

impl From<sqlx::Error> for LoadError {
    fn from(err: sqlx::Error) -> Self {
        LoadError::from_write(err)
    }
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => LoadError::Io(io),
            other => LoadError::MalformedRow {
                line,
                reason: format!("{:?}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_errors_classify_by_their_cause() {
        let err = LoadError::Aborted {
            strategy: StrategyKind::ColumnarUnnest,
            committed_rows: 0,
            source: Box::new(LoadError::SchemaMismatch("short column".into())),
        };
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(err.resume_offset(), None);
    }

    #[test]
    fn only_row_insert_aborts_are_resumable() {
        let err = LoadError::Aborted {
            strategy: StrategyKind::RowInsert,
            committed_rows: 10_000,
            source: Box::new(LoadError::Write(sqlx::Error::RowNotFound)),
        };
        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(err.resume_offset(), Some(10_000));
    }

    #[test]
    fn pool_failures_are_connection_errors() {
        assert_eq!(
            LoadError::from(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            LoadError::from(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Write
        );
    }
}
