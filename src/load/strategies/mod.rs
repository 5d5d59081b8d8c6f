pub mod bulk_param;
pub mod columnar_unnest;
pub mod multi_row;
pub mod row_insert;
pub mod streaming_copy;

pub use bulk_param::BulkParamInsert;
pub use columnar_unnest::ColumnarUnnest;
pub use multi_row::MultiRowInsert;
pub use row_insert::RowInsert;
pub use streaming_copy::StreamingCopy;

use crate::config::StrategySettings;
use crate::error::LoadError;
use crate::load::destination::PG_BIND_LIMIT;
use crate::load::{ConflictPolicy, Destination, LoadStrategy, RowSource, RunResult, StrategyKind};
use crate::schema::Schema;

/// Largest row threshold any strategy accepts.
pub const MAX_BATCH_ROWS: usize = 1_000_000;
/// Largest COPY chunk, in bytes.
pub const MAX_COPY_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// A configured strategy, selected by [`StrategyKind`].
#[derive(Debug, Clone)]
pub enum Strategy {
    RowInsert(RowInsert),
    MultiRowInsert(MultiRowInsert),
    BulkParamInsert(BulkParamInsert),
    ColumnarUnnest(ColumnarUnnest),
    StreamingCopy(StreamingCopy),
}

impl Strategy {
    /// Build and validate the strategy `kind` from the settings.
    ///
    /// Rejects zero or oversized sizes and conflict skipping for COPY as
    /// [`LoadError::Config`]. Statements that would exceed PostgreSQL's bind
    /// parameter limit for this schema are a [`LoadError::SchemaMismatch`].
    pub fn from_config(
        kind: StrategyKind,
        settings: &StrategySettings,
        schema: &Schema,
    ) -> Result<Self, LoadError> {
        let max_rows = PG_BIND_LIMIT / schema.arity();

        let strategy = match kind {
            StrategyKind::RowInsert => {
                require_in_range("row commit interval", settings.row_commit_every, MAX_BATCH_ROWS)?;
                let mut strategy = RowInsert::new(settings.row_commit_every);
                if let Some(conflict) = settings.conflict {
                    strategy = strategy.with_conflict(conflict);
                }
                Strategy::RowInsert(strategy)
            }
            StrategyKind::MultiRowInsert => {
                require_in_range("multi-row batch size", settings.multi_row_batch, MAX_BATCH_ROWS)?;
                require_within_bind_limit("multi-row batch size", settings.multi_row_batch, max_rows)?;
                let mut strategy = MultiRowInsert::new(settings.multi_row_batch);
                if let Some(conflict) = settings.conflict {
                    strategy = strategy.with_conflict(conflict);
                }
                Strategy::MultiRowInsert(strategy)
            }
            StrategyKind::BulkParamInsert => {
                require_in_range("bulk batch size", settings.bulk_param_batch, MAX_BATCH_ROWS)?;
                require_in_range("bulk page size", settings.bulk_param_page_size, MAX_BATCH_ROWS)?;
                require_within_bind_limit("bulk page size", settings.bulk_param_page_size, max_rows)?;
                let mut strategy =
                    BulkParamInsert::new(settings.bulk_param_batch, settings.bulk_param_page_size);
                if let Some(conflict) = settings.conflict {
                    strategy = strategy.with_conflict(conflict);
                }
                Strategy::BulkParamInsert(strategy)
            }
            StrategyKind::ColumnarUnnest => {
                require_in_range("unnest window", settings.unnest_window, MAX_BATCH_ROWS)?;
                let mut strategy = ColumnarUnnest::new(settings.unnest_window);
                if let Some(conflict) = settings.conflict {
                    strategy = strategy.with_conflict(conflict);
                }
                Strategy::ColumnarUnnest(strategy)
            }
            StrategyKind::StreamingCopy => {
                require_in_range("copy chunk size", settings.copy_chunk_bytes, MAX_COPY_CHUNK_BYTES)?;
                if settings.conflict == Some(ConflictPolicy::Skip) {
                    return Err(LoadError::Config(
                        "streaming_copy cannot skip conflicting rows".into(),
                    ));
                }
                Strategy::StreamingCopy(StreamingCopy::new(settings.copy_chunk_bytes))
            }
        };

        Ok(strategy)
    }
}

impl LoadStrategy for Strategy {
    fn kind(&self) -> StrategyKind {
        match self {
            Strategy::RowInsert(s) => s.kind(),
            Strategy::MultiRowInsert(s) => s.kind(),
            Strategy::BulkParamInsert(s) => s.kind(),
            Strategy::ColumnarUnnest(s) => s.kind(),
            Strategy::StreamingCopy(s) => s.kind(),
        }
    }

    async fn run(&self, source: &RowSource, destination: &Destination) -> Result<RunResult, LoadError> {
        match self {
            Strategy::RowInsert(s) => s.run(source, destination).await,
            Strategy::MultiRowInsert(s) => s.run(source, destination).await,
            Strategy::BulkParamInsert(s) => s.run(source, destination).await,
            Strategy::ColumnarUnnest(s) => s.run(source, destination).await,
            Strategy::StreamingCopy(s) => s.run(source, destination).await,
        }
    }
}

fn require_in_range(what: &str, value: usize, max: usize) -> Result<(), LoadError> {
    if value == 0 {
        return Err(LoadError::Config(format!("{what} must be greater than zero")));
    }
    if value > max {
        return Err(LoadError::Config(format!("{what} {value} exceeds the maximum of {max}")));
    }
    Ok(())
}

fn require_within_bind_limit(what: &str, rows: usize, max_rows: usize) -> Result<(), LoadError> {
    if rows > max_rows {
        return Err(LoadError::SchemaMismatch(format!(
            "{what} {rows} exceeds {max_rows} rows per statement ({PG_BIND_LIMIT} bind parameters)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_every_kind_from_defaults() {
        let settings = StrategySettings::default();
        for kind in StrategyKind::ALL {
            let strategy = Strategy::from_config(kind, &settings, &Schema::bulk_test()).unwrap();
            assert_eq!(strategy.kind(), kind);
        }
    }

    #[test]
    fn multi_row_batch_must_fit_bind_limit() {
        let settings = StrategySettings {
            multi_row_batch: 10_000,
            ..StrategySettings::default()
        };
        let err = Strategy::from_config(StrategyKind::MultiRowInsert, &settings, &Schema::bulk_test())
            .unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch(_)));

        let narrow = Schema::parse("id:int,label:text").unwrap();
        assert!(Strategy::from_config(StrategyKind::MultiRowInsert, &settings, &narrow).is_ok());
    }

    #[test]
    fn copy_rejects_conflict_skip() {
        let settings = StrategySettings {
            conflict: Some(ConflictPolicy::Skip),
            ..StrategySettings::default()
        };
        assert!(
            Strategy::from_config(StrategyKind::StreamingCopy, &settings, &Schema::bulk_test())
                .is_err()
        );
        assert!(
            Strategy::from_config(StrategyKind::RowInsert, &settings, &Schema::bulk_test()).is_ok()
        );
    }

    #[test]
    fn oversized_settings_are_config_errors() {
        let settings = StrategySettings {
            bulk_param_batch: usize::MAX,
            copy_chunk_bytes: 1 << 40,
            ..StrategySettings::default()
        };
        for kind in [StrategyKind::BulkParamInsert, StrategyKind::StreamingCopy] {
            let err = Strategy::from_config(kind, &settings, &Schema::bulk_test()).unwrap_err();
            assert!(matches!(err, LoadError::Config(_)), "{kind}: {err}");
        }
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let settings = StrategySettings {
            unnest_window: 0,
            ..StrategySettings::default()
        };
        assert!(
            Strategy::from_config(StrategyKind::ColumnarUnnest, &settings, &Schema::bulk_test())
                .is_err()
        );
    }
}
