use crate::error::LoadError;
use crate::load::ConflictPolicy;
use crate::load::strategies::{bulk_param, columnar_unnest, multi_row, row_insert, streaming_copy};
use crate::schema::{Schema, TableName};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    parse_or(env::var(key).ok(), default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    parse_or(env::var(key).ok(), default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Tuning knobs for the individual strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    pub row_commit_every: usize,
    pub multi_row_batch: usize,
    pub bulk_param_batch: usize,
    pub bulk_param_page_size: usize,
    pub unnest_window: usize,
    pub copy_chunk_bytes: usize,
    /// Overrides each strategy's default conflict policy when set.
    pub conflict: Option<ConflictPolicy>,
}

impl StrategySettings {
    pub fn from_env() -> Result<Self, LoadError> {
        let conflict = env_nonempty("BULK_CONFLICT_POLICY")
            .map(|value| value.parse::<ConflictPolicy>())
            .transpose()?;

        Ok(Self {
            row_commit_every: env_usize("BULK_ROW_COMMIT_EVERY", row_insert::DEFAULT_COMMIT_EVERY),
            multi_row_batch: env_usize("BULK_MULTI_ROW_BATCH", multi_row::DEFAULT_BATCH_SIZE),
            bulk_param_batch: env_usize("BULK_PARAM_BATCH", bulk_param::DEFAULT_BATCH_SIZE),
            bulk_param_page_size: env_usize("BULK_PARAM_PAGE_SIZE", bulk_param::DEFAULT_PAGE_SIZE),
            unnest_window: env_usize("BULK_UNNEST_WINDOW", columnar_unnest::DEFAULT_WINDOW),
            copy_chunk_bytes: env_usize("BULK_COPY_CHUNK_BYTES", streaming_copy::DEFAULT_CHUNK_BYTES),
            conflict,
        })
    }
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            row_commit_every: row_insert::DEFAULT_COMMIT_EVERY,
            multi_row_batch: multi_row::DEFAULT_BATCH_SIZE,
            bulk_param_batch: bulk_param::DEFAULT_BATCH_SIZE,
            bulk_param_page_size: bulk_param::DEFAULT_PAGE_SIZE,
            unnest_window: columnar_unnest::DEFAULT_WINDOW,
            copy_chunk_bytes: streaming_copy::DEFAULT_CHUNK_BYTES,
            conflict: None,
        }
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub table: TableName,
    pub source_path: PathBuf,
    pub schema: Schema,
    pub strategies: StrategySettings,
}

impl LoadConfig {
    pub fn from_env() -> Result<Self, LoadError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| LoadError::Config("DATABASE_URL is required".into()))?;
        let table = TableName::parse(&env_string("BULK_TABLE", "bulk_test"))?;
        let source_path = PathBuf::from(env_string("BULK_SOURCE_PATH", "bulk_test.csv"));
        let schema = match env_nonempty("BULK_SCHEMA") {
            Some(descriptor) => Schema::parse(&descriptor)?,
            None => Schema::bulk_test(),
        };

        Ok(Self {
            database_url,
            max_connections: env_u32("BULK_DB_MAX_CONNECTIONS", 1).max(1),
            table,
            source_path,
            schema,
            strategies: StrategySettings::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = StrategySettings::default();
        assert_eq!(settings.row_commit_every, 5_000);
        assert_eq!(settings.multi_row_batch, 5_000);
        assert_eq!(settings.bulk_param_batch, 10_000);
        assert_eq!(settings.bulk_param_page_size, 1_000);
        assert_eq!(settings.unnest_window, 10_000);
        assert_eq!(settings.conflict, None);
    }

    #[test]
    fn test_numeric_values_fall_back_on_garbage() {
        assert_eq!(parse_or(Some("ten".to_string()), 7usize), 7);
        assert_eq!(parse_or(None, 9usize), 9);
        assert_eq!(parse_or(Some(" 2500 ".to_string()), 7usize), 2_500);
        assert_eq!(parse_or(Some("-1".to_string()), 1u32), 1);
    }
}
