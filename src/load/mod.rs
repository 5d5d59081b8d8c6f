//! Bulk-load strategy engine.
//!
//! This module loads rows from a CSV [`RowSource`] into a PostgreSQL
//! [`Destination`] using one of five interchangeable strategies:
//!
//! 1. **Row insert** (`strategies::row_insert`) - one bound INSERT per row, periodic commits
//! 2. **Multi-row insert** (`strategies::multi_row`) - one bound multi-VALUES INSERT per batch
//! 3. **Bulk parameter insert** (`strategies::bulk_param`) - paged multi-VALUES INSERTs per batch
//! 4. **Columnar unnest** (`strategies::columnar_unnest`) - parallel column arrays expanded by UNNEST
//! 5. **Streaming copy** (`strategies::streaming_copy`) - raw CSV body streamed into COPY
//!
//! Every strategy drives a [`StrategyRun`] through the same state machine and
//! commits through a [`TransactionController`], so the resulting
//! [`RunResult`]s are directly comparable.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use bulk_load_bench::load::{Destination, LoadStrategy, RowSource, Strategy, StrategyKind};
//!
//! let strategy = Strategy::from_config(StrategyKind::ColumnarUnnest, &config.strategies, &schema)?;
//! destination.truncate().await?;
//! let result = strategy.run(&source, &destination).await?;
//! println!("{}", result);
//! ```

pub mod batch;
pub mod destination;
pub mod run;
pub mod source;
pub mod strategies;
pub mod transaction;

pub use batch::{Batch, ColumnBlock, ColumnData, windows};
pub use destination::Destination;
pub use run::{RunResult, RunState, StrategyRun};
pub use source::{RowIter, RowSource};
pub use strategies::{
    BulkParamInsert, ColumnarUnnest, MultiRowInsert, RowInsert, Strategy, StreamingCopy,
};
pub use transaction::TransactionController;

use crate::error::LoadError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A loading algorithm that drives the destination to a fully loaded state.
///
/// Implementations do not truncate the destination; resetting the table
/// between runs is the caller's job.
#[allow(async_fn_in_trait)]
pub trait LoadStrategy {
    fn kind(&self) -> StrategyKind;

    async fn run(&self, source: &RowSource, destination: &Destination)
    -> Result<RunResult, LoadError>;
}

/// The five available strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RowInsert,
    MultiRowInsert,
    BulkParamInsert,
    ColumnarUnnest,
    StreamingCopy,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::RowInsert,
        StrategyKind::MultiRowInsert,
        StrategyKind::BulkParamInsert,
        StrategyKind::ColumnarUnnest,
        StrategyKind::StreamingCopy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RowInsert => "row_insert",
            StrategyKind::MultiRowInsert => "multi_row_insert",
            StrategyKind::BulkParamInsert => "bulk_param_insert",
            StrategyKind::ColumnarUnnest => "columnar_unnest",
            StrategyKind::StreamingCopy => "streaming_copy",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "row_insert" | "single_insert" => Ok(StrategyKind::RowInsert),
            "multi_row_insert" | "multi_valued_insert" => Ok(StrategyKind::MultiRowInsert),
            "bulk_param_insert" | "execute_values" => Ok(StrategyKind::BulkParamInsert),
            "columnar_unnest" | "insert_arrays" => Ok(StrategyKind::ColumnarUnnest),
            "streaming_copy" | "copy" | "copy_from_csv" => Ok(StrategyKind::StreamingCopy),
            other => Err(LoadError::Config(format!("unknown strategy `{other}`"))),
        }
    }
}

/// What to do when a row violates a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Fail the write, aborting the run.
    #[default]
    Fail,
    /// Append `ON CONFLICT DO NOTHING`; skipped rows are counted, not errors.
    Skip,
}

impl ConflictPolicy {
    pub(crate) fn clause(&self) -> &'static str {
        match self {
            ConflictPolicy::Fail => "",
            ConflictPolicy::Skip => " ON CONFLICT DO NOTHING",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::Fail => "fail",
            ConflictPolicy::Skip => "skip",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" | "error" => Ok(ConflictPolicy::Fail),
            "skip" | "ignore" | "do_nothing" => Ok(ConflictPolicy::Skip),
            other => Err(LoadError::Config(format!("unknown conflict policy `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(
            "copy-from-csv".parse::<StrategyKind>().unwrap(),
            StrategyKind::StreamingCopy
        );
        assert!("parallel_copy".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn conflict_clause() {
        assert_eq!(ConflictPolicy::Fail.clause(), "");
        assert_eq!(ConflictPolicy::Skip.clause(), " ON CONFLICT DO NOTHING");
        assert_eq!("ignore".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Skip);
    }
}
