//! Strategy benchmark runner.
//!
//! Runs each requested strategy against a freshly truncated destination and
//! ranks the committed runs by wall-clock time.

use crate::config::StrategySettings;
use crate::error::LoadError;
use crate::load::{Destination, LoadStrategy, RowSource, RunResult, Strategy, StrategyKind};
use serde::Serialize;
use std::fmt;

pub struct Benchmark<'a> {
    source: &'a RowSource,
    destination: &'a Destination,
    settings: &'a StrategySettings,
}

impl<'a> Benchmark<'a> {
    pub fn new(
        source: &'a RowSource,
        destination: &'a Destination,
        settings: &'a StrategySettings,
    ) -> Self {
        Self {
            source,
            destination,
            settings,
        }
    }

    /// Truncate the destination, then run one strategy to completion.
    pub async fn run_one(&self, kind: StrategyKind) -> Result<RunResult, LoadError> {
        let strategy = Strategy::from_config(kind, self.settings, self.destination.schema())?;
        self.destination.truncate().await?;
        strategy.run(self.source, self.destination).await
    }

    /// Run every strategy in `kinds` in order.
    ///
    /// A failing strategy is recorded in the report and the remaining ones
    /// still run.
    pub async fn run_all(&self, kinds: &[StrategyKind]) -> BenchmarkReport {
        let mut report = BenchmarkReport::default();
        for &kind in kinds {
            match self.run_one(kind).await {
                Ok(result) => report.results.push(result),
                Err(err) => {
                    log::warn!("{} failed: {}", kind, err);
                    report.failures.push(StrategyFailure {
                        strategy: kind,
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchmarkReport {
    pub results: Vec<RunResult>,
    pub failures: Vec<StrategyFailure>,
}

impl BenchmarkReport {
    /// Committed runs, fastest first.
    pub fn ranked(&self) -> Vec<&RunResult> {
        let mut ranked: Vec<&RunResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| a.elapsed.cmp(&b.elapsed));
        ranked
    }

    pub fn fastest(&self) -> Option<&RunResult> {
        self.results.iter().min_by_key(|r| r.elapsed)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, result) in self.ranked().into_iter().enumerate() {
            writeln!(
                f,
                "{:>2}. {:<18} {:>10.3}s {:>12.0} rows/s  ({} rows, {} flushes, {} commits)",
                rank + 1,
                result.strategy,
                result.elapsed_seconds(),
                result.rows_per_second(),
                result.rows_loaded,
                result.flushes,
                result.commits
            )?;
        }
        for failure in &self.failures {
            writeln!(f, " x. {:<18} failed ({}): {}", failure.strategy, failure.kind, failure.message)?;
        }
        if let Some(fastest) = self.fastest() {
            writeln!(f, "fastest: {}", fastest.strategy)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(strategy: StrategyKind, millis: u64) -> RunResult {
        RunResult {
            strategy,
            rows_read: 100,
            rows_loaded: 100,
            conflicts_skipped: 0,
            flushes: 1,
            commits: 1,
            elapsed: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_ranking() {
        let report = BenchmarkReport {
            results: vec![
                result(StrategyKind::RowInsert, 9_000),
                result(StrategyKind::StreamingCopy, 300),
                result(StrategyKind::ColumnarUnnest, 700),
            ],
            failures: Vec::new(),
        };

        let order: Vec<_> = report.ranked().iter().map(|r| r.strategy).collect();
        assert_eq!(
            order,
            vec![
                StrategyKind::StreamingCopy,
                StrategyKind::ColumnarUnnest,
                StrategyKind::RowInsert
            ]
        );
        assert_eq!(report.fastest().unwrap().strategy, StrategyKind::StreamingCopy);

        let text = report.to_string();
        assert!(text.contains("fastest: streaming_copy"));
    }

    #[test]
    fn test_empty_report() {
        let report = BenchmarkReport::default();
        assert!(report.fastest().is_none());
        assert!(report.to_string().is_empty());
    }
}
