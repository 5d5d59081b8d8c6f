//! Per-run context, state machine, and timing.
//!
//! A [`StrategyRun`] is created when a strategy starts and consumed when it
//! ends. It owns every counter the run needs so no progress state outlives the
//! run or leaks between strategies.

use crate::error::LoadError;
use crate::load::StrategyKind;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of a strategy run.
///
/// `Idle -> Reading -> (Accumulating <-> Flushing)* -> Draining -> Committed | Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Reading,
    Accumulating,
    Flushing,
    Draining,
    Committed,
    Aborted,
}

#[derive(Debug)]
pub struct StrategyRun {
    strategy: StrategyKind,
    state: RunState,
    rows_read: u64,
    rows_loaded: u64,
    flushes: usize,
    started: Instant,
}

impl StrategyRun {
    pub fn start(strategy: StrategyKind) -> Self {
        log::info!("starting {}", strategy);
        Self {
            strategy,
            state: RunState::Idle,
            rows_read: 0,
            rows_loaded: 0,
            flushes: 0,
            started: Instant::now(),
        }
    }

    pub fn transition(&mut self, next: RunState) {
        if self.state != next {
            log::trace!("{}: {:?} -> {:?}", self.strategy, self.state, next);
            self.state = next;
        }
    }

    pub fn record_read(&mut self) {
        self.rows_read += 1;
        self.transition(RunState::Accumulating);
    }

    /// Record rows read in bulk, e.g. after materializing the whole source.
    pub fn record_reads(&mut self, rows: u64) {
        self.rows_read += rows;
    }

    /// Record a completed flush and the rows it actually inserted.
    pub fn record_flush(&mut self, rows_loaded: u64) {
        self.flushes += 1;
        self.rows_loaded += rows_loaded;
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// End the run: `Committed` with a result, or `Aborted` with the error
    /// wrapped alongside the number of rows made durable before the failure.
    pub fn conclude(
        mut self,
        outcome: Result<usize, LoadError>,
        committed_rows: u64,
    ) -> Result<RunResult, LoadError> {
        let elapsed = self.elapsed();
        match outcome {
            Ok(commits) => {
                self.transition(RunState::Committed);
                let result = RunResult {
                    strategy: self.strategy,
                    rows_read: self.rows_read,
                    rows_loaded: self.rows_loaded,
                    conflicts_skipped: self.rows_read.saturating_sub(self.rows_loaded),
                    flushes: self.flushes,
                    commits,
                    elapsed,
                };
                log::info!(
                    "{} committed {} rows ({} skipped on conflict) in {} flushes, {:.3}s",
                    result.strategy,
                    result.rows_loaded,
                    result.conflicts_skipped,
                    result.flushes,
                    result.elapsed_seconds()
                );
                Ok(result)
            }
            Err(source) => {
                self.transition(RunState::Aborted);
                log::error!(
                    "{} aborted after {:.3}s ({} rows committed): {}",
                    self.strategy,
                    elapsed.as_secs_f64(),
                    committed_rows,
                    source
                );
                Err(LoadError::Aborted {
                    strategy: self.strategy,
                    committed_rows,
                    source: Box::new(source),
                })
            }
        }
    }
}

/// Outcome of one committed strategy run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub strategy: StrategyKind,
    pub rows_read: u64,
    pub rows_loaded: u64,
    /// Rows omitted by an explicit `ON CONFLICT DO NOTHING` policy.
    pub conflicts_skipped: u64,
    pub flushes: usize,
    pub commits: usize,
    #[serde(rename = "elapsed_seconds", serialize_with = "serialize_seconds")]
    pub elapsed: Duration,
}

impl RunResult {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed_seconds();
        if secs > 0.0 {
            self.rows_loaded as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} elapsed time in seconds: {:.3}",
            self.strategy,
            self.elapsed_seconds()
        )
    }
}

fn serialize_seconds<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
