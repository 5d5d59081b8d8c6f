//! Columnar UNNEST insert.
//!
//! Trades memory for simplicity: the whole source is materialized, then each
//! window is transposed into parallel column arrays and expanded back into
//! rows server-side by `UNNEST`.

use crate::error::LoadError;
use crate::load::{
    ColumnBlock, ConflictPolicy, Destination, LoadStrategy, RowSource, RunResult, RunState,
    StrategyKind, StrategyRun, TransactionController, windows,
};

pub const DEFAULT_WINDOW: usize = 10_000;

#[derive(Debug, Clone)]
pub struct ColumnarUnnest {
    window: usize,
    conflict: ConflictPolicy,
}

impl ColumnarUnnest {
    /// Windowed UNNEST insert that skips conflicting rows by default.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            conflict: ConflictPolicy::Skip,
        }
    }

    pub fn with_conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    async fn load(
        &self,
        source: &RowSource,
        destination: &Destination,
        run: &mut StrategyRun,
        tx: &mut TransactionController,
    ) -> Result<usize, LoadError> {
        run.transition(RunState::Reading);
        let rows = source.load_all()?;
        run.record_reads(rows.len() as u64);

        for range in windows(rows.len(), self.window) {
            let window_len = range.len();
            run.transition(if window_len < self.window {
                RunState::Draining
            } else {
                RunState::Flushing
            });

            // Transposition and the length check both happen before the
            // transaction is touched.
            let block = ColumnBlock::from_rows(destination.schema(), &rows[range])?;
            block.validate(destination.schema())?;

            let written = destination
                .insert_unnest(tx.executor().await?, &block, self.conflict)
                .await?;
            run.record_flush(written);
            tx.record(window_len as u64).await?;
            log::debug!(
                "{}: window #{} wrote {} of {} rows",
                self.kind(),
                run.flushes(),
                written,
                window_len
            );
        }

        run.transition(RunState::Draining);
        tx.finish().await
    }
}

impl Default for ColumnarUnnest {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl LoadStrategy for ColumnarUnnest {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ColumnarUnnest
    }

    async fn run(&self, source: &RowSource, destination: &Destination) -> Result<RunResult, LoadError> {
        let mut run = StrategyRun::start(self.kind());
        let mut tx = TransactionController::new(destination.pool(), self.window);
        let outcome = self.load(source, destination, &mut run, &mut tx).await;
        run.conclude(outcome, tx.committed_rows())
    }
}
