//! Row-at-a-time insert: the baseline every other strategy is measured against.

use crate::error::LoadError;
use crate::load::{
    ConflictPolicy, Destination, LoadStrategy, RowSource, RunResult, RunState, StrategyKind,
    StrategyRun, TransactionController,
};

pub const DEFAULT_COMMIT_EVERY: usize = 5_000;

/// One bound INSERT per row, committing every `commit_every` rows and once
/// more at end of stream.
///
/// This is the only strategy with durable progress inside a run: when a write
/// fails, the error's [`LoadError::resume_offset`] names the first row not yet
/// committed, and a new run built with [`RowInsert::resume_from`] picks up there.
#[derive(Debug, Clone)]
pub struct RowInsert {
    commit_every: usize,
    conflict: ConflictPolicy,
    resume_from: u64,
}

impl RowInsert {
    pub fn new(commit_every: usize) -> Self {
        Self {
            commit_every: commit_every.max(1),
            conflict: ConflictPolicy::Fail,
            resume_from: 0,
        }
    }

    pub fn with_conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Skip the first `rows` source rows, already committed by an earlier run.
    pub fn resume_from(mut self, rows: u64) -> Self {
        self.resume_from = rows;
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
        if self.resume_from > 0 {
            log::info!("{}: resuming after row {}", self.kind(), self.resume_from);
        }

        for (index, row) in source.rows()?.enumerate() {
            if (index as u64) < self.resume_from {
                continue;
            }
            let row = row?;
            run.record_read();

            run.transition(RunState::Flushing);
            let written = destination
                .insert_row(tx.executor().await?, &row, self.conflict)
                .await?;
            run.record_flush(written);
            tx.record(1).await?;
        }

        run.transition(RunState::Draining);
        tx.finish().await
    }
}

impl Default for RowInsert {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_EVERY)
    }
}

impl LoadStrategy for RowInsert {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RowInsert
    }

    async fn run(&self, source: &RowSource, destination: &Destination) -> Result<RunResult, LoadError> {
        let mut run = StrategyRun::start(self.kind());
        let mut tx = TransactionController::new(destination.pool(), self.commit_every);
        let outcome = self.load(source, destination, &mut run, &mut tx).await;
        run.conclude(outcome, self.resume_from + tx.committed_rows())
    }
}
