use crate::error::LoadError;
use crate::load::{
    Batch, ConflictPolicy, Destination, LoadStrategy, RowSource, RunResult, RunState,
    StrategyKind, StrategyRun, TransactionController,
};

/// 5,000 rows x 11 columns stays under the 65,535 bind parameter limit.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Accumulates rows into one multi-row VALUES statement per batch.
///
/// Values are bound as parameters, so a batch is capped at
/// `65_535 / arity` rows. Each full batch is flushed and committed; the
/// trailing partial batch is flushed and committed at end of stream.
#[derive(Debug, Clone)]
pub struct MultiRowInsert {
    batch_size: usize,
    conflict: ConflictPolicy,
}

impl MultiRowInsert {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            conflict: ConflictPolicy::Fail,
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
        let mut batch = Batch::new(self.batch_size);

        for row in source.rows()? {
            let row = row?;
            run.record_read();
            if batch.push(row) {
                run.transition(RunState::Flushing);
                self.flush(destination, run, tx, &mut batch).await?;
            }
        }

        run.transition(RunState::Draining);
        if !batch.is_empty() {
            self.flush(destination, run, tx, &mut batch).await?;
        }
        tx.finish().await
    }

    async fn flush(
        &self,
        destination: &Destination,
        run: &mut StrategyRun,
        tx: &mut TransactionController,
        batch: &mut Batch,
    ) -> Result<(), LoadError> {
        let rows = batch.take();
        let written = destination
            .insert_values(tx.executor().await?, &rows, self.conflict)
            .await?;
        run.record_flush(written);
        tx.record(rows.len() as u64).await?;
        log::debug!("{}: flush #{} wrote {} rows", self.kind(), run.flushes(), written);
        Ok(())
    }
}

impl Default for MultiRowInsert {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl LoadStrategy for MultiRowInsert {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MultiRowInsert
    }

    async fn run(&self, source: &RowSource, destination: &Destination) -> Result<RunResult, LoadError> {
        let mut run = StrategyRun::start(self.kind());
        let mut tx = TransactionController::new(destination.pool(), self.batch_size);
        let outcome = self.load(source, destination, &mut run, &mut tx).await;
        run.conclude(outcome, tx.committed_rows())
    }
}
