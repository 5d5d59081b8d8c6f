use crate::error::LoadError;
use crate::load::{
    Batch, ConflictPolicy, Destination, LoadStrategy, RowSource, RunResult, RunState,
    StrategyKind, StrategyRun, TransactionController,
};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_PAGE_SIZE: usize = 1_000;

/// Hands whole batches to [`Destination::insert_values_paged`] with a page
/// size hint; the destination issues one bound statement per page.
#[derive(Debug, Clone)]
pub struct BulkParamInsert {
    batch_size: usize,
    page_size: usize,
    conflict: ConflictPolicy,
}

impl BulkParamInsert {
    pub fn new(batch_size: usize, page_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            page_size: page_size.max(1),
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
        let outcome = destination
            .insert_values_paged(tx.executor().await?, &rows, self.page_size, self.conflict)
            .await?;
        run.record_flush(outcome.rows_affected);
        tx.record(rows.len() as u64).await?;
        log::debug!(
            "{}: flush #{} wrote {} rows in {} pages",
            self.kind(),
            run.flushes(),
            outcome.rows_affected,
            outcome.pages
        );
        Ok(())
    }
}

impl Default for BulkParamInsert {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE)
    }
}

impl LoadStrategy for BulkParamInsert {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BulkParamInsert
    }

    async fn run(&self, source: &RowSource, destination: &Destination) -> Result<RunResult, LoadError> {
        let mut run = StrategyRun::start(self.kind());
        let mut tx = TransactionController::new(destination.pool(), self.batch_size);
        let outcome = self.load(source, destination, &mut run, &mut tx).await;
        run.conclude(outcome, tx.committed_rows())
    }
}
