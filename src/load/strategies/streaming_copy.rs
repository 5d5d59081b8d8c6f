use crate::error::LoadError;
use crate::load::{Destination, LoadStrategy, RowSource, RunResult, RunState, StrategyKind, StrategyRun};

pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Streams the file body straight into `COPY ... FROM STDIN`.
///
/// No client-side batching and no explicit transaction: the COPY is atomic,
/// so a single bad line aborts the run with nothing committed.
#[derive(Debug, Clone)]
pub struct StreamingCopy {
    chunk_bytes: usize,
}

impl StreamingCopy {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    async fn load(
        &self,
        source: &RowSource,
        destination: &Destination,
        run: &mut StrategyRun,
    ) -> Result<usize, LoadError> {
        run.transition(RunState::Reading);
        let body = source.body().await?;

        run.transition(RunState::Flushing);
        let outcome = destination.copy_in(body, self.chunk_bytes).await?;
        run.record_reads(outcome.records_sent);
        if outcome.chunks == 0 {
            return Ok(0);
        }

        run.record_flush(outcome.rows);
        log::debug!(
            "{}: copied {} of {} records in {} chunks",
            self.kind(),
            outcome.rows,
            outcome.records_sent,
            outcome.chunks
        );
        Ok(1)
    }
}

impl Default for StreamingCopy {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_BYTES)
    }
}

impl LoadStrategy for StreamingCopy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StreamingCopy
    }

    async fn run(&self, source: &RowSource, destination: &Destination) -> Result<RunResult, LoadError> {
        let mut run = StrategyRun::start(self.kind());
        let outcome = self.load(source, destination, &mut run).await;
        run.conclude(outcome, 0)
    }
}
