//! Commit boundaries for the INSERT-based strategies.
//!
//! A transaction is opened lazily on the first write, committed whenever the
//! rows recorded since the last commit reach `commit_every`, and committed a
//! final time by [`TransactionController::finish`] so a trailing partial batch
//! is never left open. Dropping the controller with an open transaction rolls
//! it back.

use crate::error::LoadError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

pub struct TransactionController {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    commit_every: u64,
    pending_rows: u64,
    committed_rows: u64,
    commits: usize,
}

impl TransactionController {
    pub fn new(pool: &PgPool, commit_every: usize) -> Self {
        Self {
            pool: pool.clone(),
            tx: None,
            commit_every: commit_every.max(1) as u64,
            pending_rows: 0,
            committed_rows: 0,
            commits: 0,
        }
    }

    /// Connection inside the open transaction, beginning one if needed.
    pub async fn executor(&mut self) -> Result<&mut PgConnection, LoadError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                log::trace!("beginning transaction");
                self.pool.begin().await.map_err(LoadError::Connection)?
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Record `rows` source rows as written in the open transaction and
    /// commit if the interval has been reached.
    ///
    /// # Returns
    /// `true` if a commit happened.
    pub async fn record(&mut self, rows: u64) -> Result<bool, LoadError> {
        self.pending_rows += rows;
        if self.pending_rows >= self.commit_every {
            self.commit().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Commit the open transaction, if any.
    pub async fn commit(&mut self) -> Result<(), LoadError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            self.committed_rows += self.pending_rows;
            self.pending_rows = 0;
            self.commits += 1;
            log::debug!(
                "commit #{}: {} rows durable",
                self.commits,
                self.committed_rows
            );
        }
        Ok(())
    }

    /// Commit whatever is still open. Returns the total number of commits.
    pub async fn finish(&mut self) -> Result<usize, LoadError> {
        self.commit().await?;
        Ok(self.commits)
    }

    /// Source rows covered by completed commits.
    pub fn committed_rows(&self) -> u64 {
        self.committed_rows
    }
}
