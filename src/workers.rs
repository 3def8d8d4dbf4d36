/// The workers module provides the bounded pool that runs conversion jobs: submit work, then
/// drain results in completion order.
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::errors::{RepriseError, Result};

pub struct Worker<T: Send + 'static> {
    pool: rayon::ThreadPool,
    tx: Sender<T>,
    rx: Receiver<T>,
    pending: usize,
}

impl<T: Send + 'static> Worker<T> {
    /// Create a pool with at most `max_workers` concurrent jobs.
    pub fn new(max_workers: usize) -> Result<Worker<T>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers.max(1))
            .build()
            .map_err(|e| RepriseError::Generic(format!("failed to start worker pool: {e}")))?;
        let (tx, rx) = channel();
        Ok(Worker { pool, tx, rx, pending: 0 })
    }

    /// Dispatch a job. Never blocks; excess jobs queue inside the pool.
    pub fn submit<F>(&mut self, job: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.tx.clone();
        self.pending += 1;
        self.pool.spawn(move || {
            // The receiver outlives all jobs; a send failure means the pass was torn down.
            let _ = tx.send(job());
        });
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Drain all outstanding jobs, yielding results as they complete. Blocks between items
    /// until every submitted job has reported.
    pub fn as_completed(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || {
            if self.pending == 0 {
                return None;
            }
            match self.rx.recv() {
                Ok(result) => {
                    self.pending -= 1;
                    Some(result)
                }
                Err(_) => None,
            }
        })
    }
}
