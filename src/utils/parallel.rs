//! Worker pool for independent units of work

use crate::error::{FraudlabError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of worker threads (None = rayon's global pool)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n.max(1));
        self
    }

    /// Run every unit on the calling thread
    pub fn sequential() -> Self {
        Self { n_threads: Some(1) }
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Map a fallible function over independent items on a worker pool.
///
/// Results come back in input order, so the output does not depend on the
/// number of workers. The first error encountered is returned.
pub fn try_parallel_map<T, U, F>(items: Vec<T>, config: &ParallelConfig, f: F) -> Result<Vec<U>>
where
    T: Send,
    U: Send,
    F: Fn(T) -> Result<U> + Send + Sync,
{
    match config.n_threads {
        Some(1) => items.into_iter().map(f).collect(),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| FraudlabError::ThreadPoolError(e.to_string()))?;
            pool.install(|| items.into_par_iter().map(f).collect())
        }
        None => items.into_par_iter().map(f).collect(),
    }
}
