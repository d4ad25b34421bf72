//! Bounded worker pool for per-file I/O work

use crate::error::ScanError;
use rayon::prelude::*;

/// Default number of workers
pub const DEFAULT_WORKER_THREADS: usize = 6;

/// Upper bound accepted for the pool size
pub const MAX_WORKER_THREADS: usize = 256;

/// Fixed-size pool running independent per-file tasks
///
/// Tasks never wait on each other. Output order matches input order, which
/// keeps downstream grouping deterministic.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool with `threads` workers
    pub fn new(threads: usize) -> Result<Self, ScanError> {
        if threads == 0 || threads > MAX_WORKER_THREADS {
            return Err(ScanError::InvalidWorkerCount(threads));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("modlens-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Number of workers
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` over every item on the pool
    pub fn map<T, U, F>(&self, items: &[T], task: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(task).collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_map_preserves_order() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<u64> = (0..1000).collect();
        let doubled = pool.map(&items, |x| x * 2);
        assert_eq!(doubled, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_every_item_runs_once() {
        let pool = WorkerPool::new(DEFAULT_WORKER_THREADS).unwrap();
        let counter = AtomicUsize::new(0);
        let items = vec![(); 250];
        pool.map(&items, |()| counter.fetch_add(1, Ordering::Relaxed));
        assert_eq!(counter.load(Ordering::Relaxed), 250);
        assert_eq!(pool.threads(), DEFAULT_WORKER_THREADS);
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(ScanError::InvalidWorkerCount(0))
        ));
        assert!(WorkerPool::new(MAX_WORKER_THREADS + 1).is_err());
    }
}
