//! Component M: Worker Pool (spec §5 CONCURRENCY).
//!
//! Grounded in the teacher's `rayon` dependency (already in Cargo.toml,
//! otherwise unused by the teacher's single-threaded `worker.rs` loop) and
//! generalized into an explicit pool type so `threads` config controls
//! fan-out width, with a synchronous fallback per spec §7 TransientError.

use rayon::ThreadPool;

use crate::config::Threads;
use crate::errors::TransientError;

/// Wraps a `rayon::ThreadPool` sized per the `threads` config option.
/// `None` means run synchronously on the calling thread (either `threads =
/// 0` or pool construction failed and was downgraded).
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    pub fn build(threads: Threads) -> Self {
        let width = match threads {
            Threads::Auto => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            Threads::Fixed(0) => 0,
            Threads::Fixed(n) => n,
        };

        if width <= 1 {
            return WorkerPool { pool: None };
        }

        match rayon::ThreadPoolBuilder::new().num_threads(width).build() {
            Ok(pool) => WorkerPool { pool: Some(pool) },
            Err(e) => {
                log::warn!("{}", TransientError::PoolSpawnFailed(e.to_string()));
                WorkerPool { pool: None }
            }
        }
    }

    /// Synchronous pool, used in tests and whenever `threads = 0`.
    pub fn synchronous() -> Self {
        WorkerPool { pool: None }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Maps `f` over `items`, preserving input order in the output so that
    /// downstream first-wins tie-breaks over candidate plans remain
    /// deterministic regardless of the pool's actual scheduling order.
    pub fn map_ordered<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| {
                use rayon::prelude::*;
                items.into_par_iter().map(f).collect()
            }),
            None => items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synchronous_pool_preserves_order() {
        let pool = WorkerPool::synchronous();
        let out = pool.map_ordered(vec![1, 2, 3, 4], |x| x * 10);
        assert_eq!(out, vec![10, 20, 30, 40]);
    }

    #[test]
    fn fixed_zero_threads_is_synchronous() {
        let pool = WorkerPool::build(Threads::Fixed(0));
        assert!(!pool.is_parallel());
    }

    #[test]
    fn parallel_pool_preserves_order() {
        let pool = WorkerPool::build(Threads::Fixed(4));
        let out = pool.map_ordered((0..50).collect(), |x: i32| x * 2);
        let expected: Vec<i32> = (0..50).map(|x| x * 2).collect();
        assert_eq!(out, expected);
    }
}
