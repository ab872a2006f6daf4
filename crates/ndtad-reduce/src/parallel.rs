use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),
}

/// Controls how reduction work is distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// Use the global Rayon thread pool.
    ///
    /// Each task handles at least a configured threshold of work items, so small
    /// reductions stay on few threads.
    #[default]
    Auto,

    /// Run sequentially on the current thread.
    ///
    /// Useful for small inputs, debugging, or reproducible accumulation order.
    Serial,

    /// Run on a local thread pool with `n` threads, splitting the work into `n`
    /// contiguous parts.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

impl ExecutionStrategy {
    /// Minimum number of work items per task for `len` items.
    fn min_len(self, len: usize, threshold: usize) -> usize {
        match self {
            ExecutionStrategy::Auto => threshold.max(1),
            ExecutionStrategy::Serial => len.max(1),
            ExecutionStrategy::Fixed(n) => len.div_ceil(n.max(1)).max(1),
        }
    }
}

fn build_pool(n: usize) -> Result<rayon::ThreadPool, ParallelError> {
    if n == 0 {
        return Err(ParallelError::InvalidThreadCount(n));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build()
        .map_err(|e| ParallelError::BuildError(e.to_string()))
}

/// Writes `f(i)` into `dst[i]` for every position, distributing positions across
/// workers. Each position is written by exactly one worker.
///
/// # Arguments
///
/// * `strategy` - The execution strategy.
/// * `dst` - The destination slice.
/// * `threshold` - Minimum positions per task under [`ExecutionStrategy::Auto`].
/// * `f` - Computes the value of one position.
pub fn fill_indexed<T, F>(
    strategy: ExecutionStrategy,
    dst: &mut [T],
    threshold: usize,
    f: F,
) -> Result<(), ParallelError>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    let min_len = strategy.min_len(dst.len(), threshold);
    let par_fill = |dst: &mut [T]| {
        dst.par_iter_mut()
            .enumerate()
            .with_min_len(min_len)
            .for_each(|(i, d)| *d = f(i));
    };

    match strategy {
        ExecutionStrategy::Serial => {
            dst.iter_mut().enumerate().for_each(|(i, d)| *d = f(i));
        }
        ExecutionStrategy::Auto => par_fill(dst),
        ExecutionStrategy::Fixed(n) => {
            let pool = build_pool(n)?;
            pool.install(|| par_fill(dst));
        }
    }
    Ok(())
}

/// Folds the indices `0..len` into partial results and merges the partials.
///
/// Every worker starts from `identity()`; `reduce` must be associative because the
/// grouping of partials depends on the strategy.
pub fn fold_indexed<T, ID, FOLD, RED>(
    strategy: ExecutionStrategy,
    len: usize,
    threshold: usize,
    identity: ID,
    fold: FOLD,
    reduce: RED,
) -> Result<T, ParallelError>
where
    T: Send,
    ID: Fn() -> T + Sync + Send,
    FOLD: Fn(T, usize) -> T + Sync + Send,
    RED: Fn(T, T) -> T + Sync + Send,
{
    let min_len = strategy.min_len(len, threshold);
    let par_fold = || {
        (0..len)
            .into_par_iter()
            .with_min_len(min_len)
            .fold(&identity, &fold)
            .reduce(&identity, &reduce)
    };

    match strategy {
        ExecutionStrategy::Serial => Ok((0..len).fold(identity(), &fold)),
        ExecutionStrategy::Auto => Ok(par_fold()),
        ExecutionStrategy::Fixed(n) => {
            let pool = build_pool(n)?;
            Ok(pool.install(par_fold))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_serial() -> Result<(), ParallelError> {
        let mut dst = vec![0; 4];
        fill_indexed(ExecutionStrategy::Serial, &mut dst, 1, |i| i * 2)?;
        assert_eq!(dst, vec![0, 2, 4, 6]);
        Ok(())
    }

    #[test]
    fn test_fill_auto() -> Result<(), ParallelError> {
        let mut dst = vec![0; 1000];
        fill_indexed(ExecutionStrategy::Auto, &mut dst, 16, |i| i + 1)?;
        assert!(dst.iter().enumerate().all(|(i, &v)| v == i + 1));
        Ok(())
    }

    #[test]
    fn test_fill_fixed() -> Result<(), ParallelError> {
        let mut dst = vec![0u64; 37];
        fill_indexed(ExecutionStrategy::Fixed(4), &mut dst, 1, |i| (i * i) as u64)?;
        assert_eq!(dst[6], 36);
        assert_eq!(dst[36], 1296);
        Ok(())
    }

    #[test]
    fn test_fixed_zero_threads() {
        let mut dst = vec![0; 1];
        let res = fill_indexed(ExecutionStrategy::Fixed(0), &mut dst, 1, |_| 1);
        assert_eq!(res, Err(ParallelError::InvalidThreadCount(0)));
        let res = fold_indexed(ExecutionStrategy::Fixed(0), 1, 1, || 0, |a, _| a, |a, b| a + b);
        assert_eq!(res, Err(ParallelError::InvalidThreadCount(0)));
    }

    #[test]
    fn test_fold_matches_across_strategies() -> Result<(), ParallelError> {
        let sum = |strategy| fold_indexed(strategy, 10_000, 64, || 0u64, |a, i| a + i as u64, |a, b| a + b);
        let expected = (0..10_000u64).sum::<u64>();
        assert_eq!(sum(ExecutionStrategy::Serial)?, expected);
        assert_eq!(sum(ExecutionStrategy::Auto)?, expected);
        assert_eq!(sum(ExecutionStrategy::Fixed(3))?, expected);
        Ok(())
    }

    #[test]
    fn test_strategy_serde() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&ExecutionStrategy::Fixed(4))?, r#"{"Fixed":4}"#);
        let s: ExecutionStrategy = serde_json::from_str(r#""Serial""#)?;
        assert_eq!(s, ExecutionStrategy::Serial);
        Ok(())
    }
}
