//! Parallel processing configuration and management
//!
//! This module resolves the number of workers used to dispatch periods and
//! builds the dedicated Rayon thread pool that runs them.

use crate::errors::{ExtractError, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

/// Configuration for parallel processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: usize,
}

impl ParallelConfig {
    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self { num_threads }
    }

    /// Number of workers the dispatcher will use; zero and one both mean sequential.
    pub fn workers(&self) -> usize {
        self.num_threads
    }

    pub fn is_sequential(&self) -> bool {
        self.num_threads <= 1
    }

    /// Build a dedicated Rayon thread pool with the configured number of threads
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let num_threads = self.num_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("extraction-worker-{}", i))
            .build()
            .map_err(|e| {
                ExtractError::ThreadPool(format!(
                    "Failed to initialize thread pool with {} threads: {}",
                    num_threads, e
                ))
            })?;

        info!(threads = num_threads, "configured extraction worker pool");
        Ok(pool)
    }

    /// The pool periods run on, `None` when they run on the calling thread
    pub fn pool(&self) -> Result<Option<ThreadPool>> {
        if self.is_sequential() {
            Ok(None)
        } else {
            self.build_pool().map(Some)
        }
    }
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    /// Log parallel processing information
    pub fn log_info(&self) {
        info!(
            current_threads = self.current_threads,
            available_cores = self.available_cores,
            available_parallelism = self.available_parallelism,
            "parallel processing information"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_config() {
        assert!(ParallelConfig::with_threads(0).is_sequential());
        assert!(ParallelConfig::with_threads(1).is_sequential());
        assert!(ParallelConfig::with_threads(1).pool().unwrap().is_none());

        let config = ParallelConfig::with_threads(3);
        assert!(!config.is_sequential());
        assert_eq!(config.workers(), 3);

        let pool = ParallelConfig::with_threads(2).pool().unwrap().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
