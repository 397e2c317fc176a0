//! Parallel execution configuration.
//!
//! A query materialization runs under a named backend: `threads` builds a
//! dedicated rayon pool that lives only for the duration of the call, and
//! `serial` evaluates in place. The backend choice affects wall-clock time
//! only; the numerical content of the output is identical either way.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// A named execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecBackend {
    /// A dedicated thread pool sized by `ExecConfig::workers`.
    Threads,
    /// In-place sequential evaluation.
    Serial,
}

impl ExecBackend {
    /// Get the backend name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threads => "threads",
            Self::Serial => "serial",
        }
    }
}

impl std::str::FromStr for ExecBackend {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "threads" => Ok(Self::Threads),
            "serial" => Ok(Self::Serial),
            other => Err(DatasetError::Exec(format!(
                "unknown execution backend: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ExecBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Worker count default: twice the CPUs the process is scheduled on.
///
/// `available_parallelism` honours affinity masks and cgroup limits, so a
/// process pinned to 4 of 32 cores gets 8 workers.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Scoped execution configuration for a single materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecConfig {
    pub backend: ExecBackend,
    pub workers: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            backend: ExecBackend::Threads,
            workers: default_workers(),
        }
    }
}

impl ExecConfig {
    pub fn new(backend: ExecBackend, workers: usize) -> Self {
        Self { backend, workers }
    }

    /// Apply `f` to every item, in order, under the configured backend.
    ///
    /// The `threads` backend builds its pool on entry and drops it on exit,
    /// including on error or panic, so the configuration is scoped to this
    /// one call.
    pub fn map<I, R, F>(&self, items: &[I], f: F) -> Result<Vec<R>>
    where
        I: Sync,
        R: Send,
        F: Fn(&I) -> R + Send + Sync,
    {
        match self.backend {
            ExecBackend::Serial => Ok(items.iter().map(&f).collect()),
            ExecBackend::Threads => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.workers.max(1))
                    .thread_name(|i| format!("interp-{i}"))
                    .build()
                    .map_err(|e| DatasetError::Exec(e.to_string()))?;

                Ok(pool.install(|| items.par_iter().map(&f).collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_workers_doubles_available_parallelism() {
        let cpus = std::thread::available_parallelism().unwrap().get();
        assert_eq!(default_workers(), cpus * 2);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!(ExecBackend::from_str("threads").unwrap(), ExecBackend::Threads);
        assert_eq!(ExecBackend::from_str("SERIAL").unwrap(), ExecBackend::Serial);
        assert!(ExecBackend::from_str("loky").is_err());
    }

    #[test]
    fn test_map_preserves_order() {
        let items: Vec<u64> = (0..100).collect();
        let config = ExecConfig::new(ExecBackend::Threads, 4);

        let out = config.map(&items, |&i| i * 3).unwrap();
        assert_eq!(out, items.iter().map(|i| i * 3).collect::<Vec<_>>());
    }

    #[test]
    fn test_backends_agree() {
        let items: Vec<u64> = (0..50).collect();
        let work = |&i: &u64| (i as f64).sqrt();

        let serial = ExecConfig::new(ExecBackend::Serial, 1)
            .map(&items, work)
            .unwrap();
        let threads = ExecConfig::new(ExecBackend::Threads, 8)
            .map(&items, work)
            .unwrap();

        assert_eq!(serial, threads);
    }
}
