use std::num::NonZeroUsize;

use serde::Deserialize;
use tracing::warn;

pub const CONFIG_PREFIX: &str = "GMPT_";

/// Workers used when the available parallelism can't be queried
const FALLBACK_WORKERS: usize = 8;
const DEFAULT_MIN_CHUNK_SIZE: usize = 64;

/// Settings shared by the parallel lookup and the partitioned ordered digest.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Upper bound on worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Inputs smaller than this are never split further
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKERS)
}

fn default_min_chunk_size() -> usize {
    DEFAULT_MIN_CHUNK_SIZE
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

impl ParallelConfig {
    /// Reads `GMPT_WORKERS` and `GMPT_MIN_CHUNK_SIZE`, missing values take their defaults
    pub fn try_from_env() -> Result<Self, envy::Error> {
        envy::prefixed(CONFIG_PREFIX)
            .from_env::<Self>()
            .map(Self::sanitized)
    }

    /// Same as [`ParallelConfig::try_from_env`] but falls back to the defaults on invalid values
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_else(|err| {
            warn!(%err, "Invalid parallel trie configuration, using defaults");
            Self::default()
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self.sanitized()
    }

    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = min_chunk_size;
        self.sanitized()
    }

    /// Amount of chunks `total` items are split into
    pub fn chunk_count(&self, total: usize) -> usize {
        total
            .div_ceil(self.min_chunk_size.max(1))
            .min(self.workers)
            .max(1)
    }

    /// Size of each chunk when splitting `total` items, the last one may be smaller
    pub fn chunk_size(&self, total: usize) -> usize {
        total.div_ceil(self.chunk_count(total)).max(1)
    }

    fn sanitized(self) -> Self {
        Self {
            workers: self.workers.max(1),
            min_chunk_size: self.min_chunk_size.max(1),
        }
    }
}
