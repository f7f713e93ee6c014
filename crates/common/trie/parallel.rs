use std::{thread, time::Instant};

use tracing::debug;

use crate::{
    PathRLP, Trie, ValueRLP, config::ParallelConfig, error::TrieError, threadpool::ThreadPool,
};

type Lookup = Option<Result<Option<ValueRLP>, TrieError>>;

impl Trie {
    /// Looks up every key, splitting the batch among worker threads.
    /// Results come back in the same order as `keys`.
    pub fn parallel_get(&self, keys: &[PathRLP]) -> Result<Vec<Option<ValueRLP>>, TrieError> {
        self.parallel_get_with_config(keys, &ParallelConfig::default())
    }

    /// Same as [`Trie::parallel_get`] with explicit worker and chunking settings
    pub fn parallel_get_with_config(
        &self,
        keys: &[PathRLP],
        config: &ParallelConfig,
    ) -> Result<Vec<Option<ValueRLP>>, TrieError> {
        let chunks = config.chunk_count(keys.len());
        if chunks <= 1 {
            return keys.iter().map(|key| self.get(key)).collect();
        }
        let start = Instant::now();
        let chunk_size = config.chunk_size(keys.len());

        let mut results: Vec<Lookup> = Vec::new();
        results.resize_with(keys.len(), || None);
        thread::scope(|scope| {
            let pool = ThreadPool::new(chunks, scope);
            for (keys, results) in keys
                .chunks(chunk_size)
                .zip(results.chunks_mut(chunk_size))
            {
                pool.execute(Box::new(move || {
                    for (key, result) in keys.iter().zip(results.iter_mut()) {
                        *result = Some(self.get(key));
                    }
                }));
            }
            pool.join()
        })?;

        debug!(
            keys = keys.len(),
            chunks,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Parallel trie lookup"
        );
        results
            .into_iter()
            .map(|result| result.unwrap_or(Err(TrieError::WorkerPanicked)))
            .collect()
    }
}
