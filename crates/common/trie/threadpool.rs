use crossbeam::channel::{SendError, Sender, unbounded};
use std::thread::{Builder, Scope, ScopedJoinHandle};

use tracing::warn;

use crate::error::TrieError;

type Task<'scope> = Box<dyn 'scope + Send + FnOnce()>;

/// Fixed set of scoped workers pulling tasks from a shared queue.
///
/// Tasks may borrow anything that outlives the scope. Workers exit once the pool is joined
/// and the queue is drained.
pub struct ThreadPool<'scope> {
    sender: Sender<Task<'scope>>, // Implictly our threads in the thread pool have the receiver
    workers: Vec<ScopedJoinHandle<'scope, ()>>,
}

impl<'scope> ThreadPool<'scope> {
    pub fn new(thread_count: usize, scope: &'scope Scope<'scope, '_>) -> Self {
        let (sender, receiver) = unbounded::<Task<'scope>>();
        let mut workers = Vec::with_capacity(thread_count);

        for i in 0..thread_count {
            let receiver = receiver.clone();
            let spawned = Builder::new()
                .name(format!("TrieWorker {i}"))
                .spawn_scoped(scope, move || {
                    while let Ok(task) = receiver.recv() {
                        task();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => warn!(%err, worker = i, "Failed to spawn trie worker"),
            }
        }
        ThreadPool { sender, workers }
    }

    /// Queues a task. Runs it on the calling thread if no worker is alive to take it.
    pub fn execute(&self, task: Task<'scope>) {
        if self.workers.is_empty() {
            return task();
        }
        if let Err(SendError(task)) = self.sender.send(task) {
            task();
        }
    }

    /// Returns the total number of workers in the pool.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every queued task to finish.
    /// Fails if any worker panicked, in which case some tasks may not have run.
    pub fn join(self) -> Result<(), TrieError> {
        drop(self.sender);
        let mut panicked = false;
        for worker in self.workers {
            panicked |= worker.join().is_err();
        }
        if panicked {
            return Err(TrieError::WorkerPanicked);
        }
        Ok(())
    }
}
