use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid pool size: {workers} workers, queue capacity {capacity}")]
    InvalidSize { workers: usize, capacity: usize },

    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        #[from]
        source: io::Error,
    },
}

/// A task the pool refused. The task is handed back untouched.
#[derive(Error)]
pub enum SubmitError<T> {
    #[error("task queue is full")]
    Full(T),

    #[error("pool has been shut down")]
    Stopped(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(task) | SubmitError::Stopped(task) => task,
        }
    }
}

impl<T> std::fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("Full(..)"),
            SubmitError::Stopped(_) => f.write_str("Stopped(..)"),
        }
    }
}

struct State<T> {
    queue: VecDeque<T>,
    stopped: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Worker threads pulling tasks from a bounded FIFO queue.
pub struct ThreadPool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> ThreadPool<T> {
    /// Spawns `workers` threads, each running `handler` on dequeued tasks.
    /// At most `capacity` tasks wait in the queue.
    pub fn new<F>(workers: usize, capacity: usize, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if workers == 0 || capacity == 0 {
            return Err(PoolError::InvalidSize { workers, capacity });
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                stopped: false,
            }),
            available: Condvar::new(),
            capacity,
        });
        let handler = Arc::new(handler);

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(workers),
        };

        for id in 0..workers {
            let shared = Arc::clone(&pool.shared);
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || run_worker(id, &shared, &*handler))?;
            tracing::trace!(worker = id, "Spawned worker thread");
            pool.workers.push(handle);
        }

        tracing::info!(workers, capacity, "Worker pool started");
        Ok(pool)
    }

    /// Enqueues a task without blocking.
    pub fn submit(&self, task: T) -> Result<(), SubmitError<T>> {
        let mut state = self.shared.lock();
        if state.stopped {
            return Err(SubmitError::Stopped(task));
        }
        if state.queue.len() >= self.shared.capacity {
            return Err(SubmitError::Full(task));
        }
        state.queue.push_back(task);
        drop(state);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Tasks enqueued but not yet claimed by a worker.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stops the pool: wakes every idle worker and joins all of them.
    /// Queued tasks that no worker claimed are dropped.
    pub fn shutdown(&mut self) {
        let dropped = {
            let mut state = self.shared.lock();
            state.stopped = true;
            std::mem::take(&mut state.queue)
        };
        self.shared.available.notify_all();

        if !dropped.is_empty() {
            tracing::debug!(tasks = dropped.len(), "Dropping queued tasks on shutdown");
        }
        drop(dropped);

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked outside a task");
            }
        }
    }
}

impl<T: Send + 'static> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Send + 'static> std::fmt::Debug for ThreadPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

fn run_worker<T, F>(id: usize, shared: &Shared<T>, handler: &F)
where
    F: Fn(T),
{
    loop {
        let task = {
            let mut state = shared.lock();
            loop {
                if state.stopped {
                    tracing::trace!(worker = id, "Worker stopping");
                    return;
                }
                if let Some(task) = state.queue.pop_front() {
                    break task;
                }
                state = shared
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(|| handler(task))).is_err() {
            tracing::error!(worker = id, "Task panicked");
        }
    }
}
