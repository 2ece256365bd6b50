//! Fixed-size worker pool
//!
//! A bounded FIFO task queue served by a fixed number of worker threads.
//! Submission never blocks: a full queue hands the task back to the caller.

pub mod threadpool;

pub use threadpool::{PoolError, SubmitError, ThreadPool};
