//! Event loop
//!
//! One thread owns the listener, the readiness multiplexer, the connection
//! table and the idle timers. Ready connections are moved to the worker pool
//! whole; a worker hands the connection back through a channel and wakes the
//! loop, which re-arms the descriptor. A connection is therefore driven by at
//! most one thread at a time.

pub mod listener;
pub mod poller;

pub use listener::{Server, ShutdownHandle};
pub use poller::{Interest, Poller};
