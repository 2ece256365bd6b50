//! Lumen - edge-triggered static file server
//!
//! Core library: the per-connection HTTP engine, the worker pool, the idle
//! timer list and the epoll event loop that ties them together.

pub mod config;
pub mod http;
pub mod pool;
pub mod server;
pub mod timer;
