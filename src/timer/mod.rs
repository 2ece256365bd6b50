//! Idle-connection timers
//!
//! A deadline-ordered list of timers, swept periodically by the event loop.
//! The list is owned by the event-loop thread and never shared.

pub mod list;

pub use list::{TimerId, TimerList};
