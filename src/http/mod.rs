//! HTTP protocol implementation.
//!
//! This module implements the per-connection request/response engine of a
//! GET-only HTTP/1.1 static file server with keep-alive support. It never
//! blocks: every read and write is non-blocking and a would-block result is
//! reported to the caller as the readiness the connection waits for next.
//!
//! # Architecture
//!
//! - **`parser`**: Restartable line-oriented request parser over a fixed read buffer
//! - **`request`**: The parsed request line and recognized headers
//! - **`resource`**: Resolution of the request target against the document root
//! - **`response`**: Status codes and their canonical bodies
//! - **`writer`**: Bounded response-header assembly and the scatter/gather send loop
//! - **`connection`**: The state machine tying the pieces together
//! - **`error`**: Protocol and resolution errors
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Parse whatever has been received so far
//!        └──────┬──────┘
//!               │ Request complete (or malformed)
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send header bytes + mapped file bytes
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → reset → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! The caller drives the machine with [`connection::Connection::handle`] and
//! re-arms the descriptor for the returned [`connection::Next`] interest.

pub mod connection;
pub mod error;
pub mod parser;
pub mod request;
pub mod resource;
pub mod response;
pub mod writer;
