//! # Server Module
//!
//! The listener, acceptor coroutines, provision pool, and per-connection
//! engine, built on the `may` coroutine runtime.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener → acceptor coroutine → provision pool → connection engine
//!                     │                                      │
//!                     └── spawns the next acceptor           ├── parser → router → middleware → handler
//!                                                            └── respond / keep-alive / SSE upgrade
//! ```
//!
//! One accept is always outstanding: each acceptor coroutine takes a
//! single connection, immediately spawns its sibling on the same shared
//! listener, then borrows a provision (parking when the pool is
//! exhausted) and runs the connection engine to completion. Concurrency
//! is therefore bounded by the provision pool, not by accept volume.

mod conn;
pub(crate) mod provision;
#[allow(clippy::module_inception)]
mod server;

pub use server::{Server, ServerHandle};
