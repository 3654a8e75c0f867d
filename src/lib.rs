//! snooze — a coroutine-based HTTP/1.1 server framework.
//!
//! The core is three tightly coupled pieces: a per-connection engine that
//! parses, dispatches, responds, and reuses sockets under bounded memory;
//! a path-segment routing trie with typed captures and wildcard tails;
//! and a Server-Sent Events upgrade path fed by a fan-out broadcast
//! channel. Everything runs on `may` stackful coroutines: blocking-style
//! code, suspension only at socket and channel operations.
//!
//! ```rust,no_run
//! use http::Method;
//! use snooze::{Context, Error, Respond, Router, RuntimeConfig, Server, ServerConfig};
//!
//! fn hello<'b>(_ctx: &Context<'b, ()>) -> Result<Respond<'b>, Error> {
//!     Ok(Respond::ok().mime("text/html").body("Hello, World!"))
//! }
//!
//! fn main() -> std::io::Result<()> {
//!     RuntimeConfig::from_env().apply();
//!     let mut router = Router::new();
//!     router.add(Method::GET, "/", hello).expect("route");
//!     let handle = Server::new(ServerConfig::new(), router, ()).start("127.0.0.1:8080")?;
//!     handle.wait_ready()?;
//!     std::thread::park();
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
mod context;
pub mod error;
pub mod wire;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod sse;
pub mod transport;

pub use broadcast::{Broadcast, Subscription};
pub use config::{Security, ServerConfig};
pub use context::Context;
pub use error::Error;
pub use wire::{Body, Headers, Pseudoslice, QueryMap, Request, Respond};
pub use middleware::{HandlerFn, MiddlewareFn, Next};
pub use router::{Capture, Captures, RouteBundle, Router, RouterError};
pub use runtime_config::RuntimeConfig;
pub use server::{Server, ServerHandle};
pub use sse::{SseEvent, SseStream};
pub use transport::Transport;

pub use ::http::{Method, StatusCode};
