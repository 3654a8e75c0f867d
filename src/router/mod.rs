//! # Router Module
//!
//! Path-segment trie routing with typed parameter captures.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Registering route templates against HTTP methods and handlers
//! - Matching request targets to a handler plus its middleware stack
//! - Extracting typed positional captures from template parameters
//! - Parsing the query string into the per-request query map
//!
//! ## Template syntax
//!
//! Templates are `/`-separated segments. A segment is either a literal or
//! one of the typed parameter markers:
//!
//! | Marker | Matches | Capture |
//! |---|---|---|
//! | `%i` | fully-numeric segment, no superfluous leading zero | [`Capture::Int`] |
//! | `%f` | well-formed decimal (`12` or `12.5`) | [`Capture::Float`] |
//! | `%s` | any non-empty segment | [`Capture::Str`] |
//! | `%r` | the entire unconsumed suffix; must be the last segment | [`Capture::Str`] |
//!
//! Two templates sharing a prefix share trie nodes. Literal children win
//! over the parameter child; a node holds at most one typed-parameter
//! child, and registering a different parameter type at an occupied slot
//! is a [`RouterError::ParamTypeConflict`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use http::Method;
//! use snooze::{Capture, Router};
//!
//! let mut router = Router::new();
//! router.add(Method::GET, "/hi/%s", greet)?;
//!
//! let mut captures = snooze::Captures::new();
//! let mut queries = /* per-request query map */;
//! let bundle = router.lookup("/hi/alice", &mut captures, &mut queries).unwrap();
//! assert!(matches!(captures[0], Capture::Str("alice")));
//! ```

mod trie;

pub use trie::{Capture, Captures, RouteBundle, Router, RouterError};
