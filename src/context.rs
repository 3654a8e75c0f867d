use std::cell::RefCell;
use std::net::SocketAddr;

use http::StatusCode;

use crate::wire::{QueryMap, Request, Respond};
use crate::router::Capture;
use crate::sse::SseStream;

pub(crate) type SseInit = Box<dyn FnOnce(SseStream) + Send + 'static>;

/// Per-request facts handed to middleware and handlers: shared application
/// state, peer address, the parsed request, positional captures, and the
/// query map. All borrows stay valid for the duration of the handler call.
pub struct Context<'b, S> {
    state: &'b S,
    peer: SocketAddr,
    request: &'b Request<'b>,
    captures: &'b [Capture<'b>],
    queries: &'b QueryMap<'b>,
    sse: RefCell<Option<SseInit>>,
}

impl<'b, S> Context<'b, S> {
    pub(crate) fn new(
        state: &'b S,
        peer: SocketAddr,
        request: &'b Request<'b>,
        captures: &'b [Capture<'b>],
        queries: &'b QueryMap<'b>,
    ) -> Self {
        Self {
            state,
            peer,
            request,
            captures,
            queries,
            sse: RefCell::new(None),
        }
    }

    /// Shared application state passed to [`Server::new`](crate::Server::new).
    pub fn state(&self) -> &'b S {
        self.state
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn request(&self) -> &'b Request<'b> {
        self.request
    }

    /// Captures in template traversal order; `captures()[0]` is the first
    /// parameter encountered.
    pub fn captures(&self) -> &'b [Capture<'b>] {
        self.captures
    }

    pub fn capture(&self, index: usize) -> Option<&'b Capture<'b>> {
        self.captures.get(index)
    }

    pub fn queries(&self) -> &'b QueryMap<'b> {
        self.queries
    }

    /// Query value by key.
    pub fn query(&self, key: &str) -> Option<&'b str> {
        self.queries.get(key)
    }

    /// Relinquish the request/response lifecycle and take ownership of the
    /// connection as a Server-Sent Events stream.
    ///
    /// The engine sends the `text/event-stream` preamble, hands the socket
    /// and its provision to an [`SseStream`], and invokes `init` with it
    /// instead of writing a response; the respond value returned here is
    /// discarded. From that point the stream owns the connection and must
    /// eventually close it (dropping the stream closes it too).
    pub fn to_sse<F>(&self, init: F) -> Respond<'static>
    where
        F: FnOnce(SseStream) + Send + 'static,
    {
        *self.sse.borrow_mut() = Some(Box::new(init));
        Respond::new(StatusCode::OK)
    }

    pub(crate) fn take_sse(&self) -> Option<SseInit> {
        self.sse.borrow_mut().take()
    }
}
