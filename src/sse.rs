//! # Server-Sent Events (SSE) Module
//!
//! Server-Sent Events support: long-lived server-to-client streaming over
//! an upgraded HTTP connection.
//!
//! ## Overview
//!
//! A handler calls [`Context::to_sse`](crate::Context::to_sse) to take the
//! connection out of the request/response lifecycle. The engine sends the
//! `text/event-stream` preamble and hands the socket (plus its provision)
//! to an [`SseStream`], which the handler's init closure then owns. From
//! that point the connection engine never touches the socket again; the
//! stream closes it and releases the provision when it is dropped or
//! explicitly closed.
//!
//! ## Event framing
//!
//! Events are wire-framed as:
//!
//! ```text
//! event: <type>\r\n        (only when set)
//! id: <id>\r\n             (only when set)
//! data: <payload>\r\n
//! \r\n
//! ```
//!
//! ## Feeding a stream from a broadcast
//!
//! The natural subscriber loop pairs a stream with a
//! [`Broadcast`](crate::Broadcast) subscription:
//!
//! ```rust,ignore
//! ctx.to_sse(move |mut stream| {
//!     let subscription = feed.subscribe();
//!     while let Some(value) = subscription.recv() {
//!         if stream.send(&SseEvent::new(format!("value: {value}"))).is_err() {
//!             break; // client went away
//!         }
//!     }
//! });
//! ```
//!
//! Dropping the subscription on exit unsubscribes it; dropping the stream
//! closes the socket and returns the provision to the pool.

use std::io;

use tracing::debug;

use crate::server::provision::PooledProvision;
use crate::transport::Transport;

/// One event: a data payload plus optional `event` type and `id` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    data: String,
    event: Option<String>,
    id: Option<String>,
}

impl SseEvent {
    /// Event carrying only a data payload.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            event: None,
            id: None,
        }
    }

    /// Set the event type, emitted as an `event:` line.
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the event id, emitted as an `id:` line.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        if let Some(event) = &self.event {
            out.extend_from_slice(b"event: ");
            out.extend_from_slice(event.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        if let Some(id) = &self.id {
            out.extend_from_slice(b"id: ");
            out.extend_from_slice(id.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"data: ");
        out.extend_from_slice(self.data.as_bytes());
        out.extend_from_slice(b"\r\n\r\n");
    }
}

impl From<&str> for SseEvent {
    fn from(data: &str) -> Self {
        SseEvent::new(data)
    }
}

impl From<String> for SseEvent {
    fn from(data: String) -> Self {
        SseEvent::new(data)
    }
}

/// An upgraded connection streaming Server-Sent Events.
///
/// Owns the socket and the connection's provision; events are framed into
/// the provision arena, so a healthy stream allocates nothing per event.
/// The stream is responsible for teardown: [`close`](SseStream::close) (or
/// dropping it) shuts the socket down and the provision flows back to the
/// pool.
pub struct SseStream {
    transport: Box<dyn Transport>,
    provision: PooledProvision,
}

impl SseStream {
    pub(crate) fn new(transport: Box<dyn Transport>, provision: PooledProvision) -> Self {
        Self {
            transport,
            provision,
        }
    }

    /// Frame and send one event.
    ///
    /// An error means the client is gone; the caller should exit its loop
    /// and let the stream drop.
    pub fn send(&mut self, event: &SseEvent) -> io::Result<()> {
        let arena = &mut self.provision.arena;
        arena.clear();
        event.encode_into(arena);
        self.transport.send_all(arena)
    }

    /// Close the socket and release the connection's resources.
    pub fn close(self) {
        // Drop does the work.
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        debug!("event stream closed");
        self.transport.close();
    }
}
