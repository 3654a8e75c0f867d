//! Per-connection engine.
//!
//! One coroutine per accepted socket runs the request/response state
//! machine: read until the head delimiter, read the body if the method
//! carries one, resolve routing, run the middleware chain and handler,
//! encode and send the respond, then either reuse the connection or close
//! it. Malformed or oversized requests drop the connection without a
//! response so hostile traffic costs no encode work; handler panics are
//! contained and surface as `500`s.
//!
//! A handler may instead upgrade the connection to a Server-Sent Events
//! stream, in which case the socket and the provision leave the state
//! machine for good and the [`SseStream`] owns their teardown.

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};

use http::StatusCode;
use memchr::memmem;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::context::{Context, SseInit};
use crate::error::Error;
use crate::wire::parser::{parse_head, ParseLimits};
use crate::wire::{encode_head, expects_body, Pseudoslice, QueryMap, Respond};
use crate::middleware::Next;
use crate::router::{Captures, Router};
use crate::server::provision::PooledProvision;
use crate::sse::SseStream;
use crate::transport::Transport;

/// Upgrade preamble sent before an SSE stream takes the socket over.
const SSE_PREAMBLE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n";

enum Flow {
    KeepAlive,
    Close,
    Upgrade(SseInit),
}

enum Outcome<'b> {
    Respond(Respond<'b>),
    Upgrade(SseInit),
}

/// Drive one connection to completion.
///
/// Owns the transport and the provision loan; on every exit path the
/// provision returns to the pool (via its guard) and the socket is shut
/// down, except after an SSE upgrade where both move into the stream.
pub(crate) fn run_connection<T, S>(
    mut transport: T,
    peer: SocketAddr,
    mut provision: PooledProvision,
    router: &Router<S>,
    state: &S,
    config: &ServerConfig,
) where
    T: Transport + 'static,
{
    if let Err(e) = transport.set_nodelay() {
        debug!(peer = %peer, error = %e, "failed to disable Nagle");
    }
    debug!(peer = %peer, "connection open");

    loop {
        match serve_one(&mut transport, peer, &mut provision, router, state, config) {
            Ok(Flow::KeepAlive) => continue,
            Ok(Flow::Close) => {
                debug!(peer = %peer, "connection closed");
                break;
            }
            Ok(Flow::Upgrade(init)) => {
                debug!(peer = %peer, "connection upgraded to event stream");
                let stream = SseStream::new(Box::new(transport), provision);
                init(stream);
                return;
            }
            Err(Error::SocketClosed) => {
                debug!(peer = %peer, "connection closed by peer");
                break;
            }
            Err(e) => {
                if e.sheds_connection() {
                    debug!(peer = %peer, error = %e, "request rejected, dropping connection");
                } else {
                    error!(peer = %peer, error = %e, "connection error");
                }
                break;
            }
        }
    }
    transport.close();
}

fn serve_one<T, S>(
    transport: &mut T,
    peer: SocketAddr,
    provision: &mut PooledProvision,
    router: &Router<S>,
    state: &S,
    config: &ServerConfig,
) -> Result<Flow, Error>
where
    T: Transport,
{
    let limits = ParseLimits::from_config(config);

    // Request.Header: accumulate until the head delimiter shows up.
    let head_end = read_head(transport, &mut provision.recv_buf, config)?;

    // First parse decides the body phase and feeds the request log.
    let (content_length, has_body) = {
        let request = parse_head(&provision.recv_buf[..head_end], &limits)?;
        info!(
            method = %request.method(),
            uri = request.target(),
            user_agent = request.header("user-agent").unwrap_or("-"),
            peer = %peer,
            "request"
        );
        let content_length = request.content_length()?.unwrap_or(0);
        let has_body = expects_body(request.method()) && content_length != 0;
        (content_length, has_body)
    };

    // Request.Body: read exactly content_length bytes past the head.
    if has_body {
        let total = head_end + content_length;
        if total > config.request_bytes_max.min(config.list_recv_bytes_max) {
            return Err(Error::ContentTooLarge);
        }
        read_body(
            transport,
            &mut provision.recv_buf,
            head_end,
            content_length,
            config,
        )?;
    }

    let provision = &mut **provision;
    let recv_buf = &provision.recv_buf;
    let arena = &mut provision.arena;

    let mut request = parse_head(&recv_buf[..head_end], &limits)?;
    if has_body {
        request.set_body(&recv_buf[head_end..head_end + content_length]);
    }
    let keep_alive = request.keep_alive();

    // Handler: resolve routing and run the chain. Routing misses and
    // handler failures travel as error kinds until the respond is built,
    // so the 404/405/500 policy lives in one place.
    let mut captures = Captures::new();
    let mut queries = QueryMap::with_limit(config.query_count_max);

    let routed: Result<Outcome<'_>, Error> =
        match router.lookup(request.target(), &mut captures, &mut queries) {
            None => Err(Error::RouteNotFound),
            Some(bundle) => match bundle.handler(request.method()) {
                None => Err(Error::MethodNotAllowed),
                Some(handler) => {
                    let ctx = Context::new(state, peer, &request, &captures, &queries);
                    let next = Next::new(&ctx, bundle.middlewares(), handler);
                    match catch_unwind(AssertUnwindSafe(|| next.run())) {
                        Ok(Ok(respond)) => match ctx.take_sse() {
                            Some(init) => Ok(Outcome::Upgrade(init)),
                            None => Ok(Outcome::Respond(respond)),
                        },
                        Ok(Err(e)) => Err(e),
                        Err(panic) => Err(Error::HandlerFailed(
                            panic_message(panic.as_ref()).to_string(),
                        )),
                    }
                }
            },
        };

    let outcome = match routed {
        Ok(outcome) => outcome,
        Err(e @ Error::RouteNotFound) => {
            debug!(uri = request.target(), error = %e, "request not served");
            Outcome::Respond(Respond::new(StatusCode::NOT_FOUND))
        }
        Err(e @ Error::MethodNotAllowed) => {
            debug!(uri = request.target(), method = %request.method(), error = %e, "request not served");
            Outcome::Respond(Respond::new(StatusCode::METHOD_NOT_ALLOWED))
        }
        Err(e) => {
            error!(uri = request.target(), error = %e, "handler failed");
            Outcome::Respond(Respond::new(StatusCode::INTERNAL_SERVER_ERROR))
        }
    };

    // Respond: encode the head into the arena and drain head+body through
    // a pseudoslice, one socket-buffer window at a time.
    match outcome {
        Outcome::Upgrade(init) => {
            transport.send_all(SSE_PREAMBLE).map_err(Error::Socket)?;
            return Ok(Flow::Upgrade(init));
        }
        Outcome::Respond(respond) => {
            arena.clear();
            encode_head(&respond, arena)?;
            let pseudo = Pseudoslice::new(arena, respond.body_slice());
            send_pseudoslice(transport, &pseudo, config.socket_buffer_bytes)
                .map_err(Error::Socket)?;
            debug!(
                status = respond.status_code().map(|s| s.as_u16()).unwrap_or(0),
                bytes = pseudo.len(),
                "response sent"
            );
        }
    }

    // End the borrows into recv_buf before the buffers are recycled.
    drop(captures);
    drop(queries);
    drop(request);

    provision.reset(config);
    if keep_alive {
        Ok(Flow::KeepAlive)
    } else {
        Ok(Flow::Close)
    }
}

/// Read until `\r\n\r\n`, returning the head length including the
/// delimiter. The delimiter may straddle recv boundaries, so each scan
/// covers the new bytes plus the previous three.
fn read_head<T: Transport>(
    transport: &mut T,
    buf: &mut Vec<u8>,
    config: &ServerConfig,
) -> Result<usize, Error> {
    let cap = config.request_bytes_max.min(config.list_recv_bytes_max);
    loop {
        let len = buf.len();
        if len >= cap {
            return Err(Error::ContentTooLarge);
        }
        let chunk = config.socket_buffer_bytes.min(cap - len);
        buf.resize(len + chunk, 0);
        let n = transport
            .recv(&mut buf[len..len + chunk])
            .map_err(Error::Socket)?;
        buf.truncate(len + n);
        if n == 0 {
            return Err(Error::SocketClosed);
        }
        let scan_start = len.saturating_sub(3);
        if let Some(pos) = memmem::find(&buf[scan_start..], b"\r\n\r\n") {
            return Ok(scan_start + pos + 4);
        }
    }
}

/// Accumulate exactly `content_length` bytes after the head.
fn read_body<T: Transport>(
    transport: &mut T,
    buf: &mut Vec<u8>,
    head_end: usize,
    content_length: usize,
    config: &ServerConfig,
) -> Result<(), Error> {
    loop {
        let received = buf.len() - head_end;
        if received == content_length {
            return Ok(());
        }
        if received > content_length {
            // Bytes past Content-Length would be pipelining, which is
            // unsupported.
            return Err(Error::MalformedRequest);
        }
        let want = (content_length - received).min(config.socket_buffer_bytes);
        let len = buf.len();
        buf.resize(len + want, 0);
        let n = transport
            .recv(&mut buf[len..len + want])
            .map_err(Error::Socket)?;
        buf.truncate(len + n);
        if n == 0 {
            return Err(Error::SocketClosed);
        }
    }
}

fn send_pseudoslice<T: Transport>(
    transport: &mut T,
    pseudo: &Pseudoslice<'_>,
    window: usize,
) -> std::io::Result<()> {
    let mut cursor = 0;
    while cursor < pseudo.len() {
        let chunk = pseudo.get(cursor, window);
        transport.send_all(chunk)?;
        cursor += chunk.len();
    }
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "opaque panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::provision::ProvisionPool;
    use http::Method;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Scripted transport: each queued chunk is one recv result; an empty
    /// queue reads as EOF. Everything sent is captured for assertions.
    #[derive(Clone)]
    struct MockTransport {
        reads: Arc<Mutex<VecDeque<Vec<u8>>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl MockTransport {
        fn script<I: IntoIterator<Item = &'static [u8]>>(chunks: I) -> Self {
            Self {
                reads: Arc::new(Mutex::new(
                    chunks.into_iter().map(|c| c.to_vec()).collect(),
                )),
                written: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut reads = self.reads.lock().unwrap();
            match reads.pop_front() {
                None => Ok(0),
                Some(mut chunk) => {
                    if chunk.len() > buf.len() {
                        let rest = chunk.split_off(buf.len());
                        reads.push_front(rest);
                    }
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }

        fn send_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.written.lock().unwrap().extend_from_slice(data);
            Ok(())
        }

        fn set_nodelay(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn peer_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:9999".parse().unwrap())
        }

        fn close(&mut self) {}
    }

    #[derive(Default)]
    struct TestState {
        bodies: Mutex<Vec<Vec<u8>>>,
        target_ptrs: Mutex<Vec<usize>>,
    }

    fn hello<'b>(_ctx: &Context<'b, TestState>) -> Result<Respond<'b>, Error> {
        Ok(Respond::ok().mime("text/html").body("Hello, World!"))
    }

    fn echo<'b>(ctx: &Context<'b, TestState>) -> Result<Respond<'b>, Error> {
        let body = ctx.request().body().unwrap_or(b"");
        ctx.state().bodies.lock().unwrap().push(body.to_vec());
        Ok(Respond::ok().body(body))
    }

    fn record_ptr<'b>(ctx: &Context<'b, TestState>) -> Result<Respond<'b>, Error> {
        ctx.state()
            .target_ptrs
            .lock()
            .unwrap()
            .push(ctx.request().target().as_ptr() as usize);
        Ok(Respond::ok().body("ok"))
    }

    fn failing<'b>(_ctx: &Context<'b, TestState>) -> Result<Respond<'b>, Error> {
        Err(Error::HandlerFailed("boom".into()))
    }

    fn panicking<'b>(_ctx: &Context<'b, TestState>) -> Result<Respond<'b>, Error> {
        panic!("handler blew up");
    }

    fn statusless<'b>(_ctx: &Context<'b, TestState>) -> Result<Respond<'b>, Error> {
        Ok(Respond::default())
    }

    fn test_router() -> Router<TestState> {
        let mut router = Router::new();
        router.add(Method::GET, "/", hello).unwrap();
        router.add(Method::POST, "/echo", echo).unwrap();
        router.add(Method::GET, "/ptr", record_ptr).unwrap();
        router.add(Method::GET, "/fail", failing).unwrap();
        router.add(Method::GET, "/panic", panicking).unwrap();
        router.add(Method::GET, "/statusless", statusless).unwrap();
        router.add(Method::GET, "/kill", hello).unwrap();
        router
    }

    fn run(transport: MockTransport, config: ServerConfig) -> (Vec<u8>, Arc<TestState>) {
        let config = Arc::new(config);
        let router = test_router();
        let state = Arc::new(TestState::default());
        let pool = ProvisionPool::new(config.clone());
        let provision = pool.borrow();
        let captured = transport.clone();
        run_connection(
            transport,
            "127.0.0.1:9999".parse().unwrap(),
            provision,
            &router,
            &state,
            &config,
        );
        (captured.written(), state)
    }

    #[test]
    fn hello_world_is_byte_exact() {
        let transport = MockTransport::script([&b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"[..]]);
        let (written, _) = run(transport, ServerConfig::new());
        assert_eq!(
            written,
            b"HTTP/1.1 200 OK\r\nServer: zzz\r\nConnection: keep-alive\r\n\
              Content-Type: text/html\r\nContent-Length: 13\r\n\r\nHello, World!"
                .to_vec()
        );
    }

    #[test]
    fn delimiter_split_across_recvs_parses() {
        let transport = MockTransport::script([
            &b"GET / HTTP/1.1\r\nHost: x\r\n\r"[..],
            &b"\n"[..],
        ]);
        let (written, _) = run(transport, ServerConfig::new());
        assert!(written.starts_with(b"HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn post_with_zero_content_length_reaches_handler() {
        let transport =
            MockTransport::script([&b"POST /echo HTTP/1.1\r\nContent-Length: 0\r\n\r\n"[..]]);
        let (written, state) = run(transport, ServerConfig::new());
        assert!(written.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert_eq!(state.bodies.lock().unwrap().as_slice(), &[Vec::<u8>::new()]);
    }

    #[test]
    fn post_body_split_across_recvs_is_delivered() {
        let transport = MockTransport::script([
            &b"POST /echo HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello"[..],
            &b" world"[..],
        ]);
        let (written, state) = run(transport, ServerConfig::new());
        assert!(written.ends_with(b"hello world"));
        assert_eq!(state.bodies.lock().unwrap()[0], b"hello world");
    }

    #[test]
    fn header_overflow_drops_connection_silently() {
        let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
        for i in 0..33 {
            raw.extend_from_slice(format!("H{i}: v\r\n").as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        let raw: &'static [u8] = raw.leak();
        let (written, _) = run(MockTransport::script([raw]), ServerConfig::new());
        assert!(written.is_empty());
    }

    #[test]
    fn request_at_bytes_max_succeeds_one_more_fails() {
        // Head padded to exactly the limit with a filler header.
        let limit = 256;
        let skeleton = b"GET / HTTP/1.1\r\nX-Pad: \r\n\r\n".len();
        let mut raw = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(limit - skeleton));
        raw.extend_from_slice(b"\r\n\r\n");
        assert_eq!(raw.len(), limit);
        let exact: &'static [u8] = raw.leak();

        let config = ServerConfig::new().with_request_bytes_max(limit);
        let (written, _) = run(MockTransport::script([exact]), config.clone());
        assert!(written.starts_with(b"HTTP/1.1 200 OK\r\n"));

        let mut raw = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(limit - skeleton + 1));
        raw.extend_from_slice(b"\r\n\r\n");
        let over: &'static [u8] = raw.leak();
        let (written, _) = run(MockTransport::script([over]), config);
        assert!(written.is_empty());
    }

    #[test]
    fn unmatched_path_gets_404() {
        let transport = MockTransport::script([&b"GET /missing HTTP/1.1\r\n\r\n"[..]]);
        let (written, _) = run(transport, ServerConfig::new());
        assert!(written.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
        assert!(written.ends_with(b"Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn wrong_method_gets_405_with_empty_body() {
        let transport =
            MockTransport::script([&b"POST /kill HTTP/1.1\r\nContent-Length: 0\r\n\r\n"[..]]);
        let (written, _) = run(transport, ServerConfig::new());
        assert!(written.starts_with(b"HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(written.ends_with(b"Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn handler_error_becomes_500() {
        let transport = MockTransport::script([&b"GET /fail HTTP/1.1\r\n\r\n"[..]]);
        let (written, _) = run(transport, ServerConfig::new());
        assert!(written.starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(written.ends_with(b"Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn handler_panic_becomes_500_and_connection_survives() {
        let transport = MockTransport::script([
            &b"GET /panic HTTP/1.1\r\n\r\n"[..],
            &b"GET / HTTP/1.1\r\n\r\n"[..],
        ]);
        let (written, _) = run(transport, ServerConfig::new());
        let text = String::from_utf8_lossy(&written);
        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(text.contains("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("Hello, World!"));
    }

    #[test]
    fn missing_status_aborts_without_response() {
        let transport = MockTransport::script([
            &b"GET /statusless HTTP/1.1\r\n\r\n"[..],
            // Never reached: the connection is aborted first.
            &b"GET / HTTP/1.1\r\n\r\n"[..],
        ]);
        let (written, _) = run(transport, ServerConfig::new());
        assert!(written.is_empty());
    }

    #[test]
    fn keep_alive_reuses_the_receive_buffer() {
        let transport = MockTransport::script([
            &b"GET /ptr HTTP/1.1\r\n\r\n"[..],
            &b"GET /ptr HTTP/1.1\r\nConnection: close\r\n\r\n"[..],
            // Unreachable after the explicit close.
            &b"GET /ptr HTTP/1.1\r\n\r\n"[..],
        ]);
        let (written, state) = run(transport, ServerConfig::new());
        let ptrs = state.target_ptrs.lock().unwrap();
        assert_eq!(ptrs.len(), 2, "close must end the connection");
        assert_eq!(ptrs[0], ptrs[1], "provision buffers are reused");
        let text = String::from_utf8_lossy(&written);
        assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[test]
    fn oversized_content_length_drops_connection() {
        let transport = MockTransport::script([
            &b"POST /echo HTTP/1.1\r\nContent-Length: 99999999\r\n\r\n"[..],
        ]);
        let config = ServerConfig::new().with_request_bytes_max(4096);
        let (written, _) = run(transport, config);
        assert!(written.is_empty());
    }

    #[test]
    fn eof_before_request_is_a_clean_close() {
        let transport = MockTransport::script(Vec::<&'static [u8]>::new());
        let (written, _) = run(transport, ServerConfig::new());
        assert!(written.is_empty());
    }
}
