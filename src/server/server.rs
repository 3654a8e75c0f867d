use std::io;
use std::net::{SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use may::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::router::Router;
use crate::server::conn::run_connection;
use crate::server::provision::ProvisionPool;

/// How long [`ServerHandle::wait_ready`] keeps probing before giving up.
const STARTUP_GRACE: Duration = Duration::from_secs(1);

/// An HTTP/1.1 server: configuration, routing trie, and shared state.
///
/// `state` is the typed application state threaded into every
/// [`Context`](crate::Context); handlers reach collaborators (a broadcast
/// feed, a connection pool, counters) through it rather than any runtime
/// key/value storage.
pub struct Server<S> {
    config: ServerConfig,
    router: Router<S>,
    state: S,
}

/// Handle to a running server.
///
/// Carries the bound address and the shutdown flag shared with the
/// acceptor chain. Stopping is cooperative: [`stop`](ServerHandle::stop)
/// raises the flag and nudges the outstanding accept awake so the chain
/// can observe it and end itself; no coroutine is cancelled from outside.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

impl ServerHandle {
    /// The bound address; useful when binding port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the listener answers TCP connects, or fail once the
    /// startup grace period runs out. Probes back off exponentially so a
    /// slow scheduler start does not get hammered.
    pub fn wait_ready(&self) -> io::Result<()> {
        let deadline = Instant::now() + STARTUP_GRACE;
        let mut backoff = Duration::from_millis(1);
        loop {
            match StdTcpStream::connect(self.addr) {
                Ok(probe) => {
                    drop(probe);
                    return Ok(());
                }
                Err(e) if Instant::now() >= deadline => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("listener at {} never became reachable: {e}", self.addr),
                    ));
                }
                Err(_) => {
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_millis(50));
                }
            }
        }
    }

    /// Stop accepting new connections.
    ///
    /// The acceptor chain keeps exactly one accept outstanding, so a
    /// throwaway connection is enough to wake it; it sees the raised flag,
    /// discards the probe socket, and ends the chain without spawning a
    /// successor. Connections already in flight run to their natural end
    /// of life.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = StdTcpStream::connect(self.addr);
    }
}

struct Accept<S> {
    config: Arc<ServerConfig>,
    router: Arc<Router<S>>,
    state: Arc<S>,
    pool: Arc<ProvisionPool>,
    shutdown: Arc<AtomicBool>,
}

impl<S: Send + Sync + 'static> Server<S> {
    pub fn new(config: ServerConfig, router: Router<S>, state: S) -> Self {
        Self {
            config,
            router,
            state,
        }
    }

    /// Bind the listener and start accepting.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind (e.g. `"127.0.0.1:8080"`, or port `0`
    ///   to let the OS pick)
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let shutdown = Arc::new(AtomicBool::new(false));
        let accept = Arc::new(Accept {
            pool: ProvisionPool::new(config.clone()),
            config,
            router: Arc::new(self.router),
            state: Arc::new(self.state),
            shutdown: shutdown.clone(),
        });
        let listener = Arc::new(listener);

        info!(addr = %addr, "server listening");

        let stack_size = accept.config.stack_size;
        // SAFETY: the spawned closure owns its captures; unsafety comes
        // from the coroutine runtime's spawn contract, not this logic.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || accept_frame(listener, accept))
        };
        match spawned {
            Ok(_detached) => Ok(ServerHandle { addr, shutdown }),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }
}

/// Accept one connection, spawn the sibling acceptor, and serve.
///
/// Keeping exactly one accept outstanding per listener means backpressure
/// comes from the provision pool: when it is exhausted the borrow below
/// parks this coroutine, and accepted-but-unserved sockets queue in the
/// kernel rather than being refused.
fn accept_frame<S: Send + Sync + 'static>(listener: Arc<TcpListener>, accept: Arc<Accept<S>>) {
    let (stream, peer) = match listener.accept() {
        Ok(accepted) => accepted,
        Err(e) => {
            error!(error = %e, "accept failed");
            return;
        }
    };

    // A raised flag means this accept was woken by `stop`'s probe (or
    // raced a real client against shutdown). Dropping the socket and not
    // spawning a successor ends the acceptor chain.
    if accept.shutdown.load(Ordering::Acquire) {
        debug!(peer = %peer, "shutdown observed, acceptor chain ends");
        return;
    }

    {
        let listener = listener.clone();
        let accept = accept.clone();
        let stack_size = accept.config.stack_size;
        // SAFETY: same spawn contract as the root acceptor.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || accept_frame(listener, accept))
        };
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn sibling acceptor");
        }
    }

    let provision = accept.pool.borrow();
    run_connection(
        stream,
        peer,
        provision,
        &accept.router,
        &accept.state,
        &accept.config,
    );
}
