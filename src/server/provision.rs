//! Per-connection resource bundles and the pool that recycles them.
//!
//! A provision bundles the large per-connection allocations: the growable
//! receive buffer and the scratch arena the response head (and SSE frames)
//! are encoded into. Connections borrow a provision for their whole
//! lifetime and hand it back on exit; the buffers keep their capacity up
//! to the configured retention thresholds, so a keep-alive connection
//! reuses the same allocations for every request it serves.
//!
//! The pool grows lazily up to `connection_count_max` provisions and is
//! the admission gate: when every provision is out on loan, the borrowing
//! acceptor parks on the pool channel until a connection releases one.
//! Accepted sockets are never refused.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use may::sync::mpsc;
use tracing::{debug, error};

use crate::config::ServerConfig;

/// Reusable per-connection buffers.
#[derive(Debug)]
pub(crate) struct Provision {
    /// Growable receive buffer; request slices borrow into it.
    pub(crate) recv_buf: Vec<u8>,
    /// Scratch arena for response head encoding and SSE event framing.
    pub(crate) arena: Vec<u8>,
}

impl Provision {
    fn new(config: &ServerConfig) -> Self {
        Self {
            recv_buf: Vec::with_capacity(config.socket_buffer_bytes),
            arena: Vec::with_capacity(config.socket_buffer_bytes),
        }
    }

    /// Clear request state and trim capacity past the retention thresholds.
    ///
    /// Runs between keep-alive requests and again on release, so resident
    /// memory per pooled provision is bounded by the retain settings.
    pub(crate) fn reset(&mut self, config: &ServerConfig) {
        self.recv_buf.clear();
        if self.recv_buf.capacity() > config.list_recv_bytes_retain {
            self.recv_buf.shrink_to(config.list_recv_bytes_retain);
        }
        self.arena.clear();
        if self.arena.capacity() > config.connection_arena_bytes_retain {
            self.arena.shrink_to(config.connection_arena_bytes_retain);
        }
    }
}

/// Pool of provisions shared by every acceptor coroutine.
pub(crate) struct ProvisionPool {
    config: Arc<ServerConfig>,
    release_tx: mpsc::Sender<Provision>,
    release_rx: mpsc::Receiver<Provision>,
    created: AtomicUsize,
}

impl ProvisionPool {
    pub(crate) fn new(config: Arc<ServerConfig>) -> Arc<Self> {
        let (release_tx, release_rx) = mpsc::channel();
        Arc::new(Self {
            config,
            release_tx,
            release_rx,
            created: AtomicUsize::new(0),
        })
    }

    /// Borrow a provision, creating one if the pool is below its cap and
    /// parking until a release when it is not.
    pub(crate) fn borrow(self: &Arc<Self>) -> PooledProvision {
        loop {
            // Reuse a released provision when one is waiting.
            if let Ok(provision) = self.release_rx.try_recv() {
                return PooledProvision {
                    provision: Some(provision),
                    pool: self.clone(),
                };
            }

            let created = self.created.load(Ordering::Relaxed);
            let below_cap = self
                .config
                .connection_count_max
                .map_or(true, |max| created < max);
            if below_cap {
                if self
                    .created
                    .compare_exchange(created, created + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    debug!(provisions = created + 1, "provision created");
                    return PooledProvision {
                        provision: Some(Provision::new(&self.config)),
                        pool: self.clone(),
                    };
                }
                continue;
            }

            // Pool exhausted: park this coroutine until a release.
            match self.release_rx.recv() {
                Ok(provision) => {
                    return PooledProvision {
                        provision: Some(provision),
                        pool: self.clone(),
                    }
                }
                Err(e) => {
                    // Unreachable while the pool owns a sender; bail out
                    // with a fresh provision rather than deadlock.
                    error!(error = %e, "provision pool channel closed");
                    return PooledProvision {
                        provision: Some(Provision::new(&self.config)),
                        pool: self.clone(),
                    };
                }
            }
        }
    }

    pub(crate) fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn release(&self, mut provision: Provision) {
        provision.reset(&self.config);
        let _ = self.release_tx.send(provision);
    }
}

/// RAII loan of a provision; returns it to the pool on drop, which also
/// covers unwinding, so a panicking connection never leaks its buffers.
pub(crate) struct PooledProvision {
    provision: Option<Provision>,
    pool: Arc<ProvisionPool>,
}

impl std::ops::Deref for PooledProvision {
    type Target = Provision;

    fn deref(&self) -> &Provision {
        self.provision.as_ref().expect("provision taken")
    }
}

impl std::ops::DerefMut for PooledProvision {
    fn deref_mut(&mut self) -> &mut Provision {
        self.provision.as_mut().expect("provision taken")
    }
}

impl Drop for PooledProvision {
    fn drop(&mut self) {
        if let Some(provision) = self.provision.take() {
            self.pool.release(provision);
        }
    }
}
