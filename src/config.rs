//! Server configuration.
//!
//! All limits that bound per-connection memory live here. Overall resident
//! memory is bounded by `connection_count_max × (retained buffer sizes)`:
//! every connection borrows one provision (receive buffer + arena) from the
//! pool, and release trims the buffers back to the `*_retain` thresholds.

/// Transport security selector.
///
/// The connection engine only consumes the [`Transport`](crate::Transport)
/// abstraction; a TLS transport adapter provides the same surface. This
/// option records which flavor the listener is expected to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plain TCP.
    #[default]
    Plaintext,
    /// TLS-wrapped transport supplied by an adapter.
    Tls,
}

/// Tunable limits and sizes for a server instance.
///
/// Defaults are production-reasonable; construct with [`ServerConfig::new`]
/// and override individual knobs with the `with_*` setters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen backlog hint. Recorded for transports that can honor it; the
    /// runtime's TCP listener applies the platform default.
    pub backlog_count: usize,
    /// Coroutine stack size in bytes, applied through the runtime config.
    pub stack_size: usize,
    /// Maximum provisions (and therefore concurrent connections). `None`
    /// grows the pool without bound. A full pool parks the accepting
    /// coroutine until a provision is released; accepted sockets are never
    /// refused.
    pub connection_count_max: Option<usize>,
    /// Arena capacity retained across requests and connections.
    pub connection_arena_bytes_retain: usize,
    /// Receive buffer capacity retained across requests and connections.
    pub list_recv_bytes_retain: usize,
    /// Hard cap on receive buffer growth.
    pub list_recv_bytes_max: usize,
    /// Per-recv chunk size and response drain window.
    pub socket_buffer_bytes: usize,
    /// Maximum number of request headers.
    pub header_count_max: usize,
    /// Maximum positional captures a route template may declare.
    pub capture_count_max: usize,
    /// Maximum query-string entries kept per request.
    pub query_count_max: usize,
    /// Maximum total request size (head plus body).
    pub request_bytes_max: usize,
    /// Maximum request target length.
    pub request_uri_bytes_max: usize,
    /// Plaintext or TLS.
    pub security: Security,
}

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backlog_count: 512,
            stack_size: MIB,
            connection_count_max: Some(1024),
            connection_arena_bytes_retain: KIB,
            list_recv_bytes_retain: KIB,
            list_recv_bytes_max: 2 * MIB,
            socket_buffer_bytes: KIB,
            header_count_max: 32,
            capture_count_max: 8,
            query_count_max: 8,
            request_bytes_max: 2 * MIB,
            request_uri_bytes_max: 2 * KIB,
            security: Security::Plaintext,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrent connections, `None` for unbounded.
    pub fn with_connection_count_max(mut self, max: Option<usize>) -> Self {
        self.connection_count_max = max;
        self
    }

    /// Set the maximum total request size in bytes.
    pub fn with_request_bytes_max(mut self, max: usize) -> Self {
        self.request_bytes_max = max;
        self
    }

    /// Set the maximum request target length in bytes.
    pub fn with_request_uri_bytes_max(mut self, max: usize) -> Self {
        self.request_uri_bytes_max = max;
        self
    }

    /// Set the maximum request header count.
    pub fn with_header_count_max(mut self, max: usize) -> Self {
        self.header_count_max = max;
        self
    }

    /// Set the per-recv chunk size and response drain window.
    pub fn with_socket_buffer_bytes(mut self, bytes: usize) -> Self {
        self.socket_buffer_bytes = bytes;
        self
    }

    /// Set the coroutine stack size in bytes.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Select plaintext or TLS transports.
    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }
}
