use std::fmt;
use std::io;

/// Errors surfaced by the connection engine, parser, router, and handlers.
///
/// The engine's policy per kind:
///
/// - Parse-level kinds (`TooManyHeaders`, `ContentTooLarge`, `MalformedRequest`,
///   `InvalidMethod`, `UriTooLong`, `HttpVersionNotSupported`) terminate the
///   connection without a response, so malformed traffic costs no encode work.
/// - `RouteNotFound` and `MethodNotAllowed` become `404` / `405` responses.
/// - `HandlerFailed` becomes a `500` response with an empty body and is logged.
/// - `MissingStatus` aborts the connection: a handler produced a respond value
///   that never had a status set.
/// - `SocketClosed` is the peer hanging up; during keep-alive idle this is a
///   normal end of connection.
/// - `Socket` wraps any other transport error and terminates the connection.
#[derive(Debug)]
pub enum Error {
    /// Header count exceeded `header_count_max`.
    TooManyHeaders,
    /// Request head or body exceeded the configured byte limits.
    ContentTooLarge,
    /// Request line or header block did not parse.
    MalformedRequest,
    /// Method token is not in the known set.
    InvalidMethod,
    /// Request target exceeded `request_uri_bytes_max`.
    UriTooLong,
    /// Version token parsed but is not `HTTP/1.1`.
    HttpVersionNotSupported,
    /// No route matched the request path.
    RouteNotFound,
    /// A route matched but has no handler for the request method.
    MethodNotAllowed,
    /// A respond value reached the encoder without a status.
    MissingStatus,
    /// A handler returned an application-level failure.
    HandlerFailed(String),
    /// The peer closed the connection.
    SocketClosed,
    /// Transport-level I/O failure.
    Socket(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooManyHeaders => write!(f, "too many request headers"),
            Error::ContentTooLarge => write!(f, "request exceeds configured size limits"),
            Error::MalformedRequest => write!(f, "malformed request"),
            Error::InvalidMethod => write!(f, "unknown request method"),
            Error::UriTooLong => write!(f, "request target too long"),
            Error::HttpVersionNotSupported => write!(f, "HTTP version not supported"),
            Error::RouteNotFound => write!(f, "no route matched"),
            Error::MethodNotAllowed => write!(f, "method not allowed for matched route"),
            Error::MissingStatus => write!(f, "respond value has no status"),
            Error::HandlerFailed(msg) => write!(f, "handler failed: {msg}"),
            Error::SocketClosed => write!(f, "connection closed by peer"),
            Error::Socket(e) => write!(f, "socket error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Socket(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Socket(e)
    }
}

impl Error {
    /// True for the kinds that terminate a connection without any response
    /// bytes being written.
    pub fn sheds_connection(&self) -> bool {
        matches!(
            self,
            Error::TooManyHeaders
                | Error::ContentTooLarge
                | Error::MalformedRequest
                | Error::InvalidMethod
                | Error::UriTooLong
                | Error::HttpVersionNotSupported
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        assert_eq!(Error::TooManyHeaders.to_string(), "too many request headers");
        assert_eq!(
            Error::HandlerFailed("db down".into()).to_string(),
            "handler failed: db down"
        );
        assert_eq!(Error::SocketClosed.to_string(), "connection closed by peer");
    }

    #[test]
    fn parse_kinds_shed() {
        assert!(Error::TooManyHeaders.sheds_connection());
        assert!(Error::UriTooLong.sheds_connection());
        assert!(Error::ContentTooLarge.sheds_connection());
        assert!(!Error::RouteNotFound.sheds_connection());
        assert!(!Error::SocketClosed.sheds_connection());
    }

    #[test]
    fn io_error_converts_to_socket() {
        let e: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(e, Error::Socket(_)));
    }
}
