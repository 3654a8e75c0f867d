use http::Method;
use smallvec::SmallVec;

use crate::error::Error;

/// Known method set. Tokens outside this set fail parsing rather than
/// becoming extension methods.
pub(crate) fn method_from_token(token: &[u8]) -> Result<Method, Error> {
    match token {
        b"GET" => Ok(Method::GET),
        b"HEAD" => Ok(Method::HEAD),
        b"POST" => Ok(Method::POST),
        b"PUT" => Ok(Method::PUT),
        b"DELETE" => Ok(Method::DELETE),
        b"CONNECT" => Ok(Method::CONNECT),
        b"OPTIONS" => Ok(Method::OPTIONS),
        b"TRACE" => Ok(Method::TRACE),
        b"PATCH" => Ok(Method::PATCH),
        _ => Err(Error::InvalidMethod),
    }
}

/// Methods that carry a request body by convention.
pub(crate) fn expects_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Request headers: insertion-ordered name/value pairs with case-insensitive
/// name lookup (linear search, per RFC 7230 header name semantics). All
/// slices borrow the connection's receive buffer.
#[derive(Debug, Default)]
pub struct Headers<'b> {
    entries: SmallVec<[(&'b str, &'b str); 16]>,
}

impl<'b> Headers<'b> {
    pub(crate) fn new() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: &'b str, value: &'b str) {
        self.entries.push((name, value));
    }

    /// First value whose name matches case-insensitively.
    pub fn get(&self, name: &str) -> Option<&'b str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they appeared on the wire.
    pub fn iter(&self) -> impl Iterator<Item = (&'b str, &'b str)> + '_ {
        self.entries.iter().copied()
    }
}

/// A parsed HTTP/1.1 request. Zero-copy: the target, header names and
/// values, and the body all borrow the receive buffer and stay valid for
/// the duration of the handler call.
#[derive(Debug)]
pub struct Request<'b> {
    method: Method,
    target: &'b str,
    headers: Headers<'b>,
    body: Option<&'b [u8]>,
}

impl<'b> Request<'b> {
    pub(crate) fn new(method: Method, target: &'b str, headers: Headers<'b>) -> Self {
        Self {
            method,
            target,
            headers,
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as received, query string included.
    pub fn target(&self) -> &'b str {
        self.target
    }

    /// The target with any query string stripped.
    pub fn path(&self) -> &'b str {
        match self.target.find('?') {
            Some(i) => &self.target[..i],
            None => self.target,
        }
    }

    pub fn headers(&self) -> &Headers<'b> {
        &self.headers
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&'b str> {
        self.headers.get(name)
    }

    /// Parsed `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Result<Option<usize>, Error> {
        match self.headers.get("content-length") {
            None => Ok(None),
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|_| Error::MalformedRequest),
        }
    }

    pub fn body(&self) -> Option<&'b [u8]> {
        self.body
    }

    pub(crate) fn set_body(&mut self, body: &'b [u8]) {
        self.body = Some(body);
    }

    /// Whether the peer asked to reuse the connection. HTTP/1.1 defaults to
    /// keep-alive; only an explicit `Connection: close` ends it.
    pub fn keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(v) => !v.trim().eq_ignore_ascii_case("close"),
            None => true,
        }
    }
}
