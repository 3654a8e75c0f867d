//! Respond values and the response head encoder.

use std::io::Write;

use http::StatusCode;

use crate::error::Error;

/// Response body: empty, borrowed from the request buffer or static data,
/// or owned by the handler.
#[derive(Debug, Default)]
pub enum Body<'a> {
    #[default]
    Empty,
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl Body<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Borrowed(b) => b,
            Body::Owned(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a str> for Body<'a> {
    fn from(s: &'a str) -> Self {
        Body::Borrowed(s.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Body<'a> {
    fn from(b: &'a [u8]) -> Self {
        Body::Borrowed(b)
    }
}

impl From<String> for Body<'_> {
    fn from(s: String) -> Self {
        Body::Owned(s.into_bytes())
    }
}

impl From<Vec<u8>> for Body<'_> {
    fn from(b: Vec<u8>) -> Self {
        Body::Owned(b)
    }
}

/// What a handler hands back: status, mime, body, and extra headers.
///
/// The encoder derives `Content-Type` from `mime` and `Content-Length` from
/// the body, and appends `Server: zzz` and `Connection: keep-alive` unless
/// an extra header of the same name overrides them. A respond built via
/// [`Respond::default`] has no status; encoding it is a [`Error::MissingStatus`]
/// and aborts the connection.
#[derive(Debug, Default)]
pub struct Respond<'a> {
    status: Option<StatusCode>,
    mime: Option<&'static str>,
    body: Body<'a>,
    extra_headers: Vec<(String, String)>,
}

impl<'a> Respond<'a> {
    pub fn new(status: StatusCode) -> Respond<'static> {
        Respond {
            status: Some(status),
            mime: None,
            body: Body::Empty,
            extra_headers: Vec::new(),
        }
    }

    /// Shorthand for `Respond::new(StatusCode::OK)`.
    pub fn ok() -> Respond<'static> {
        Respond::new(StatusCode::OK)
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn mime(mut self, mime: &'static str) -> Self {
        self.mime = Some(mime);
        self
    }

    /// Replace the body. The respond's lifetime follows the body's.
    pub fn body<'n>(self, body: impl Into<Body<'n>>) -> Respond<'n> {
        Respond {
            status: self.status,
            mime: self.mime,
            body: body.into(),
            extra_headers: self.extra_headers,
        }
    }

    /// Append an extra response header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body_slice(&self) -> &[u8] {
        self.body.as_slice()
    }

    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.extra_headers
    }

    fn has_extra(&self, name: &str) -> bool {
        self.extra_headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Encode the response head into `out`.
///
/// Layout: status line, fixed `Server` / `Connection` headers (unless
/// overridden), extra headers, `Content-Type`, `Content-Length`, blank
/// line. The body is not copied; the caller sends head and body as one
/// [`Pseudoslice`](crate::wire::Pseudoslice).
pub(crate) fn encode_head(respond: &Respond<'_>, out: &mut Vec<u8>) -> Result<(), Error> {
    let status = respond.status_code().ok_or(Error::MissingStatus)?;

    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    out.extend_from_slice(b"\r\n");

    if !respond.has_extra("server") {
        out.extend_from_slice(b"Server: zzz\r\n");
    }
    if !respond.has_extra("connection") {
        out.extend_from_slice(b"Connection: keep-alive\r\n");
    }

    for (name, value) in respond.extra_headers() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    match respond.mime {
        Some(mime) => {
            out.extend_from_slice(b"Content-Type: ");
            out.extend_from_slice(mime.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        None => {
            if !respond.body.is_empty() && !respond.has_extra("content-type") {
                out.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
            }
        }
    }

    // infallible on Vec
    let _ = write!(out, "Content-Length: {}\r\n", respond.body.len());
    out.extend_from_slice(b"\r\n");

    Ok(())
}
