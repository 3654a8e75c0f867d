//! Zero-copy request head parser.
//!
//! Parses the byte range spanning the request line through the final
//! `\r\n\r\n` into a borrowed [`Request`]. No strings are allocated; every
//! slice points into the caller's receive buffer. Limits are enforced per
//! field so oversized or malformed traffic is rejected before any routing
//! work happens.

use memchr::memchr;

use crate::config::ServerConfig;
use crate::error::Error;
use crate::wire::request::{method_from_token, Headers, Request};

/// Field limits the parser enforces, extracted from the server config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParseLimits {
    pub uri_bytes_max: usize,
    pub header_count_max: usize,
}

impl ParseLimits {
    pub(crate) fn from_config(config: &ServerConfig) -> Self {
        Self {
            uri_bytes_max: config.request_uri_bytes_max,
            header_count_max: config.header_count_max,
        }
    }
}

/// Parse a complete request head.
///
/// `head` must span exactly the request line through the terminating
/// `\r\n\r\n` (the engine locates the delimiter before calling).
pub(crate) fn parse_head<'b>(head: &'b [u8], limits: &ParseLimits) -> Result<Request<'b>, Error> {
    let mut lines = HeadLines { rest: head };

    let request_line = lines.next_line()?.ok_or(Error::MalformedRequest)?;
    let (method, target) = parse_request_line(request_line, limits)?;

    let mut headers = Headers::new();
    loop {
        match lines.next_line()? {
            None => break,
            Some(line) => {
                if headers.len() == limits.header_count_max {
                    return Err(Error::TooManyHeaders);
                }
                let (name, value) = parse_header_line(line)?;
                headers.push(name, value);
            }
        }
    }

    Ok(Request::new(method, target, headers))
}

/// Iterator over CRLF-terminated lines; an empty line ends the head.
struct HeadLines<'b> {
    rest: &'b [u8],
}

impl<'b> HeadLines<'b> {
    /// `Ok(None)` on the blank line terminating the head.
    fn next_line(&mut self) -> Result<Option<&'b [u8]>, Error> {
        let nl = memchr(b'\n', self.rest).ok_or(Error::MalformedRequest)?;
        if nl == 0 || self.rest[nl - 1] != b'\r' {
            return Err(Error::MalformedRequest);
        }
        let line = &self.rest[..nl - 1];
        self.rest = &self.rest[nl + 1..];
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}

fn parse_request_line<'b>(
    line: &'b [u8],
    limits: &ParseLimits,
) -> Result<(http::Method, &'b str), Error> {
    let sp1 = memchr(b' ', line).ok_or(Error::MalformedRequest)?;
    let method = method_from_token(&line[..sp1])?;

    let rest = &line[sp1 + 1..];
    let sp2 = memchr(b' ', rest).ok_or(Error::MalformedRequest)?;
    let target_bytes = &rest[..sp2];
    if target_bytes.len() > limits.uri_bytes_max {
        return Err(Error::UriTooLong);
    }
    if !target_bytes.starts_with(b"/") {
        return Err(Error::MalformedRequest);
    }
    let target = std::str::from_utf8(target_bytes).map_err(|_| Error::MalformedRequest)?;

    let version = &rest[sp2 + 1..];
    if version != b"HTTP/1.1" {
        if version.starts_with(b"HTTP/") && version.len() == 8 {
            return Err(Error::HttpVersionNotSupported);
        }
        return Err(Error::MalformedRequest);
    }

    Ok((method, target))
}

fn parse_header_line(line: &[u8]) -> Result<(&str, &str), Error> {
    let colon = memchr(b':', line).ok_or(Error::MalformedRequest)?;
    if colon == 0 {
        return Err(Error::MalformedRequest);
    }
    let name = std::str::from_utf8(&line[..colon]).map_err(|_| Error::MalformedRequest)?;
    if name.contains(' ') {
        return Err(Error::MalformedRequest);
    }
    let value = std::str::from_utf8(&line[colon + 1..]).map_err(|_| Error::MalformedRequest)?;
    Ok((name, value.trim()))
}
