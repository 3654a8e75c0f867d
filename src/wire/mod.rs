//! HTTP/1.1 wire layer: zero-copy request parsing, respond values, the
//! response head encoder, and the pseudoslice used to send head and body
//! without a combined buffer.

pub(crate) mod parser;
mod pseudoslice;
mod query;
mod request;
mod response;

pub use pseudoslice::Pseudoslice;
pub use query::QueryMap;
pub use request::{Headers, Request};
pub use response::{Body, Respond};

pub(crate) use request::expects_body;
pub(crate) use response::encode_head;
