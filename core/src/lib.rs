//! Fluent HTTP request builder.
//!
//! # Overview
//! Chain configuration calls on a [`RequestBuilder`], then finish with one
//! terminal call that performs a single network round-trip:
//!
//! ```no_run
//! use fluent_request::{File, Multipart};
//! use serde_json::json;
//!
//! let reply = fluent_request::post("http://localhost:3000/upload", &[])
//!     .debug()
//!     .header(&json!({ "token": "123456789" }))
//!     .multipart(
//!         &Multipart::new()
//!             .field("id", "1")
//!             .file(File::new("img", "img.png", vec![0x89, b'P', b'N', b'G'])),
//!     )
//!     .send_string()?;
//! # Ok::<(), fluent_request::RequestError>(())
//! ```
//!
//! # Design
//! - Headers, query parameters and form bodies accept any `serde::Serialize`
//!   value and are flattened into key/value pairs (see [`flatten`]).
//! - Configuration errors are sticky: the first one is kept, later calls do
//!   nothing, and the error is returned by the terminal call before anything
//!   touches the network.
//! - Exactly one body encoder is in effect; the last body call wins.
//! - Only status 200 counts as success. Transport, status and decoding
//!   failures are separate [`ErrorKind`]s.

pub mod body;
pub mod builder;
pub mod config;
mod dispatch;
pub mod error;
pub mod flatten;
pub mod http;
mod inspect;
pub mod query;
mod trace;
pub mod types;

use std::fmt::Display;

pub use builder::RequestBuilder;
pub use config::RequestConfig;
pub use error::{ConfigError, DecodeError, ErrorKind, RequestError};
pub use flatten::{Bytes, FlattenError, FlattenTarget};
pub use http::HttpMethod;
pub use query::QueryPairs;
pub use trace::TRACE_TARGET;
pub use types::{File, Multipart};

/// Start a GET request. `{}` placeholders in `url` are replaced by `args` in
/// order.
pub fn get(url: &str, args: &[&dyn Display]) -> RequestBuilder {
    RequestBuilder::new(HttpMethod::Get, url, args)
}

pub fn post(url: &str, args: &[&dyn Display]) -> RequestBuilder {
    RequestBuilder::new(HttpMethod::Post, url, args)
}

pub fn put(url: &str, args: &[&dyn Display]) -> RequestBuilder {
    RequestBuilder::new(HttpMethod::Put, url, args)
}

pub fn delete(url: &str, args: &[&dyn Display]) -> RequestBuilder {
    RequestBuilder::new(HttpMethod::Delete, url, args)
}
