//! Chainable request configuration.
//!
//! # Design
//! `RequestBuilder` wraps `Result<RequestState, RequestError>`. Every
//! configuration call maps over the `Ok` side and turns its own failure into
//! the `Err` side, so once a call fails the state is gone and every later call
//! passes the first error through untouched. The error is only reported
//! when a terminal `send*` method runs.
//!
//! The body is a single `Option<EncodedBody>`: each body setter replaces it
//! along with its content type, so two body calls in a row never mix.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use ureq::http::{HeaderName, HeaderValue};
use url::Url;

use crate::body;
use crate::config::RequestConfig;
use crate::error::{ConfigError, RequestError};
use crate::flatten;
use crate::http::{EncodedBody, HttpMethod, CONTENT_LENGTH, CONTENT_TYPE};
use crate::inspect::is_absent;
use crate::query::QueryPairs;
use crate::types::Multipart;

/// Everything accumulated for one request.
#[derive(Debug, Clone)]
pub(crate) struct RequestState {
    pub(crate) method: HttpMethod,
    pub(crate) url: Url,
    pub(crate) query: QueryPairs,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<EncodedBody>,
    pub(crate) config: RequestConfig,
    pub(crate) debug: bool,
}

impl RequestState {
    /// User headers followed by the body's content headers. A user-supplied
    /// `Content-Type` or `Content-Length` is dropped while a body is set.
    pub(crate) fn effective_headers(&self) -> Vec<(String, String)> {
        let Some(body) = &self.body else {
            return self.headers.clone();
        };
        self.headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(CONTENT_TYPE) && !name.eq_ignore_ascii_case(CONTENT_LENGTH)
            })
            .cloned()
            .chain(body.content_headers())
            .collect()
    }
}

/// Fluent builder for a single HTTP request.
///
/// Created by [`get`](crate::get), [`post`](crate::post), [`put`](crate::put)
/// and [`delete`](crate::delete). Consumed by one of the `send*` methods.
///
/// ```no_run
/// use serde_json::json;
///
/// let page = fluent_request::get("https://example.com/users/{}", &[&42])
///     .header(&json!({ "token": "123456789" }))
///     .param(&json!({ "fields": ["name", "age"] }))
///     .send_string()?;
/// # Ok::<(), fluent_request::RequestError>(())
/// ```
#[derive(Debug)]
#[must_use = "RequestBuilder does nothing until a send method is called"]
pub struct RequestBuilder {
    pub(crate) state: Result<RequestState, RequestError>,
}

impl RequestBuilder {
    /// Substitute `args` into the `{}` placeholders of `template` and parse the
    /// result as the target URL. A failure is recorded and reported by the
    /// terminal call.
    pub fn new(method: HttpMethod, template: &str, args: &[&dyn fmt::Display]) -> Self {
        let state = substitute(template, args)
            .and_then(|url| Url::parse(&url).map_err(|source| ConfigError::InvalidUrl { url, source }))
            .map(|url| RequestState {
                method,
                query: QueryPairs::parse(url.query().unwrap_or_default()),
                url,
                headers: Vec::new(),
                body: None,
                config: RequestConfig::default(),
                debug: false,
            })
            .map_err(|source| failed("url", source));
        Self { state }
    }

    fn apply<F>(self, stage: &'static str, f: F) -> Self
    where
        F: FnOnce(&mut RequestState) -> Result<(), ConfigError>,
    {
        let state = self.state.and_then(|mut state| match f(&mut state) {
            Ok(()) => Ok(state),
            Err(source) => Err(failed(stage, source)),
        });
        Self { state }
    }

    /// Print the request to the trace log right before it is sent.
    pub fn debug(self) -> Self {
        self.apply("debug", |state| {
            state.debug = true;
            Ok(())
        })
    }

    /// Deadline for the whole attempt. Defaults to two seconds.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.apply("timeout", |state| {
            state.config.timeout = timeout;
            Ok(())
        })
    }

    /// Nesting budget for values passed to `header`, `param` and `form`.
    pub fn max_depth(self, max_depth: usize) -> Self {
        self.apply("max_depth", |state| {
            state.config.max_depth = max_depth;
            Ok(())
        })
    }

    /// Replace every limit at once.
    pub fn config(self, config: RequestConfig) -> Self {
        self.apply("config", |state| {
            state.config = config;
            Ok(())
        })
    }

    /// Flatten `value` into headers. Keys may repeat; every pair is appended.
    pub fn header<T: Serialize + ?Sized>(self, value: &T) -> Self {
        if is_absent(value) {
            return self;
        }
        self.apply("header", |state| {
            let mut pairs = Vec::new();
            flatten::flatten(value, &mut pairs, state.config.max_depth)?;
            for (name, value) in &pairs {
                if HeaderName::from_bytes(name.as_bytes()).is_err() {
                    return Err(ConfigError::InvalidHeaderName(name.clone()));
                }
                if HeaderValue::from_str(value).is_err() {
                    return Err(ConfigError::InvalidHeaderValue(name.clone()));
                }
            }
            state.headers.extend(pairs);
            Ok(())
        })
    }

    /// Flatten `value` into the query string. Pairs accumulate with any
    /// already in the URL, and the query is re-encoded in key order.
    ///
    /// Re-encoding normalizes the template's own query: a bare `?flag`
    /// becomes `flag=` and `%20` becomes `+`. A URL that never sees a
    /// `param` call keeps its query exactly as written.
    pub fn param<T: Serialize + ?Sized>(self, value: &T) -> Self {
        if is_absent(value) {
            return self;
        }
        self.apply("param", |state| {
            flatten::flatten(value, &mut state.query, state.config.max_depth)?;
            if !state.query.is_empty() {
                state.url.set_query(Some(&state.query.encode()));
            }
            Ok(())
        })
    }

    /// Raw `application/octet-stream` body. An empty slice is ignored.
    pub fn stream(self, bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return self;
        }
        self.apply("stream", |state| {
            state.body = Some(body::stream(bytes));
            Ok(())
        })
    }

    /// JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        if is_absent(value) {
            return self;
        }
        self.apply("json", |state| {
            state.body = Some(body::json(value)?);
            Ok(())
        })
    }

    /// URL-encoded form body built by flattening `value`.
    pub fn form<T: Serialize + ?Sized>(self, value: &T) -> Self {
        if is_absent(value) {
            return self;
        }
        self.apply("form", |state| {
            state.body = Some(body::form(value, state.config.max_depth)?);
            Ok(())
        })
    }

    /// `multipart/form-data` body.
    pub fn multipart(self, spec: &Multipart) -> Self {
        self.apply("multipart", |state| {
            state.body = Some(body::multipart(spec)?);
            Ok(())
        })
    }

    /// The recorded configuration error, if any.
    pub fn error(&self) -> Option<&RequestError> {
        self.state.as_ref().err()
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.state.as_ref().ok().map(|state| state.method)
    }

    pub fn url(&self) -> Option<&Url> {
        self.state.as_ref().ok().map(|state| &state.url)
    }

    /// Headers as they will be sent, content headers included.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.state
            .as_ref()
            .map(RequestState::effective_headers)
            .unwrap_or_default()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.encoded_body().map(|body| body.bytes.as_slice())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.encoded_body().map(|body| body.content_type.as_str())
    }

    pub fn request_config(&self) -> Option<&RequestConfig> {
        self.state.as_ref().ok().map(|state| &state.config)
    }

    fn encoded_body(&self) -> Option<&EncodedBody> {
        self.state.as_ref().ok().and_then(|state| state.body.as_ref())
    }
}

fn failed(stage: &'static str, source: ConfigError) -> RequestError {
    debug!(stage, error = %source, "request configuration failed");
    RequestError::Configuration { stage, source }
}

/// Positional `{}` substitution. `{{` and `}}` produce literal braces.
fn substitute(template: &str, args: &[&dyn fmt::Display]) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut used = 0;
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                out.push(c);
            }
            ('{', Some('}')) => {
                chars.next();
                if let Some(arg) = args.get(used) {
                    out.push_str(&arg.to_string());
                }
                used += 1;
            }
            ('{', _) | ('}', _) => {
                return Err(ConfigError::Template(format!(
                    "unmatched {c:?} in {template:?}"
                )));
            }
            _ => out.push(c),
        }
    }
    if used != args.len() {
        return Err(ConfigError::TemplateArity {
            expected: used,
            actual: args.len(),
        });
    }
    Ok(out)
}
