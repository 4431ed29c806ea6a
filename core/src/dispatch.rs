//! Terminal operations: send the request and classify the outcome.
//!
//! # Design
//! A terminal call first turns the builder into a `PreparedRequest`. If a
//! configuration error was recorded this fails right there and nothing reaches
//! the network. Otherwise one `ureq` call is made on the shared agent with the
//! request's own timeout, the whole body is buffered, and the response is
//! classified:
//!
//! - transport failure (resolution, connect, timeout, oversized body)
//!   becomes `RequestError::Transport`;
//! - any status other than 200 becomes `RequestError::Status` with the body;
//! - 200 yields the raw bytes, which the `send_string` / `send_json` variants
//!   decode further.
//!
//! `send_async` does the preparation on the calling thread, so configuration
//! errors are returned directly, then moves the network call onto a worker
//! thread. Exactly one of the two callbacks runs, exactly once.

use std::sync::OnceLock;
use std::thread;

use serde::de::DeserializeOwned;
use tracing::debug;
use ureq::Agent;

use crate::builder::RequestBuilder;
use crate::config::RequestConfig;
use crate::error::{DecodeError, RequestError};
use crate::http::{HttpMethod, HttpResponse, CONTENT_LENGTH};
use crate::trace;

const SUCCESS_STATUS: u16 = 200;

/// Process-wide transport shared by every builder.
fn agent() -> &'static Agent {
    static AGENT: OnceLock<Agent> = OnceLock::new();
    AGENT.get_or_init(Agent::new_with_defaults)
}

/// A request that passed configuration and is ready for the network.
#[derive(Debug)]
struct PreparedRequest {
    method: HttpMethod,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    config: RequestConfig,
}

impl RequestBuilder {
    fn prepare(self) -> Result<PreparedRequest, RequestError> {
        let state = self.state?;
        if state.debug {
            trace::emit(&state);
        }
        Ok(PreparedRequest {
            method: state.method,
            url: state.url.to_string(),
            headers: state.effective_headers(),
            body: state.body.map(|body| body.bytes),
            config: state.config,
        })
    }

    /// Send the request and return the body of a 200 response.
    pub fn send(self) -> Result<Vec<u8>, RequestError> {
        dispatch(self.prepare()?)
    }

    /// Like [`send`](Self::send), decoding the body as UTF-8.
    pub fn send_string(self) -> Result<String, RequestError> {
        let bytes = self.send()?;
        Ok(String::from_utf8(bytes).map_err(DecodeError::from)?)
    }

    /// Like [`send`](Self::send), deserializing the body as JSON.
    pub fn send_json<T: DeserializeOwned>(self) -> Result<T, RequestError> {
        let bytes = self.send()?;
        Ok(serde_json::from_slice(&bytes).map_err(DecodeError::from)?)
    }

    /// Deserialize a JSON response into `target`. On error `target` is left
    /// untouched.
    pub fn send_into<T: DeserializeOwned>(self, target: &mut T) -> Result<(), RequestError> {
        *target = self.send_json()?;
        Ok(())
    }

    /// Send the request on a background thread.
    ///
    /// Configuration errors are returned immediately and neither callback
    /// runs. Otherwise this returns `Ok(())` at once and later calls either
    /// `on_success` with the body of a 200 response or `on_failure` with the
    /// transport or status error, never both. There is no way to cancel the
    /// call other than its timeout.
    pub fn send_async<S, F>(self, on_success: S, on_failure: F) -> Result<(), RequestError>
    where
        S: FnOnce(Vec<u8>) + Send + 'static,
        F: FnOnce(RequestError) + Send + 'static,
    {
        let prepared = self.prepare()?;
        thread::Builder::new()
            .name("fluent-request".to_string())
            .spawn(move || match dispatch(prepared) {
                Ok(bytes) => on_success(bytes),
                Err(err) => on_failure(err),
            })
            .map_err(RequestError::Spawn)?;
        Ok(())
    }
}

fn dispatch(request: PreparedRequest) -> Result<Vec<u8>, RequestError> {
    debug!(method = %request.method, url = %request.url, "sending request");
    let response = execute(&request)?;
    debug!(
        method = %request.method,
        url = %request.url,
        status = response.status,
        bytes = response.body.len(),
        "response received"
    );
    check_status(response)
}

fn execute(request: &PreparedRequest) -> Result<HttpResponse, RequestError> {
    let agent = agent();
    let url = request.url.as_str();
    let body = request.body.as_deref();

    let result = match request.method {
        HttpMethod::Get => match body {
            Some(body) => configure(agent.get(url), request).force_send_body().send(body),
            None => configure(agent.get(url), request).call(),
        },
        HttpMethod::Delete => match body {
            Some(body) => configure(agent.delete(url), request).force_send_body().send(body),
            None => configure(agent.delete(url), request).call(),
        },
        HttpMethod::Post => configure(agent.post(url), request).send(body.unwrap_or_default()),
        HttpMethod::Put => configure(agent.put(url), request).send(body.unwrap_or_default()),
    };

    let mut response = result.map_err(RequestError::Transport)?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .with_config()
        .limit(request.config.max_response_bytes)
        .read_to_vec()
        .map_err(RequestError::Transport)?;

    Ok(HttpResponse { status, body })
}

/// Apply the per-request timeout and headers. Status codes are classified by
/// `check_status`, not by the transport.
fn configure<B>(builder: ureq::RequestBuilder<B>, request: &PreparedRequest) -> ureq::RequestBuilder<B> {
    let mut builder = builder
        .config()
        .timeout_global(Some(request.config.timeout))
        .http_status_as_error(false)
        .build();
    // the transport derives Content-Length from the sized body
    for (name, value) in request
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(CONTENT_LENGTH))
    {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Only the canonical success status counts as success; every other code,
/// other 2xx included, is a failure carrying the body.
fn check_status(response: HttpResponse) -> Result<Vec<u8>, RequestError> {
    if response.status == SUCCESS_STATUS {
        return Ok(response.body);
    }
    Err(RequestError::Status {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}
