//! Human-readable dump of a request, printed when `debug()` is enabled.

use std::fmt::Write;

use tracing::info;

use crate::builder::RequestState;

pub const TRACE_TARGET: &str = "fluent_request::trace";

const MARKER: &str = "+--- ";

pub(crate) fn emit(state: &RequestState) {
    info!(target: TRACE_TARGET, "\n{}", render(state));
}

pub(crate) fn render(state: &RequestState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "+ [{}] {}", state.method, state.url);
    out.push_str("+ Header:\n");
    for (name, value) in state.effective_headers() {
        let _ = writeln!(out, "{MARKER}{name} : {value}");
    }
    out.push_str("+ Body:\n");
    if let Some(body) = state.body.as_ref().filter(|body| !body.bytes.is_empty()) {
        let text = String::from_utf8_lossy(&body.bytes);
        let _ = writeln!(out, "{MARKER}{}", text.replace('\n', &format!("\n{MARKER}")));
    }
    out
}
