//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port, then drives the
//! builder over real HTTP. The server's `/echo` route reports what actually
//! arrived, so these tests check the wire, not the builder's own view.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;

use fluent_request::{ErrorKind, File, Multipart, RequestError};
use mock_server::{Echo, UploadedPart, Widget};
use serde::Serialize;
use serde_json::json;

fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn echo(builder: fluent_request::RequestBuilder) -> Echo {
    builder.send_json().unwrap()
}

#[test]
fn ok_response_returns_body_bytes() {
    let addr = spawn_server();
    let bytes = fluent_request::get("http://{}/ok", &[&addr]).send().unwrap();
    assert_eq!(bytes, b"ok");
}

#[test]
fn not_found_is_a_protocol_error_with_body() {
    let addr = spawn_server();
    let err = fluent_request::get("http://{}/status/404", &[&addr])
        .param(&json!({ "body": "not found" }))
        .send()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("not found"), "{err}");
    assert!(matches!(err, RequestError::Status { status: 404, .. }));
}

#[test]
fn other_success_codes_are_failures() {
    let addr = spawn_server();
    for code in [201, 204] {
        let err = fluent_request::post("http://{}/status/{}", &[&addr, &code])
            .send()
            .unwrap_err();
        assert!(matches!(err, RequestError::Status { status, .. } if status == code));
    }
}

#[test]
fn params_are_encoded_into_the_query() {
    let addr = spawn_server();
    let seen = echo(
        fluent_request::get("http://{}/echo", &[&addr]).param(&json!({ "a": 1, "b": [1, 2] })),
    );
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.query.as_deref(), Some("a=1&b%5B0%5D=1&b%5B1%5D=2"));
}

#[derive(Serialize)]
struct Auth {
    token: String,
    #[serde(rename = "x-request-id")]
    request_id: u32,
    trace: Option<String>,
}

#[test]
fn headers_are_sent_with_duplicates() {
    let addr = spawn_server();
    let seen = echo(
        fluent_request::get("http://{}/echo", &[&addr])
            .header(&Auth {
                token: "123456789".to_string(),
                request_id: 7,
                trace: None,
            })
            .header(&json!({ "token": "second" })),
    );
    assert_eq!(seen.header("token"), ["123456789", "second"]);
    assert_eq!(seen.header("x-request-id"), ["7"]);
    assert!(seen.header("trace").is_empty());
}

#[test]
fn json_body_sets_content_headers() {
    let addr = spawn_server();
    let seen = echo(
        fluent_request::post("http://{}/echo", &[&addr]).json(&json!({ "name": "rex", "age": 18 })),
    );
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.header("content-type"), ["application/json"]);
    assert_eq!(seen.header("content-length"), [seen.body.len().to_string()]);
    let body: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body, json!({ "name": "rex", "age": 18 }));
}

#[test]
fn second_body_call_replaces_the_first() {
    let addr = spawn_server();
    let seen = echo(
        fluent_request::put("http://{}/echo", &[&addr])
            .json(&json!({ "ignored": true }))
            .form(&json!({ "a": "x y", "b": [1] })),
    );
    assert_eq!(seen.method, "PUT");
    assert_eq!(seen.header("content-type"), ["application/x-www-form-urlencoded"]);
    assert_eq!(seen.body, "a=x+y&b%5B0%5D=1");
}

#[test]
fn stream_body_is_passed_through() {
    let addr = spawn_server();
    let seen = echo(fluent_request::put("http://{}/echo", &[&addr]).stream("raw bytes"));
    assert_eq!(seen.header("content-type"), ["application/octet-stream"]);
    assert_eq!(seen.body, "raw bytes");
}

#[test]
fn delete_can_carry_a_body() {
    let addr = spawn_server();
    let seen = echo(fluent_request::delete("http://{}/echo", &[&addr]).json(&json!([1, 2])));
    assert_eq!(seen.method, "DELETE");
    assert_eq!(seen.body, "[1,2]");
}

#[test]
fn multipart_parts_reach_the_server_intact() {
    let addr = spawn_server();
    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\xff".to_vec();
    let parts: Vec<UploadedPart> = fluent_request::post("http://{}/upload", &[&addr])
        .multipart(
            &Multipart::new()
                .field("id", "1")
                .file(File::new("img", "img.png", png.clone())),
        )
        .send_json()
        .unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "id");
    assert_eq!(parts[0].file_name, None);
    assert_eq!(parts[0].data, b"1");
    assert_eq!(parts[1].name, "img");
    assert_eq!(parts[1].file_name.as_deref(), Some("img.png"));
    assert_eq!(parts[1].data, png);
}

#[test]
fn typed_decoding() {
    let addr = spawn_server();
    let widget: Widget = fluent_request::get("http://{}/widget", &[&addr]).send_json().unwrap();
    assert_eq!(widget.name, "sprocket");

    let mut target = Widget {
        id: 0,
        name: String::new(),
    };
    fluent_request::get("http://{}/widget", &[&addr])
        .send_into(&mut target)
        .unwrap();
    assert_eq!(target, widget);
}

#[test]
fn decoding_failures_are_their_own_kind() {
    let addr = spawn_server();
    let err = fluent_request::get("http://{}/binary", &[&addr])
        .send_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decoding);

    let mut target = Widget {
        id: 5,
        name: "kept".to_string(),
    };
    let err = fluent_request::get("http://{}/ok", &[&addr])
        .send_into(&mut target)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decoding);
    assert_eq!(target.name, "kept");

    // status is checked before decoding
    let err = fluent_request::get("http://{}/status/500", &[&addr])
        .send_json::<Widget>()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn send_string_decodes_text() {
    let addr = spawn_server();
    let text = fluent_request::get("http://{}/ok", &[&addr])
        .debug()
        .send_string()
        .unwrap();
    assert_eq!(text, "ok");
}

#[test]
fn timeout_is_a_transport_error() {
    let addr = spawn_server();
    let err = fluent_request::get("http://{}/slow/{}", &[&addr, &2000])
        .timeout(Duration::from_millis(100))
        .send()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn connection_refused_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = fluent_request::get("http://{}/ok", &[&addr]).send().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn sticky_error_is_reported_verbatim() {
    let addr = spawn_server();
    let err = fluent_request::post("http://{}/echo", &[&addr])
        .header(&json!({ "token": "t" }))
        .max_depth(2)
        .form(&json!({ "nested": { "too": { "deep": 1 } } }))
        .max_depth(16)
        .form(&json!({ "flat": 1 }))
        .json(&json!({ "a": 1 }))
        .send()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.to_string(), "form: value nested deeper than 2 levels");
}

#[test]
fn depth_exceeded_surfaces_at_terminal_call() {
    let addr = spawn_server();
    let err = fluent_request::get("http://{}/echo", &[&addr])
        .max_depth(2)
        .param(&json!({ "a": { "b": { "c": 1 } } }))
        .header(&json!({ "token": "t" }))
        .send()
        .unwrap_err();
    assert_eq!(err.to_string(), "param: value nested deeper than 2 levels");
}

#[derive(Debug)]
enum Outcome {
    Success(Vec<u8>),
    Failure(RequestError),
}

/// Run `send_async` and collect every callback invocation.
fn run_async(builder: fluent_request::RequestBuilder) -> Vec<Outcome> {
    let (tx, rx) = mpsc::channel();
    let ok_tx = tx.clone();
    builder
        .send_async(
            move |bytes| ok_tx.send(Outcome::Success(bytes)).unwrap(),
            move |err| tx.send(Outcome::Failure(err)).unwrap(),
        )
        .unwrap();
    // the channel closes once the worker has dropped both callbacks
    rx.iter().collect()
}

#[test]
fn async_success_runs_only_the_success_callback() {
    let addr = spawn_server();
    let outcomes = run_async(fluent_request::get("http://{}/ok", &[&addr]));
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], Outcome::Success(bytes) if bytes == b"ok"));
}

#[test]
fn async_bad_status_runs_only_the_failure_callback() {
    // A non-200 status invokes the failure callback alone; the success
    // callback is never called afterwards.
    let addr = spawn_server();
    let outcomes = run_async(
        fluent_request::get("http://{}/status/404", &[&addr]).param(&json!({ "body": "not found" })),
    );
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        Outcome::Failure(err) => {
            assert_eq!(err.kind(), ErrorKind::Protocol);
            assert!(err.to_string().contains("not found"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn async_transport_error_runs_the_failure_callback() {
    let addr = spawn_server();
    let outcomes = run_async(
        fluent_request::get("http://{}/slow/{}", &[&addr, &2000]).timeout(Duration::from_millis(100)),
    );
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], Outcome::Failure(err) if err.kind() == ErrorKind::Transport));
}

#[test]
fn async_configuration_error_is_returned_to_the_caller() {
    let err = fluent_request::get("http://localhost/", &[])
        .param("bare")
        .send_async(|_| panic!("success callback ran"), |_| panic!("failure callback ran"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
