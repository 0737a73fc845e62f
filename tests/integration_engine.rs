use std::any::{Any, TypeId};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reqkit::converters::JsonConverter;
use reqkit::filters::{GzipFilter, HttpStatusErrorFilter};
use reqkit::prelude::*;
use reqkit::transport::{MockTransport, RequestMock, Transport};
use reqkit::{ConversionResult, EntityWriter, FilterProcessor, Priority};
use serde::{Deserialize, Serialize};

/// Reader that yields its bytes once and fails if read again after reaching the end.
struct SingleUse {
    inner: Cursor<Vec<u8>>,
    exhausted: Arc<AtomicBool>,
}

impl SingleUse {
    fn new(bytes: &[u8]) -> (Self, Arc<AtomicBool>) {
        let exhausted = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner: Cursor::new(bytes.to_vec()),
                exhausted: Arc::clone(&exhausted),
            },
            exhausted,
        )
    }
}

impl Read for SingleUse {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.exhausted.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("stream already consumed"));
        }
        let read = self.inner.read(buf)?;
        if read == 0 {
            self.exhausted.store(true, Ordering::SeqCst);
        }
        Ok(read)
    }
}

/// Votes for a retry on the first attempt only and records each attempt it saw.
struct RetryOnce {
    seen: Mutex<Vec<u32>>,
}

impl RetryFilter for RetryOnce {
    fn is_retry_required(&self, context: &Context) -> bool {
        self.seen.lock().expect("lock seen").push(context.retries());
        context.retries() == 0
    }
}

impl HttpClientFilter for RetryOnce {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_retry_filter(self);
    }
}

/// Never votes for a retry but records each attempt it saw.
struct NeverRetry {
    seen: Mutex<Vec<u32>>,
}

impl RetryFilter for NeverRetry {
    fn is_retry_required(&self, context: &Context) -> bool {
        self.seen.lock().expect("lock seen").push(context.retries());
        false
    }
}

impl HttpClientFilter for NeverRetry {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_retry_filter(self);
    }
}

/// Delegates to a mock transport and records whether each attempt's entity was buffered.
struct RecordingTransport {
    inner: MockTransport,
    buffered: Mutex<Vec<bool>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            inner: MockTransport::new(),
            buffered: Mutex::new(Vec::new()),
        }
    }
}

impl Transport for RecordingTransport {
    fn execute(
        &self,
        context: &mut Context,
        entity: Option<Entity>,
        filters: &FilterProcessor,
    ) -> reqkit::Result<Response> {
        if let Some(entity) = entity.as_ref() {
            self.buffered
                .lock()
                .expect("lock buffered")
                .push(entity.is_buffered());
        }
        self.inner.execute(context, entity, filters)
    }
}

fn mock_ok(transport: &MockTransport, uri: &str) -> Arc<RequestMock> {
    transport.mock(
        RequestMock::new(uri)
            .expect("mock uri should parse")
            .response_header("Content-Type", "text/plain; charset=UTF-8")
            .response_body("done"),
    )
}

#[test]
fn retry_filter_causes_buffered_entity_to_be_sent_twice() {
    let transport = Arc::new(RecordingTransport::new());
    let mock = mock_ok(&transport.inner, "http://example.com/upload");
    let retry = Arc::new(RetryOnce {
        seen: Mutex::new(Vec::new()),
    });
    let client = HttpClient::builder()
        .transport(transport.clone())
        .add_shared_filter(retry.clone())
        .try_build()
        .expect("client should build");

    let (stream, _) = SingleUse::new(b"payload-bytes");
    let entity = Entity::with_content_type(stream, "text/plain").expect("entity");
    let request = Request::new("http://example.com/upload").expect("request");
    let response = client
        .post(&request, Some(entity))
        .expect("call should succeed");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(mock.called_count(), 2);
    assert_eq!(*retry.seen.lock().expect("lock seen"), vec![0, 1]);
    assert_eq!(
        transport.inner.request_bodies(),
        vec![b"payload-bytes".to_vec(), b"payload-bytes".to_vec()]
    );
    assert_eq!(
        *transport.buffered.lock().expect("lock buffered"),
        vec![true, true]
    );
}

#[test]
fn every_retry_filter_runs_on_every_attempt() {
    let transport = Arc::new(MockTransport::new());
    mock_ok(&transport, "http://example.com/poll");
    let retry = Arc::new(RetryOnce {
        seen: Mutex::new(Vec::new()),
    });
    let never = Arc::new(NeverRetry {
        seen: Mutex::new(Vec::new()),
    });
    let client = HttpClient::builder()
        .transport(transport.clone())
        .add_shared_filter(never.clone())
        .add_shared_filter(retry.clone())
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/poll").expect("request");
    client.get(&request).expect("call should succeed");

    assert_eq!(*never.seen.lock().expect("lock seen"), vec![0, 1]);
    assert_eq!(*retry.seen.lock().expect("lock seen"), vec![0, 1]);
}

#[test]
fn entity_is_streamed_once_without_retry_filters() {
    let transport = Arc::new(RecordingTransport::new());
    let mock = mock_ok(&transport.inner, "http://example.com/upload");
    let client = HttpClient::builder()
        .transport(transport.clone())
        .try_build()
        .expect("client should build");

    let (stream, exhausted) = SingleUse::new(b"once");
    let entity = Entity::new(stream).expect("entity");
    let request = Request::new("http://example.com/upload").expect("request");
    client
        .put(&request, Some(entity))
        .expect("call should succeed");

    assert_eq!(mock.called_count(), 1);
    assert!(exhausted.load(Ordering::SeqCst));
    assert_eq!(*transport.buffered.lock().expect("lock buffered"), vec![false]);
    assert_eq!(transport.inner.last_request_body(), Some(b"once".to_vec()));
}

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().expect("lock events").push(event.into());
    }
}

impl RequestFilter for Recorder {
    fn filter_request(&self, _request: &mut Request) -> reqkit::Result<()> {
        self.push("filter_request");
        Ok(())
    }
}

impl ResponseFilter for Recorder {
    fn filter_response(&self, response: &mut Response) -> reqkit::Result<()> {
        self.push(format!("filter_response {}", response.status().as_u16()));
        Ok(())
    }
}

impl LifecycleFilter for Recorder {
    fn on_start(&self, context: &mut Context) -> reqkit::Result<()> {
        assert!(context.request().is_none());
        self.push("on_start");
        Ok(())
    }

    fn on_request(&self, context: &mut Context) -> reqkit::Result<()> {
        assert!(context.request().is_some());
        self.push("on_request");
        Ok(())
    }

    fn on_response(&self, context: &mut Context) -> reqkit::Result<()> {
        assert!(context.response().is_some());
        self.push("on_response");
        Ok(())
    }

    fn on_complete(&self, _context: &mut Context) -> reqkit::Result<()> {
        self.push("on_complete");
        Ok(())
    }
}

impl HttpClientFilter for Recorder {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_request_filter(self.clone());
        chain.add_response_filter(self.clone());
        chain.add_lifecycle_filter(self);
    }
}

#[test]
fn lifecycle_hooks_run_in_order() {
    let transport = Arc::new(MockTransport::new());
    mock_ok(&transport, "http://example.com/");
    let events = Arc::new(Mutex::new(Vec::new()));
    let client = HttpClient::builder()
        .transport(transport)
        .add_filter(Recorder {
            events: Arc::clone(&events),
        })
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/").expect("request");
    client.get(&request).expect("call should succeed");

    assert_eq!(
        *events.lock().expect("lock events"),
        vec![
            "on_start",
            "filter_request",
            "on_request",
            "filter_response 200",
            "on_response",
            "on_complete",
        ]
    );
}

struct Reject;

impl RequestFilter for Reject {
    fn filter_request(&self, _request: &mut Request) -> reqkit::Result<()> {
        Err(Error::execution("request rejected by filter"))
    }
}

impl HttpClientFilter for Reject {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_request_filter(self);
    }
}

#[test]
fn failing_filter_aborts_the_call() {
    let transport = Arc::new(MockTransport::new());
    let mock = mock_ok(&transport, "http://example.com/");
    let client = HttpClient::builder()
        .transport(transport)
        .try_build()
        .expect("client should build");

    let mut request = Request::new("http://example.com/").expect("request");
    request.add_filter(Reject);
    let error = client.get(&request).expect_err("filter error should abort");

    assert_eq!(error.code(), ErrorCode::Execution);
    assert!(!mock.called());
}

#[test]
fn request_filters_see_a_private_copy_of_the_request() {
    struct Stamp;

    impl RequestFilter for Stamp {
        fn filter_request(&self, request: &mut Request) -> reqkit::Result<()> {
            request.add_header("x-stamp", "1");
            Ok(())
        }
    }

    impl HttpClientFilter for Stamp {
        fn register(self: Arc<Self>, chain: &mut FilterChain) {
            chain.add_request_filter(self);
        }
    }

    let transport = Arc::new(MockTransport::new());
    let mock = transport.mock(
        RequestMock::new("http://example.com/")
            .expect("mock uri")
            .request_header("x-stamp", "1"),
    );
    let client = HttpClient::builder()
        .transport(transport)
        .add_filter(Stamp)
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/").expect("request");
    client.get(&request).expect("first call should match");
    client.get(&request).expect("second call should match too");

    assert_eq!(mock.called_count(), 2);
    assert!(request.headers().is_empty());
}

#[test]
fn status_filter_surfaces_failed_response() {
    let transport = Arc::new(MockTransport::new());
    transport.mock(
        RequestMock::new("http://example.com/missing")
            .expect("mock uri")
            .status(404)
            .response_header("Content-Type", "text/plain")
            .response_body("no such item"),
    );
    let client = HttpClient::builder()
        .transport(transport)
        .add_filter(HttpStatusErrorFilter)
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/missing").expect("request");
    let error = client.get(&request).expect_err("404 should fail");

    let Some(status_error) = error.http_status() else {
        panic!("unexpected error: {error}");
    };
    assert_eq!(status_error.kind(), StatusKind::NotFound);
    let mut response = match error {
        Error::HttpStatus(status_error) => status_error.into_response(),
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(response.text().expect("body"), "no such item");
}

#[test]
fn non_success_status_is_returned_without_status_filter() {
    let transport = Arc::new(MockTransport::new());
    transport.mock(
        RequestMock::new("http://example.com/broken")
            .expect("mock uri")
            .status(500),
    );
    let client = HttpClient::builder()
        .transport(transport)
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/broken").expect("request");
    let response = client.get(&request).expect("call should complete");

    assert_eq!(response.status().as_u16(), 500);
    assert!(!response.has_entity());
}

struct ShoutingWriter;

impl EntityWriter for ShoutingWriter {
    fn supports(&self, type_id: TypeId, _: Option<&str>, _: Option<&str>) -> bool {
        type_id == TypeId::of::<String>()
    }

    fn write(
        &self,
        value: &dyn Any,
        _: Option<&str>,
        _: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Read + Send + Sync>>> {
        Ok(value
            .downcast_ref::<String>()
            .map(|text| Box::new(Cursor::new(text.to_uppercase())) as Box<dyn Read + Send + Sync>))
    }

    fn content_type(&self) -> Option<&str> {
        Some("text/shout")
    }

    fn priority(&self) -> Priority {
        Priority::UserHigh
    }
}

#[test]
fn higher_priority_writer_wins_over_builtin() {
    let transport = Arc::new(MockTransport::new());
    mock_ok(&transport, "http://example.com/say");
    let client = HttpClient::builder()
        .transport(transport.clone())
        .add_writer(Arc::new(ShoutingWriter))
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/say").expect("request");
    client
        .execute_object(Method::POST, &request, &"hello".to_owned())
        .expect("call should succeed");

    assert_eq!(transport.last_request_body(), Some(b"HELLO".to_vec()));
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Item {
    id: u32,
    name: String,
}

#[test]
fn json_converter_round_trips_through_the_client() {
    let transport = Arc::new(MockTransport::new());
    transport.mock(
        RequestMock::new("http://example.com/items")
            .expect("mock uri")
            .method(Method::POST)
            .status(201)
            .response_header("Content-Type", "application/json")
            .response_body(r#"{"id":7,"name":"widget"}"#),
    );
    let client = HttpClient::builder()
        .transport(transport.clone())
        .add_converter(JsonConverter::<Item>::new())
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/items").expect("request");
    let mut response = client
        .execute_object(
            Method::POST,
            &request,
            &Item {
                id: 0,
                name: "widget".to_owned(),
            },
        )
        .expect("call should succeed");

    assert_eq!(
        transport.last_request_body(),
        Some(br#"{"id":0,"name":"widget"}"#.to_vec())
    );
    let created: Item = response.read().expect("json body should convert");
    assert_eq!(
        created,
        Item {
            id: 7,
            name: "widget".to_owned(),
        }
    );
}

#[test]
fn execute_json_serializes_with_serde() {
    let transport = Arc::new(MockTransport::new());
    mock_ok(&transport, "http://example.com/items");
    let client = HttpClient::builder()
        .transport(transport.clone())
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/items").expect("request");
    client
        .execute_json(
            Method::PUT,
            &request,
            &serde_json::json!({ "name": "demo" }),
        )
        .expect("call should succeed");

    assert_eq!(
        transport.last_request_body(),
        Some(br#"{"name":"demo"}"#.to_vec())
    );
}

#[test]
fn gzip_filter_compresses_the_transmitted_body() {
    let transport = Arc::new(MockTransport::new());
    let mock = transport.mock(
        RequestMock::new("http://example.com/upload")
            .expect("mock uri")
            .request_header("Content-Encoding", "gzip"),
    );
    let client = HttpClient::builder()
        .transport(transport.clone())
        .add_filter(GzipFilter::new())
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/upload").expect("request");
    let entity = Entity::from_bytes("compress me", Some("text/plain"), None).expect("entity");
    client
        .post(&request, Some(entity))
        .expect("call should succeed");

    assert!(mock.called());
    let body = transport.last_request_body().expect("body should be recorded");
    let mut decoded = String::new();
    flate2::read::GzDecoder::new(body.as_slice())
        .read_to_string(&mut decoded)
        .expect("body should be gzip");
    assert_eq!(decoded, "compress me");
}

#[test]
fn response_text_decodes_declared_windows_1252_charset() {
    let transport = Arc::new(MockTransport::new());
    transport.mock(
        RequestMock::new("http://example.com/menu")
            .expect("mock uri")
            .response_header("Content-Type", "text/plain; charset=windows-1252")
            .response_body(vec![b'c', b'a', b'f', 0xE9, 0x80]),
    );
    let client = HttpClient::builder()
        .transport(transport.clone())
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/menu").expect("request");
    let mut response = client.get(&request).expect("call should succeed");

    assert_eq!(response.text().expect("windows-1252 text"), "café€");
}

#[test]
fn string_entity_is_written_in_requested_utf16_charset() {
    let transport = Arc::new(MockTransport::new());
    mock_ok(&transport, "http://example.com/notes");
    let client = HttpClient::builder()
        .transport(transport.clone())
        .try_build()
        .expect("client should build");

    let entity = client
        .converters()
        .write(&String::from("hi"), Some("text/plain"), Some("UTF-16"))
        .expect("utf-16 writer");
    assert_eq!(entity.full_content_type(), "text/plain; charset=UTF-16");

    let request = Request::new("http://example.com/notes").expect("request");
    client
        .post(&request, Some(entity))
        .expect("call should succeed");

    assert_eq!(
        transport.last_request_body(),
        Some(vec![b'h', 0, b'i', 0])
    );
}

/// Response body that reports when its stream is released.
struct TrackedBody {
    inner: Cursor<Vec<u8>>,
    released: Arc<AtomicBool>,
}

impl Read for TrackedBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Answers 503 then 200 with streamed bodies, noting at each dispatch whether the
/// previous attempt's body had been released.
struct TrackedBodyTransport {
    bodies: Mutex<Vec<Arc<AtomicBool>>>,
    previous_released: Mutex<Vec<bool>>,
}

impl Transport for TrackedBodyTransport {
    fn execute(
        &self,
        context: &mut Context,
        _entity: Option<Entity>,
        _filters: &FilterProcessor,
    ) -> reqkit::Result<Response> {
        let mut bodies = self.bodies.lock().expect("lock bodies");
        if let Some(previous) = bodies.last() {
            self.previous_released
                .lock()
                .expect("lock released")
                .push(previous.load(Ordering::SeqCst));
        }

        let released = Arc::new(AtomicBool::new(false));
        bodies.push(Arc::clone(&released));
        let status = if bodies.len() == 1 { 503 } else { 200 };
        let entity = Entity::new(TrackedBody {
            inner: Cursor::new(b"attempt body".to_vec()),
            released,
        })?;
        let request = context.request().cloned().expect("attempt request");
        Response::new(
            context.converters().clone(),
            request,
            status,
            MultiValuedMap::new(),
            Some(entity),
        )
    }
}

#[test]
fn retried_response_is_closed_before_next_attempt() {
    let transport = Arc::new(TrackedBodyTransport {
        bodies: Mutex::new(Vec::new()),
        previous_released: Mutex::new(Vec::new()),
    });
    let client = HttpClient::builder()
        .transport(transport.clone())
        .add_filter(RetryOnce {
            seen: Mutex::new(Vec::new()),
        })
        .try_build()
        .expect("client should build");

    let mut request = Request::new("http://example.com/flaky").expect("request");
    request.set_buffer_response_entity(false);
    let mut response = client.get(&request).expect("call should succeed");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        *transport.previous_released.lock().expect("lock released"),
        vec![true]
    );
    let bodies = transport.bodies.lock().expect("lock bodies").clone();
    assert_eq!(bodies.len(), 2);
    assert!(!bodies[1].load(Ordering::SeqCst));
    assert_eq!(response.text().expect("final body"), "attempt body");
}

#[test]
fn unmatched_request_reports_method_and_uri() {
    let transport = Arc::new(MockTransport::new());
    transport.mock(
        RequestMock::new("http://example.com/items?page=1")
            .expect("mock uri")
            .method(Method::GET),
    );
    let client = HttpClient::builder()
        .transport(transport.clone())
        .try_build()
        .expect("client should build");

    let request = Request::new("http://example.com/items?page=2").expect("request");
    let error = client.get(&request).expect_err("query mismatch");

    match error {
        Error::UnmatchedMock { method, uri } => {
            assert_eq!(method, Method::GET);
            assert_eq!(uri, "http://example.com/items?page=2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!transport.all_mocks_called());
}

#[test]
fn mock_matches_uri_case_insensitively_and_counts_calls() {
    let transport = Arc::new(MockTransport::new());
    let mock = transport.mock(
        RequestMock::new("http://example.com/Items?page=1")
            .expect("mock uri")
            .method(Method::GET)
            .response_body("[]"),
    );
    let client = HttpClient::builder()
        .transport(transport.clone())
        .try_build()
        .expect("client should build");

    let mut request = Request::new("http://EXAMPLE.com/items").expect("request");
    request.add_query_parameter("page", "1");
    let mut response = client.get(&request).expect("call should match");

    assert_eq!(response.text().expect("body"), "[]");
    assert_eq!(mock.called_count(), 1);
    assert!(transport.all_mocks_called());
}
