use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use http::Method;
use http::header::{ACCEPT, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::debug;

use crate::context::Context;
use crate::entity::Entity;
use crate::error::{Error, TransportErrorKind};
use crate::filter::FilterProcessor;
use crate::multi_map::MultiValuedMap;
use crate::request::Request;
use crate::response::Response;
use crate::util::{
    lock_unpoisoned, parse_header_name, parse_header_value, redact_uri_for_logs,
    split_content_type,
};

use super::{Transport, transmit_entity};

const DEFAULT_CLIENT_NAME: &str = "reqkit";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_REDIRECTS: u32 = 10;
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;
const DEFAULT_POOL_MAX_IDLE_CONNECTIONS: usize = 16;

/// Blocking transport backed by a pair of `ureq` agents, one verifying server
/// certificates and one that does not.
pub struct UreqTransport {
    verified: ureq::Agent,
    unverified: ureq::Agent,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_redirects: u32,
}

#[derive(Clone, Copy)]
struct AttemptSettings {
    connect_timeout: Duration,
    read_timeout: Duration,
    max_redirects: u32,
}

#[derive(Clone, Debug)]
pub struct UreqTransportBuilder {
    client_name: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_redirects: u32,
    pool_idle_timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_max_idle_connections: usize,
}

impl Default for UreqTransportBuilder {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            pool_max_idle_connections: DEFAULT_POOL_MAX_IDLE_CONNECTIONS,
        }
    }
}

impl UreqTransportBuilder {
    /// Sent as the `User-Agent` header.
    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Used when the request leaves its connect timeout unset.
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout.max(Duration::from_millis(1));
        self
    }

    /// Used when the request leaves its read timeout unset.
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn pool_idle_timeout(mut self, pool_idle_timeout: Duration) -> Self {
        self.pool_idle_timeout = pool_idle_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn pool_max_idle_per_host(mut self, pool_max_idle_per_host: usize) -> Self {
        self.pool_max_idle_per_host = pool_max_idle_per_host.max(1);
        self
    }

    pub fn pool_max_idle_connections(mut self, pool_max_idle_connections: usize) -> Self {
        self.pool_max_idle_connections = pool_max_idle_connections.max(1);
        self
    }

    fn make_agent(&self, verify_certificates: bool) -> ureq::Agent {
        let tls_config = ureq::tls::TlsConfig::builder()
            .disable_verification(!verify_certificates)
            .build();
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(self.client_name.as_str())
            .max_idle_age(self.pool_idle_timeout)
            .max_idle_connections_per_host(self.pool_max_idle_per_host)
            .max_idle_connections(self.pool_max_idle_connections)
            .tls_config(tls_config)
            .build()
            .new_agent()
    }

    pub fn build(self) -> UreqTransport {
        UreqTransport {
            verified: self.make_agent(true),
            unverified: self.make_agent(false),
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            max_redirects: self.max_redirects,
        }
    }
}

impl UreqTransport {
    pub fn builder() -> UreqTransportBuilder {
        UreqTransportBuilder::default()
    }

    fn attempt_settings(&self, request: &Request) -> AttemptSettings {
        AttemptSettings {
            connect_timeout: request.connect_timeout().unwrap_or(self.connect_timeout),
            read_timeout: request.read_timeout().unwrap_or(self.read_timeout),
            max_redirects: if request.is_follow_redirects() {
                self.max_redirects
            } else {
                0
            },
        }
    }

    fn run_configured_request<S: ureq::AsSendBody>(
        agent: &ureq::Agent,
        request: ureq::http::Request<S>,
        settings: AttemptSettings,
        method: &Method,
        uri_text: &str,
    ) -> crate::Result<ureq::http::Response<ureq::Body>> {
        let configured_request = agent
            .configure_request(request)
            .timeout_connect(Some(settings.connect_timeout))
            .timeout_recv_response(Some(settings.read_timeout))
            .timeout_recv_body(Some(settings.read_timeout))
            .max_redirects(settings.max_redirects)
            .max_redirects_will_error(false)
            .build();

        agent
            .run(configured_request)
            .map_err(|source| ureq_error(source, method, uri_text))
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UreqTransport")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

fn classify_ureq_transport_error(error: &ureq::Error) -> TransportErrorKind {
    match error {
        ureq::Error::HostNotFound => TransportErrorKind::Dns,
        ureq::Error::Tls(_) => TransportErrorKind::Tls,
        ureq::Error::ConnectProxyFailed(_) | ureq::Error::ConnectionFailed => {
            TransportErrorKind::Connect
        }
        _ => TransportErrorKind::Other,
    }
}

fn ureq_error(source: ureq::Error, method: &Method, uri_text: &str) -> Error {
    match source {
        ureq::Error::Timeout(_) => Error::Timeout {
            method: method.clone(),
            uri: redact_uri_for_logs(uri_text),
        },
        ureq::Error::Io(source) => Error::Io { source },
        other => Error::Transport {
            kind: classify_ureq_transport_error(&other),
            method: method.clone(),
            uri: redact_uri_for_logs(uri_text),
            source: Box::new(other),
        },
    }
}

/// Maps body read failures that wrap a `ureq` error back onto the crate error.
fn body_read_error(source: std::io::Error, method: &Method, uri_text: &str) -> Error {
    let is_ureq_error = source
        .get_ref()
        .is_some_and(|inner| inner.is::<ureq::Error>());
    if !is_ureq_error {
        return Error::Io { source };
    }
    match source.into_inner().map(|inner| inner.downcast::<ureq::Error>()) {
        Some(Ok(ureq_source)) => ureq_error(*ureq_source, method, uri_text),
        Some(Err(other)) => Error::Io {
            source: std::io::Error::other(other),
        },
        None => Error::Io {
            source: std::io::Error::other("response body read failed"),
        },
    }
}

/// `ureq`'s body reader is not `Sync`; entities require it.
struct SyncReader<R> {
    inner: Mutex<R>,
}

impl<R: Read> Read for SyncReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        lock_unpoisoned(&self.inner).read(buf)
    }
}

fn response_headers(headers: &http::HeaderMap) -> MultiValuedMap {
    let mut collected = MultiValuedMap::new();
    for (name, value) in headers {
        collected.add(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    collected
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        context: &mut Context,
        entity: Option<Entity>,
        filters: &FilterProcessor,
    ) -> crate::Result<Response> {
        let method = context.method().clone();
        let request = context
            .request()
            .cloned()
            .ok_or_else(|| Error::execution("transport invoked before a request was set"))?;
        let uri_text = request.full_uri();

        if entity.is_some() && matches!(method, Method::GET | Method::TRACE) {
            return Err(Error::EntityNotSupported { method });
        }

        let mut builder = ureq::http::Request::builder()
            .method(method.clone())
            .uri(uri_text.as_str());
        for (name, values) in request.headers() {
            let header_name = parse_header_name(name)?;
            for value in values {
                builder = builder.header(header_name.clone(), parse_header_value(name, value)?);
            }
        }
        if let Some(accept) = request.accept()
            && !request.headers().contains_key(ACCEPT.as_str())
        {
            builder = builder.header(ACCEPT, parse_header_value(ACCEPT.as_str(), accept)?);
        }

        let agent = if request.is_ssl_validated() {
            &self.verified
        } else {
            &self.unverified
        };
        let settings = self.attempt_settings(&request);

        debug!(uri = %redact_uri_for_logs(&uri_text), "dispatching request with ureq");
        let response = match entity {
            Some(entity) => {
                if !request.headers().contains_key(CONTENT_TYPE.as_str()) {
                    builder = builder.header(
                        CONTENT_TYPE,
                        parse_header_value(CONTENT_TYPE.as_str(), &entity.full_content_type())?,
                    );
                }
                let (body_reader, body_writer) = std::io::pipe()?;
                let ureq_request = builder
                    .body(ureq::SendBody::from_owned_reader(body_reader))
                    .map_err(|source| Error::RequestBuild { source })?;
                let attempt_context = &mut *context;
                std::thread::scope(|scope| {
                    let writer = scope.spawn(move || {
                        transmit_entity(attempt_context, filters, entity, Box::new(body_writer))
                    });
                    let sent = Self::run_configured_request(
                        agent,
                        ureq_request,
                        settings,
                        &method,
                        &uri_text,
                    );
                    let written = writer.join().unwrap_or_else(|_| {
                        Err(Error::execution("request body writer panicked"))
                    });
                    // a failed send closes the pipe, so the writer's error is secondary
                    let response = sent?;
                    written?;
                    Ok::<_, Error>(response)
                })?
            }
            None => {
                let ureq_request = builder
                    .body(())
                    .map_err(|source| Error::RequestBuild { source })?;
                Self::run_configured_request(agent, ureq_request, settings, &method, &uri_text)?
            }
        };

        let (parts, body) = response.into_parts();
        let status = parts.status.as_u16();
        let mut headers = response_headers(&parts.headers);
        let decoded = headers
            .get_first(CONTENT_ENCODING.as_str())
            .is_some_and(|encoding| encoding.eq_ignore_ascii_case("gzip"));
        if decoded {
            // ureq hands out the decompressed body
            headers.remove(CONTENT_ENCODING.as_str());
            headers.remove(CONTENT_LENGTH.as_str());
        }

        let (content_type, charset) = headers
            .get_first(CONTENT_TYPE.as_str())
            .map(split_content_type)
            .unwrap_or_default();

        let reader = SyncReader {
            inner: Mutex::new(body.into_reader()),
        };
        let entity =
            match Entity::with_metadata(reader, content_type.as_deref(), charset.as_deref()) {
                Ok(entity) => Some(entity),
                Err(Error::EmptyEntity) => None,
                Err(Error::Io { source }) => {
                    return Err(body_read_error(source, &method, &uri_text));
                }
                Err(other) => return Err(other),
            };

        let converters = context.converters().clone();
        let response = Response::new(converters, request, status, headers, entity).map_err(
            |error| match error {
                Error::Io { source } => body_read_error(source, &method, &uri_text),
                other => other,
            },
        )?;
        Ok(response)
    }
}
