use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::Method;
use http::header::CONTENT_TYPE;

use crate::context::Context;
use crate::entity::Entity;
use crate::error::Error;
use crate::filter::FilterProcessor;
use crate::multi_map::MultiValuedMap;
use crate::request::Request;
use crate::response::Response;
use crate::util::{lock_unpoisoned, split_content_type};

use super::{Transport, encode_entity};

/// Canned response served by [`MockTransport`] to requests it matches.
///
/// The URI is compared ignoring case. Method, headers and query parameters only take
/// part in matching once they have been configured; query parameters encoded in the
/// mock's URI count as configured.
#[derive(Debug)]
pub struct RequestMock {
    uri: String,
    method: Option<Method>,
    headers: Option<MultiValuedMap>,
    query_parameters: Option<MultiValuedMap>,
    status: u16,
    response_headers: MultiValuedMap,
    response_body: Option<Bytes>,
    called: AtomicUsize,
}

impl RequestMock {
    pub fn new(uri: impl AsRef<str>) -> crate::Result<Self> {
        let parsed = Request::new(uri)?;
        let query_parameters =
            (!parsed.query_parameters().is_empty()).then(|| parsed.query_parameters().clone());
        Ok(Self {
            uri: parsed.uri().to_owned(),
            method: None,
            headers: None,
            query_parameters,
            status: 200,
            response_headers: MultiValuedMap::new(),
            response_body: None,
            called: AtomicUsize::new(0),
        })
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn request_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(MultiValuedMap::new)
            .add(name, value);
        self
    }

    pub fn request_query_parameter(
        mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Self {
        self.query_parameters
            .get_or_insert_with(MultiValuedMap::new)
            .add(name, value);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn response_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.response_headers.add(name, value);
        self
    }

    pub fn response_body(mut self, body: impl Into<Bytes>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn called(&self) -> bool {
        self.called_count() > 0
    }

    pub fn called_count(&self) -> usize {
        self.called.load(Ordering::SeqCst)
    }

    pub fn matches(&self, request: &Request, method: &Method) -> bool {
        if !self.uri.eq_ignore_ascii_case(request.uri()) {
            return false;
        }
        if let Some(expected) = &self.method
            && expected != method
        {
            return false;
        }
        if let Some(expected) = &self.headers
            && expected != request.headers()
        {
            return false;
        }
        if let Some(expected) = &self.query_parameters
            && expected != request.query_parameters()
        {
            return false;
        }
        true
    }

    fn response_entity(&self) -> crate::Result<Option<Entity>> {
        let Some(body) = self.response_body.as_ref().filter(|body| !body.is_empty()) else {
            return Ok(None);
        };
        let (content_type, charset) = self
            .response_headers
            .get_first(CONTENT_TYPE.as_str())
            .map(split_content_type)
            .unwrap_or_default();
        Entity::from_bytes(body.clone(), content_type.as_deref(), charset.as_deref()).map(Some)
    }
}

/// In-memory transport answering from registered [`RequestMock`]s.
///
/// Keeps every transmitted request body so tests can inspect what left the filters.
#[derive(Debug, Default)]
pub struct MockTransport {
    mocks: Mutex<Vec<Arc<RequestMock>>>,
    request_bodies: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mock. Earlier mocks win when several match.
    pub fn mock(&self, mock: RequestMock) -> Arc<RequestMock> {
        let mock = Arc::new(mock);
        lock_unpoisoned(&self.mocks).push(Arc::clone(&mock));
        mock
    }

    pub fn mocks(&self) -> Vec<Arc<RequestMock>> {
        lock_unpoisoned(&self.mocks).clone()
    }

    pub fn all_mocks_called(&self) -> bool {
        lock_unpoisoned(&self.mocks)
            .iter()
            .all(|mock| mock.called())
    }

    pub fn request_bodies(&self) -> Vec<Vec<u8>> {
        lock_unpoisoned(&self.request_bodies).clone()
    }

    pub fn last_request_body(&self) -> Option<Vec<u8>> {
        lock_unpoisoned(&self.request_bodies).last().cloned()
    }

    fn find_matching_mock(&self, request: &Request, method: &Method) -> Option<Arc<RequestMock>> {
        lock_unpoisoned(&self.mocks)
            .iter()
            .find(|mock| mock.matches(request, method))
            .cloned()
    }
}

impl Transport for MockTransport {
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

        let Some(mock) = self.find_matching_mock(&request, &method) else {
            return Err(Error::UnmatchedMock {
                method,
                uri: request.full_uri(),
            });
        };

        if let Some(entity) = entity {
            let body = encode_entity(context, filters, entity)?;
            lock_unpoisoned(&self.request_bodies).push(body);
        }
        mock.called.fetch_add(1, Ordering::SeqCst);

        let entity = mock.response_entity()?;
        Response::new(
            context.converters().clone(),
            request,
            mock.status,
            mock.response_headers.clone(),
            entity,
        )
    }
}
