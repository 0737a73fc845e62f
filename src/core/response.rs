use std::any::Any;
use std::io::Read;
use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;

use crate::converter::EntityConverterManager;
use crate::entity::Entity;
use crate::error::Error;
use crate::multi_map::MultiValuedMap;
use crate::request::Request;
use crate::util::truncate_text;

const MAX_ERROR_BODY_LEN: usize = 2048;

/// Outcome of one attempt: status, headers, optional body and the request that produced it.
///
/// Dropping or [closing](Response::close) the response releases the entity stream.
pub struct Response {
    status: StatusCode,
    headers: MultiValuedMap,
    entity: Option<Entity>,
    request: Request,
    converters: Arc<EntityConverterManager>,
}

impl Response {
    /// Buffers the entity right away when the request asks for buffered responses.
    pub fn new(
        converters: Arc<EntityConverterManager>,
        request: Request,
        status: u16,
        headers: MultiValuedMap,
        mut entity: Option<Entity>,
    ) -> crate::Result<Self> {
        let status = StatusCode::from_u16(status).map_err(|_| Error::InvalidStatus { status })?;
        if request.is_buffer_response_entity()
            && let Some(entity) = entity.as_mut()
        {
            entity.buffer()?;
        }

        Ok(Self {
            status,
            headers,
            entity,
            request,
            converters,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn converters(&self) -> &Arc<EntityConverterManager> {
        &self.converters
    }

    pub fn headers(&self) -> &MultiValuedMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut MultiValuedMap {
        &mut self.headers
    }

    /// First value of the header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_first(name)
    }

    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers.get(name).unwrap_or_default()
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.entity.as_mut()
    }

    pub fn set_entity(&mut self, entity: Option<Entity>) {
        self.entity = entity;
    }

    pub fn take_entity(&mut self) -> Option<Entity> {
        self.entity.take()
    }

    /// Converts the body with the registered readers and closes the entity afterwards.
    ///
    /// Fails with [`Error::NullEntity`] when the response has no body.
    pub fn read<T: Any>(&mut self) -> crate::Result<T> {
        let Some(entity) = self.entity.as_mut() else {
            return Err(Error::NullEntity);
        };
        let value = self.converters.read::<T>(entity)?;
        entity.close();
        Ok(value)
    }

    /// Body bytes, empty when there is no entity.
    pub fn bytes(&mut self) -> crate::Result<Vec<u8>> {
        let Some(entity) = self.entity.as_mut() else {
            return Ok(Vec::new());
        };
        let mut collected = Vec::new();
        entity.input_stream().read_to_end(&mut collected)?;
        Ok(collected)
    }

    pub fn text(&mut self) -> crate::Result<String> {
        if !self.has_entity() {
            return Ok(String::new());
        }
        self.read::<String>()
    }

    pub fn json<T>(&mut self) -> crate::Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.bytes()?;
        serde_json::from_slice(&body).map_err(|source| Error::Deserialize {
            source,
            body: truncate_text(&body, MAX_ERROR_BODY_LEN),
        })
    }

    pub fn close(&mut self) {
        if let Some(entity) = self.entity.as_mut() {
            entity.close();
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Response")
            .field("status", &self.status)
            .field("uri", &self.request.uri())
            .field("headers", &self.headers)
            .field("entity", &self.entity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::Response;
    use crate::converter::EntityConverterManager;
    use crate::entity::Entity;
    use crate::error::Error;
    use crate::multi_map::MultiValuedMap;
    use crate::request::Request;

    fn response_with(body: &[u8], buffer: bool) -> Response {
        let mut request = Request::new("http://example.com/items").expect("valid uri");
        request.set_buffer_response_entity(buffer);
        let entity = Entity::with_metadata(
            Cursor::new(body.to_vec()),
            Some("text/plain"),
            Some("UTF-8"),
        )
        .expect("entity");
        Response::new(
            Arc::new(EntityConverterManager::with_builtins()),
            request,
            200,
            MultiValuedMap::new(),
            Some(entity),
        )
        .expect("response")
    }

    #[test]
    fn entity_is_buffered_when_request_asks_for_it() {
        let response = response_with(b"hello", true);
        assert!(response.entity().expect("entity").is_buffered());

        let response = response_with(b"hello", false);
        assert!(!response.entity().expect("entity").is_buffered());
    }

    #[test]
    fn read_converts_and_closes_entity() {
        let mut response = response_with(b"hello", false);
        let text: String = response.read().expect("read string");
        assert_eq!(text, "hello");
        assert!(response.entity().expect("entity").is_closed());
    }

    #[test]
    fn invalid_status_is_rejected() {
        let error = Response::new(
            Arc::new(EntityConverterManager::new()),
            Request::new("http://example.com").expect("valid uri"),
            1000,
            MultiValuedMap::new(),
            None,
        )
        .expect_err("status out of range");
        assert!(matches!(error, Error::InvalidStatus { status: 1000 }));
    }

    #[test]
    fn json_failure_carries_body() {
        let mut response = response_with(b"not json", true);
        let error = response
            .json::<serde_json::Value>()
            .expect_err("invalid json");
        match error {
            Error::Deserialize { body, .. } => assert_eq!(body, "not json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_entity_read_fails() {
        let mut response = Response::new(
            Arc::new(EntityConverterManager::with_builtins()),
            Request::new("http://example.com").expect("valid uri"),
            204,
            MultiValuedMap::new(),
            None,
        )
        .expect("response");
        assert!(matches!(
            response.read::<String>(),
            Err(Error::NullEntity)
        ));
        assert_eq!(response.text().expect("empty text"), "");
    }
}
