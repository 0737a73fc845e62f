use std::any::Any;

use http::Method;
use serde::Serialize;
use tracing::{debug, info_span};

use crate::context::Context;
use crate::entity::Entity;
use crate::error::Error;
use crate::filter::FilterProcessor;
use crate::request::Request;
use crate::response::Response;
use crate::util::redact_uri_for_logs;

use super::HttpClient;

impl HttpClient {
    /// Runs one logical call, repeating attempts for as long as a retry filter asks.
    ///
    /// When the call carries an entity and any retry filter is registered, the entity is
    /// buffered up front so every attempt sends the same bytes. Without retry filters the
    /// entity is streamed once, as given.
    ///
    /// The engine enforces no attempt limit: a retry filter that never stops voting for a
    /// retry keeps the call looping. Responses of retried attempts are closed before the
    /// next attempt starts.
    pub fn execute(
        &self,
        method: Method,
        request: &Request,
        entity: Option<Entity>,
    ) -> crate::Result<Response> {
        let span = info_span!(
            "reqkit.request",
            method = %method,
            uri = %redact_uri_for_logs(&request.full_uri()),
        );
        let _entered = span.enter();

        let filters = FilterProcessor::new(&self.filters, request.filters());
        let mut context = Context::new(method, self.converters.clone());
        context.set_entity_content_type(entity.as_ref().map(Entity::full_content_type));
        filters.on_start(&mut context)?;

        let (mut pending, original) = match entity {
            Some(mut entity) if filters.has_retry_filters() => {
                entity.buffer()?;
                (None, Some(entity))
            }
            entity => (entity, None),
        };

        loop {
            let attempt_entity = match &original {
                Some(original) => original.replay(),
                None => pending.take(),
            };

            context.take_response();
            context.set_request(request.clone());
            if let Some(attempt_request) = context.request_mut() {
                filters.filter_request(attempt_request)?;
            }
            filters.on_request(&mut context)?;

            debug!(
                attempt = context.retries() + 1,
                has_entity = attempt_entity.is_some(),
                "dispatching attempt"
            );
            let mut response = self
                .transport
                .execute(&mut context, attempt_entity, &filters)?;
            filters.filter_response(&mut response)?;
            context.set_response(response);
            filters.on_response(&mut context)?;

            if !filters.is_retry_required(&context) {
                filters.on_complete(&mut context)?;
                return context.take_response().ok_or(Error::ResponseMissing);
            }

            context.increment_retries();
            if let Some(mut discarded) = context.take_response() {
                debug!(
                    status = discarded.status().as_u16(),
                    retries = context.retries(),
                    "retrying, discarding response"
                );
                discarded.close();
            }
        }
    }

    /// Converts `value` with the registered writers and sends it as the entity.
    pub fn execute_object<T: Any>(
        &self,
        method: Method,
        request: &Request,
        value: &T,
    ) -> crate::Result<Response> {
        let entity = self.converters.write(value, None, None)?;
        self.execute(method, request, Some(entity))
    }

    /// Serializes `value` with `serde_json` and sends it as `application/json`.
    pub fn execute_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        request: &Request,
        value: &T,
    ) -> crate::Result<Response> {
        let body = serde_json::to_vec(value).map_err(|source| Error::Serialize { source })?;
        let entity = Entity::from_bytes(body, Some("application/json"), Some("UTF-8"))?;
        self.execute(method, request, Some(entity))
    }

    pub fn get(&self, request: &Request) -> crate::Result<Response> {
        self.execute(Method::GET, request, None)
    }

    pub fn head(&self, request: &Request) -> crate::Result<Response> {
        self.execute(Method::HEAD, request, None)
    }

    pub fn delete(&self, request: &Request) -> crate::Result<Response> {
        self.execute(Method::DELETE, request, None)
    }

    pub fn trace(&self, request: &Request) -> crate::Result<Response> {
        self.execute(Method::TRACE, request, None)
    }

    pub fn options(&self, request: &Request) -> crate::Result<Response> {
        self.execute(Method::OPTIONS, request, None)
    }

    pub fn post(&self, request: &Request, entity: Option<Entity>) -> crate::Result<Response> {
        self.execute(Method::POST, request, entity)
    }

    pub fn put(&self, request: &Request, entity: Option<Entity>) -> crate::Result<Response> {
        self.execute(Method::PUT, request, entity)
    }

    pub fn patch(&self, request: &Request, entity: Option<Entity>) -> crate::Result<Response> {
        self.execute(Method::PATCH, request, entity)
    }
}
