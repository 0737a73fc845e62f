use std::sync::Arc;

use http::{Extensions, Method};

use crate::converter::EntityConverterManager;
use crate::request::Request;
use crate::response::Response;

/// State of one logical call, shared by every attempt and visible to filters.
#[derive(Debug)]
pub struct Context {
    method: Method,
    request: Option<Request>,
    response: Option<Response>,
    entity_content_type: Option<String>,
    retries: u32,
    extensions: Extensions,
    converters: Arc<EntityConverterManager>,
}

impl Context {
    pub fn new(method: Method, converters: Arc<EntityConverterManager>) -> Self {
        Self {
            method,
            request: None,
            response: None,
            entity_content_type: None,
            retries: 0,
            extensions: Extensions::new(),
            converters,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The current attempt's request, absent before the first attempt starts.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    pub(crate) fn set_request(&mut self, request: Request) {
        self.request = Some(request);
    }

    /// The current attempt's response, absent until the transport has produced one.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    pub(crate) fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub(crate) fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Full content type of the request entity, when the call carries one.
    pub fn entity_content_type(&self) -> Option<&str> {
        self.entity_content_type.as_deref()
    }

    pub(crate) fn set_entity_content_type(&mut self, content_type: Option<String>) {
        self.entity_content_type = content_type;
    }

    /// Number of retries performed so far; zero during the first attempt.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub(crate) fn increment_retries(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    /// Converters of the client running the call, used to build responses.
    pub fn converters(&self) -> &Arc<EntityConverterManager> {
        &self.converters
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
