use std::io::Write;
use std::sync::Arc;

use crate::context::Context;
use crate::request::Request;
use crate::response::Response;

/// Mutates the per-attempt request before it is dispatched.
pub trait RequestFilter: Send + Sync {
    fn filter_request(&self, request: &mut Request) -> crate::Result<()>;
}

/// Mutates each attempt's response before lifecycle hooks and retry decisions see it.
pub trait ResponseFilter: Send + Sync {
    fn filter_response(&self, response: &mut Response) -> crate::Result<()>;
}

/// Wraps the outgoing request body writer, e.g. for compression or capture.
pub trait OutputStreamFilter: Send + Sync {
    fn filter_output_stream<'a>(
        &self,
        context: &mut Context,
        output: Box<dyn Write + 'a>,
    ) -> Box<dyn Write + 'a>;
}

/// Hooks around the lifecycle of one logical call.
///
/// `on_start` and `on_complete` run once per call, `on_request` and `on_response`
/// once per attempt.
pub trait LifecycleFilter: Send + Sync {
    fn on_start(&self, _context: &mut Context) -> crate::Result<()> {
        Ok(())
    }

    fn on_request(&self, _context: &mut Context) -> crate::Result<()> {
        Ok(())
    }

    fn on_response(&self, _context: &mut Context) -> crate::Result<()> {
        Ok(())
    }

    fn on_complete(&self, _context: &mut Context) -> crate::Result<()> {
        Ok(())
    }
}

/// Votes on whether a completed attempt should be repeated.
pub trait RetryFilter: Send + Sync {
    fn is_retry_required(&self, context: &Context) -> bool;
}

/// A filter that can be attached to a client or a request.
///
/// Implementations push themselves into every capability slot they serve:
///
/// ```
/// use std::sync::Arc;
/// use reqkit::{FilterChain, HttpClientFilter, Request, RequestFilter};
///
/// struct Tracer;
///
/// impl RequestFilter for Tracer {
///     fn filter_request(&self, request: &mut Request) -> reqkit::Result<()> {
///         request.set_header("x-trace", "on");
///         Ok(())
///     }
/// }
///
/// impl HttpClientFilter for Tracer {
///     fn register(self: Arc<Self>, chain: &mut FilterChain) {
///         chain.add_request_filter(self);
///     }
/// }
/// ```
pub trait HttpClientFilter: Send + Sync {
    fn register(self: Arc<Self>, chain: &mut FilterChain);
}

/// Filters grouped by capability, each slot in registration order.
#[derive(Clone, Default)]
pub struct FilterChain {
    request_filters: Vec<Arc<dyn RequestFilter>>,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    output_stream_filters: Vec<Arc<dyn OutputStreamFilter>>,
    lifecycle_filters: Vec<Arc<dyn LifecycleFilter>>,
    retry_filters: Vec<Arc<dyn RetryFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, filter: F) -> &mut Self
    where
        F: HttpClientFilter + 'static,
    {
        self.add_shared(Arc::new(filter))
    }

    /// Registers a filter whose state the caller keeps a handle to.
    pub fn add_shared<F>(&mut self, filter: Arc<F>) -> &mut Self
    where
        F: HttpClientFilter + 'static,
    {
        filter.register(self);
        self
    }

    pub fn add_request_filter(&mut self, filter: Arc<dyn RequestFilter>) -> &mut Self {
        self.request_filters.push(filter);
        self
    }

    pub fn add_response_filter(&mut self, filter: Arc<dyn ResponseFilter>) -> &mut Self {
        self.response_filters.push(filter);
        self
    }

    pub fn add_output_stream_filter(&mut self, filter: Arc<dyn OutputStreamFilter>) -> &mut Self {
        self.output_stream_filters.push(filter);
        self
    }

    pub fn add_lifecycle_filter(&mut self, filter: Arc<dyn LifecycleFilter>) -> &mut Self {
        self.lifecycle_filters.push(filter);
        self
    }

    pub fn add_retry_filter(&mut self, filter: Arc<dyn RetryFilter>) -> &mut Self {
        self.retry_filters.push(filter);
        self
    }

    /// Appends every slot of `other` after this chain's own entries.
    pub fn extend_from(&mut self, other: &FilterChain) -> &mut Self {
        self.request_filters
            .extend(other.request_filters.iter().cloned());
        self.response_filters
            .extend(other.response_filters.iter().cloned());
        self.output_stream_filters
            .extend(other.output_stream_filters.iter().cloned());
        self.lifecycle_filters
            .extend(other.lifecycle_filters.iter().cloned());
        self.retry_filters
            .extend(other.retry_filters.iter().cloned());
        self
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.request_filters.is_empty()
            && self.response_filters.is_empty()
            && self.output_stream_filters.is_empty()
            && self.lifecycle_filters.is_empty()
            && self.retry_filters.is_empty()
    }

    pub fn has_retry_filters(&self) -> bool {
        !self.retry_filters.is_empty()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FilterChain")
            .field("request_filters", &self.request_filters.len())
            .field("response_filters", &self.response_filters.len())
            .field("output_stream_filters", &self.output_stream_filters.len())
            .field("lifecycle_filters", &self.lifecycle_filters.len())
            .field("retry_filters", &self.retry_filters.len())
            .finish()
    }
}

/// Dispatches each capability to every registered filter: the client's filters
/// first, then the request's, each group in registration order.
#[derive(Debug)]
pub struct FilterProcessor {
    chain: FilterChain,
}

impl FilterProcessor {
    pub fn new(client_filters: &FilterChain, request_filters: &FilterChain) -> Self {
        let mut chain = client_filters.clone();
        chain.extend_from(request_filters);
        Self { chain }
    }

    pub fn filter_request(&self, request: &mut Request) -> crate::Result<()> {
        for filter in &self.chain.request_filters {
            filter.filter_request(request)?;
        }
        Ok(())
    }

    pub fn filter_response(&self, response: &mut Response) -> crate::Result<()> {
        for filter in &self.chain.response_filters {
            filter.filter_response(response)?;
        }
        Ok(())
    }

    /// Each filter wraps the writer produced by the previous one.
    pub fn filter_output_stream<'a>(
        &self,
        context: &mut Context,
        output: Box<dyn Write + 'a>,
    ) -> Box<dyn Write + 'a> {
        self.chain
            .output_stream_filters
            .iter()
            .fold(output, |output, filter| {
                filter.filter_output_stream(context, output)
            })
    }

    pub fn on_start(&self, context: &mut Context) -> crate::Result<()> {
        for filter in &self.chain.lifecycle_filters {
            filter.on_start(context)?;
        }
        Ok(())
    }

    pub fn on_request(&self, context: &mut Context) -> crate::Result<()> {
        for filter in &self.chain.lifecycle_filters {
            filter.on_request(context)?;
        }
        Ok(())
    }

    pub fn on_response(&self, context: &mut Context) -> crate::Result<()> {
        for filter in &self.chain.lifecycle_filters {
            filter.on_response(context)?;
        }
        Ok(())
    }

    pub fn on_complete(&self, context: &mut Context) -> crate::Result<()> {
        for filter in &self.chain.lifecycle_filters {
            filter.on_complete(context)?;
        }
        Ok(())
    }

    /// Every retry filter is consulted, even after one has already voted to retry.
    pub fn is_retry_required(&self, context: &Context) -> bool {
        self.chain
            .retry_filters
            .iter()
            .fold(false, |retry, filter| {
                filter.is_retry_required(context) || retry
            })
    }

    pub fn has_retry_filters(&self) -> bool {
        self.chain.has_retry_filters()
    }
}
