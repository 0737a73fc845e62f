use std::sync::Arc;
#[cfg(feature = "transport-ureq")]
use std::time::Duration;

use crate::converter::{EntityConverterManager, EntityReader, EntityWriter};
#[cfg(not(feature = "transport-ureq"))]
use crate::error::Error;
use crate::filter::{FilterChain, HttpClientFilter};
use crate::transport::Transport;

#[cfg(feature = "transport-ureq")]
use crate::transport::UreqTransportBuilder;

use super::HttpClient;

/// Consuming builder for [`HttpClient`].
///
/// Agent settings only apply to the bundled ureq transport; they are ignored once a
/// custom transport is supplied.
pub struct HttpClientBuilder {
    converters: EntityConverterManager,
    filters: FilterChain,
    transport: Option<Arc<dyn Transport>>,
    #[cfg(feature = "transport-ureq")]
    ureq: UreqTransportBuilder,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            converters: EntityConverterManager::with_builtins(),
            filters: FilterChain::new(),
            transport: None,
            #[cfg(feature = "transport-ureq")]
            ureq: UreqTransportBuilder::default(),
        }
    }

    /// Replaces the whole converter registry, built-ins included.
    pub fn converters(mut self, converters: EntityConverterManager) -> Self {
        self.converters = converters;
        self
    }

    pub fn add_converter<C>(mut self, converter: C) -> Self
    where
        C: EntityReader + EntityWriter + 'static,
    {
        self.converters.add_converter(converter);
        self
    }

    pub fn add_writer(mut self, writer: Arc<dyn EntityWriter>) -> Self {
        self.converters.add_writer(writer);
        self
    }

    pub fn add_reader(mut self, reader: Arc<dyn EntityReader>) -> Self {
        self.converters.add_reader(reader);
        self
    }

    pub fn add_filter<F>(mut self, filter: F) -> Self
    where
        F: HttpClientFilter + 'static,
    {
        self.filters.add(filter);
        self
    }

    pub fn add_shared_filter<F>(mut self, filter: Arc<F>) -> Self
    where
        F: HttpClientFilter + 'static,
    {
        self.filters.add_shared(filter);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.ureq = self.ureq.client_name(client_name);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.ureq = self.ureq.connect_timeout(connect_timeout);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.ureq = self.ureq.read_timeout(read_timeout);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.ureq = self.ureq.max_redirects(max_redirects);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn pool_idle_timeout(mut self, pool_idle_timeout: Duration) -> Self {
        self.ureq = self.ureq.pool_idle_timeout(pool_idle_timeout);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn pool_max_idle_per_host(mut self, pool_max_idle_per_host: usize) -> Self {
        self.ureq = self.ureq.pool_max_idle_per_host(pool_max_idle_per_host);
        self
    }

    #[cfg(feature = "transport-ureq")]
    pub fn pool_max_idle_connections(mut self, pool_max_idle_connections: usize) -> Self {
        self.ureq = self.ureq.pool_max_idle_connections(pool_max_idle_connections);
        self
    }

    /// Builds the client, falling back to the ureq transport when none was supplied.
    pub fn try_build(self) -> crate::Result<HttpClient> {
        let Self {
            converters,
            filters,
            transport,
            #[cfg(feature = "transport-ureq")]
            ureq,
        } = self;
        let transport = match transport {
            Some(transport) => transport,
            #[cfg(feature = "transport-ureq")]
            None => default_transport(ureq),
            #[cfg(not(feature = "transport-ureq"))]
            None => default_transport()?,
        };
        Ok(HttpClient {
            converters: Arc::new(converters),
            filters,
            transport,
        })
    }
}

#[cfg(feature = "transport-ureq")]
fn default_transport(ureq: UreqTransportBuilder) -> Arc<dyn Transport> {
    Arc::new(ureq.build())
}

#[cfg(not(feature = "transport-ureq"))]
fn default_transport() -> crate::Result<Arc<dyn Transport>> {
    Err(Error::execution(
        "no transport configured and the `transport-ureq` feature is disabled",
    ))
}
