use std::sync::Arc;

use crate::converter::EntityConverterManager;
use crate::filter::FilterChain;
use crate::transport::Transport;

mod builder;
mod execute;

pub use builder::HttpClientBuilder;

/// Runs logical calls through the filter pipeline and a [`Transport`].
///
/// Cheap to clone; clones share converters, filters and transport. Registrations are
/// fixed once the client is built, so concurrent calls only ever read them.
#[derive(Clone)]
pub struct HttpClient {
    converters: Arc<EntityConverterManager>,
    filters: FilterChain,
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub fn converters(&self) -> &EntityConverterManager {
        &self.converters
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpClient")
            .field("converters", &self.converters)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}
