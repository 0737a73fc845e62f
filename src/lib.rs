//! `reqkit` is a blocking HTTP client core built around a filter pipeline and pluggable
//! entity converters.
//!
//! A logical call is described by a [`Request`], runs through the client's and the
//! request's filters, and is dispatched by a [`transport::Transport`]. Retry filters
//! may repeat attempts; request bodies are buffered up front whenever one is registered
//! so each attempt sends identical bytes.
//!
//! # Quick Start
//!
//! ```no_run
//! use reqkit::filters::{HttpStatusErrorFilter, LoggingFilter};
//! use reqkit::prelude::{HttpClient, Request};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::builder()
//!         .client_name("my-sdk")
//!         .add_filter(LoggingFilter::default())
//!         .add_filter(HttpStatusErrorFilter)
//!         .try_build()?;
//!
//!     let mut request = Request::new("https://api.example.com/v1/items?limit=10")?;
//!     request.set_accept("application/json");
//!
//!     let mut response = client.get(&request)?;
//!     let items: serde_json::Value = response.json()?;
//!     println!("items={items}");
//!     Ok(())
//! }
//! ```
//!
//! # Converters
//!
//! [`Response::read`] and [`HttpClient::execute_object`] go through the client's
//! [`EntityConverterManager`]. The first registered converter that supports the type,
//! highest [`Priority`] first, wins.

mod client;
pub mod converters;
mod core;
pub mod filters;
pub mod transport;

pub(crate) use self::core::{
    context, converter, entity, error, filter, multi_map, request, response, status, util,
};

pub use crate::client::{HttpClient, HttpClientBuilder};
pub use crate::context::Context;
pub use crate::converter::{
    ConversionError, ConversionResult, EntityConverterManager, EntityReader, EntityWriter,
    Priority,
};
pub use crate::entity::Entity;
pub use crate::error::{Error, ErrorCode, TransportErrorKind};
pub use crate::filter::{
    FilterChain, FilterProcessor, HttpClientFilter, LifecycleFilter, OutputStreamFilter,
    RequestFilter, ResponseFilter, RetryFilter,
};
pub use crate::multi_map::{Iter as MultiValuedMapIter, MultiValuedMap};
pub use crate::request::Request;
pub use crate::response::Response;
pub use crate::status::{HttpStatusError, StatusKind};

pub use http::Method;

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Context, Entity, EntityConverterManager, Error, ErrorCode, FilterChain, HttpClient,
        HttpClientBuilder, HttpClientFilter, HttpStatusError, LifecycleFilter, Method,
        MultiValuedMap, Request, RequestFilter, Response, ResponseFilter, Result, RetryFilter,
        StatusKind,
    };
}
