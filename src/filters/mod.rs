//! Filters shipped with the crate.

mod auth;
mod gzip;
mod logging;
mod retry_after;
mod status_error;

pub use self::auth::{AuthToken, BasicAuthFilter, TokenAuthFilter, TokenAuthenticator};
pub use self::gzip::GzipFilter;
pub use self::logging::{LogSink, LoggingFilter, MAX_ENTITY_LENGTH};
pub use self::retry_after::RetryAfterFilter;
pub use self::status_error::HttpStatusErrorFilter;
