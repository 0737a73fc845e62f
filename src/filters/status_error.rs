use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::filter::{FilterChain, HttpClientFilter, LifecycleFilter};
use crate::status::HttpStatusError;

/// Fails the call with [`Error::HttpStatus`] when the final response status is 300 or
/// above. Retried attempts are not affected.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpStatusErrorFilter;

impl LifecycleFilter for HttpStatusErrorFilter {
    fn on_complete(&self, context: &mut Context) -> crate::Result<()> {
        let failed = context
            .response()
            .is_some_and(|response| response.status().as_u16() >= 300);
        if !failed {
            return Ok(());
        }

        let Some(response) = context.take_response() else {
            return Ok(());
        };
        match HttpStatusError::from_response(response) {
            Ok(error) => {
                debug!(status = error.status().as_u16(), "response status signals failure");
                Err(Error::from(error))
            }
            Err(response) => {
                context.set_response(response);
                Ok(())
            }
        }
    }
}

impl HttpClientFilter for HttpStatusErrorFilter {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_lifecycle_filter(self);
    }
}
