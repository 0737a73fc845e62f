use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;
use tracing::debug;

use crate::context::Context;
use crate::filter::{FilterChain, HttpClientFilter, RetryFilter};
use crate::util::{duration_millis, parse_retry_after};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Retries throttled responses (`429` and `503`) a bounded number of times.
///
/// Before voting for a retry the filter sleeps for the server's `Retry-After` hint, or
/// the default delay when the header is absent, never longer than the maximum delay.
#[derive(Clone, Debug)]
pub struct RetryAfterFilter {
    max_retries: u32,
    default_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryAfterFilter {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            default_delay: DEFAULT_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryAfterFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn default_delay(mut self, default_delay: Duration) -> Self {
        self.default_delay = default_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    fn delay_for(&self, context: &Context) -> Duration {
        context
            .response()
            .and_then(|response| response.header(RETRY_AFTER.as_str()))
            .and_then(|value| parse_retry_after(value, SystemTime::now()))
            .unwrap_or(self.default_delay)
            .min(self.max_delay)
    }
}

impl RetryFilter for RetryAfterFilter {
    fn is_retry_required(&self, context: &Context) -> bool {
        let throttled = context
            .response()
            .is_some_and(|response| matches!(response.status().as_u16(), 429 | 503));
        if !throttled || context.retries() >= self.max_retries {
            return false;
        }

        let delay = self.delay_for(context);
        debug!(
            retries = context.retries(),
            delay_ms = duration_millis(delay),
            "server throttled request, waiting before retry"
        );
        if !delay.is_zero() {
            sleep(delay);
        }
        true
    }
}

impl HttpClientFilter for RetryAfterFilter {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_retry_filter(self);
    }
}
