use std::io::Write;
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::CONTENT_ENCODING;

use crate::context::Context;
use crate::filter::{FilterChain, HttpClientFilter, OutputStreamFilter, RequestFilter};
use crate::request::Request;

/// Compresses request bodies with gzip and labels them with `Content-Encoding`.
#[derive(Clone, Copy, Debug)]
pub struct GzipFilter {
    level: Compression,
}

impl GzipFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipFilter {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl RequestFilter for GzipFilter {
    fn filter_request(&self, request: &mut Request) -> crate::Result<()> {
        request.set_header(CONTENT_ENCODING.as_str(), "gzip");
        Ok(())
    }
}

impl OutputStreamFilter for GzipFilter {
    fn filter_output_stream<'a>(
        &self,
        _context: &mut Context,
        output: Box<dyn Write + 'a>,
    ) -> Box<dyn Write + 'a> {
        // the gzip trailer is written when the encoder is dropped
        Box::new(GzEncoder::new(output, self.level))
    }
}

impl HttpClientFilter for GzipFilter {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_request_filter(self.clone());
        chain.add_output_stream_filter(self);
    }
}
