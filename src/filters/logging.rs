use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::{Level, debug, error, info, trace, warn};

use crate::context::Context;
use crate::filter::{FilterChain, HttpClientFilter, LifecycleFilter, OutputStreamFilter};
use crate::response::Response;
use crate::util::{lock_unpoisoned, truncate_text};

/// Longest body excerpt written to a transcript.
pub const MAX_ENTITY_LENGTH: usize = 10_000;

/// Where [`LoggingFilter`] delivers transcripts.
#[derive(Clone)]
pub enum LogSink {
    /// A `tracing` event at the given level, target `reqkit::transcript`.
    Tracing(Level),
    Custom(Arc<dyn Fn(&str) + Send + Sync>),
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tracing(level) => formatter.debug_tuple("Tracing").field(level).finish(),
            Self::Custom(_) => formatter.write_str("Custom"),
        }
    }
}

/// Body bytes captured from the current attempt.
#[derive(Clone, Default)]
struct CapturedBody(Arc<Mutex<Vec<u8>>>);

/// Request half of the transcript, written when the response arrives.
#[derive(Clone)]
struct PendingTranscript(String);

struct CapturingWriter<'a> {
    inner: Box<dyn Write + 'a>,
    captured: Arc<Mutex<Vec<u8>>>,
}

impl Write for CapturingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        let mut captured = lock_unpoisoned(&self.captured);
        let room = (MAX_ENTITY_LENGTH + 1).saturating_sub(captured.len());
        captured.extend_from_slice(&buf[..written.min(room)]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Renders a transcript of every attempt: method, URI, headers and body excerpts of
/// both the request and the response.
///
/// The response entity is peeked, not consumed.
#[derive(Clone, Debug)]
pub struct LoggingFilter {
    sink: LogSink,
}

impl Default for LoggingFilter {
    fn default() -> Self {
        Self::new(Level::TRACE)
    }
}

impl LoggingFilter {
    pub fn new(level: Level) -> Self {
        Self {
            sink: LogSink::Tracing(level),
        }
    }

    pub fn with_sink<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            sink: LogSink::Custom(Arc::new(sink)),
        }
    }

    fn write(&self, transcript: &str) {
        match &self.sink {
            LogSink::Custom(sink) => sink(transcript),
            LogSink::Tracing(level) => {
                let level = *level;
                if level == Level::ERROR {
                    error!(target: "reqkit::transcript", "{transcript}");
                } else if level == Level::WARN {
                    warn!(target: "reqkit::transcript", "{transcript}");
                } else if level == Level::INFO {
                    info!(target: "reqkit::transcript", "{transcript}");
                } else if level == Level::DEBUG {
                    debug!(target: "reqkit::transcript", "{transcript}");
                } else {
                    trace!(target: "reqkit::transcript", "{transcript}");
                }
            }
        }
    }
}

fn request_section(context: &Context) -> String {
    let mut out = String::from("Sending HTTP client request with the following data:\n");
    let Some(request) = context.request() else {
        return out;
    };
    let _ = writeln!(out, "> {} {}", context.method(), request.full_uri());
    if let Some(content_type) = context.entity_content_type() {
        let _ = writeln!(out, "> Content-Type: {content_type}");
    }
    for (name, values) in request.headers() {
        let _ = writeln!(out, "> {name}: {}", values.join(","));
    }
    out
}

fn response_section(out: &mut String, response: &mut Response) -> crate::Result<()> {
    out.push_str("Received HTTP server response with the following data:\n");
    let _ = writeln!(out, "< {}", response.status().as_u16());
    for (name, values) in response.headers() {
        let _ = writeln!(out, "< {name}: {}", values.join(","));
    }
    if let Some(entity) = response.entity_mut() {
        let excerpt = entity.preview(MAX_ENTITY_LENGTH + 1)?;
        if !excerpt.is_empty() {
            let _ = write!(out, "\n{}\n", truncate_text(&excerpt, MAX_ENTITY_LENGTH));
        }
    }
    Ok(())
}

impl LifecycleFilter for LoggingFilter {
    fn on_request(&self, context: &mut Context) -> crate::Result<()> {
        let transcript = request_section(context);
        let extensions = context.extensions_mut();
        extensions.remove::<CapturedBody>();
        extensions.insert(PendingTranscript(transcript));
        Ok(())
    }

    fn on_response(&self, context: &mut Context) -> crate::Result<()> {
        let mut transcript = context
            .extensions_mut()
            .remove::<PendingTranscript>()
            .map(|pending| pending.0)
            .unwrap_or_else(|| request_section(context));

        if let Some(CapturedBody(captured)) = context.extensions_mut().remove::<CapturedBody>() {
            let captured = lock_unpoisoned(&captured);
            if !captured.is_empty() {
                let _ = write!(
                    transcript,
                    "\n{}\n",
                    truncate_text(&captured, MAX_ENTITY_LENGTH)
                );
            }
        }
        transcript.push('\n');

        if let Some(response) = context.response_mut() {
            response_section(&mut transcript, response)?;
        }
        self.write(&transcript);
        Ok(())
    }
}

impl OutputStreamFilter for LoggingFilter {
    fn filter_output_stream<'a>(
        &self,
        context: &mut Context,
        output: Box<dyn Write + 'a>,
    ) -> Box<dyn Write + 'a> {
        let captured = CapturedBody::default();
        context.extensions_mut().insert(captured.clone());
        Box::new(CapturingWriter {
            inner: output,
            captured: captured.0,
        })
    }
}

impl HttpClientFilter for LoggingFilter {
    fn register(self: Arc<Self>, chain: &mut FilterChain) {
        chain.add_lifecycle_filter(self.clone());
        chain.add_output_stream_filter(self);
    }
}
