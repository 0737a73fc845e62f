use http::Method;
use thiserror::Error;

use crate::status::HttpStatusError;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidUri,
    NullEntity,
    EmptyEntity,
    EntityNotSupported,
    InvalidHeaderName,
    InvalidHeaderValue,
    InvalidStatus,
    UnsupportedConversion,
    SerializeJson,
    Deserialize,
    Io,
    RequestBuild,
    Transport,
    Timeout,
    HttpStatus,
    UnmatchedMock,
    Execution,
    ResponseMissing,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUri => "invalid_uri",
            Self::NullEntity => "null_entity",
            Self::EmptyEntity => "empty_entity",
            Self::EntityNotSupported => "entity_not_supported",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::InvalidStatus => "invalid_status",
            Self::UnsupportedConversion => "unsupported_conversion",
            Self::SerializeJson => "serialize_json",
            Self::Deserialize => "deserialize",
            Self::Io => "io",
            Self::RequestBuild => "request_build",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::HttpStatus => "http_status",
            Self::UnmatchedMock => "unmatched_mock",
            Self::Execution => "execution",
            Self::ResponseMissing => "response_missing",
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("entity stream is absent")]
    NullEntity,
    #[error("entity stream is empty")]
    EmptyEntity,
    #[error("http method {method} does not accept a request entity")]
    EntityNotSupported { method: Method },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("invalid http status code {status}")]
    InvalidStatus { status: u16 },
    #[error("no entity converter could convert type {type_name}")]
    UnsupportedConversion { type_name: &'static str },
    #[error("failed to serialize request json: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode response json: {source}; body={body}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("i/o error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to build http request: {source}")]
    RequestBuild {
        #[source]
        source: http::Error,
    },
    #[error("http transport error ({kind}) for {method} {uri}: {source}")]
    Transport {
        kind: TransportErrorKind,
        method: Method,
        uri: String,
        #[source]
        source: BoxError,
    },
    #[error("http request timed out for {method} {uri}")]
    Timeout { method: Method, uri: String },
    #[error(transparent)]
    HttpStatus(Box<HttpStatusError>),
    #[error("no request mock matches {method} {uri}")]
    UnmatchedMock { method: Method, uri: String },
    #[error("http request execution failed: {source}")]
    Execution {
        #[source]
        source: BoxError,
    },
    #[error("no response is available once the request completed")]
    ResponseMissing,
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUri { .. } => ErrorCode::InvalidUri,
            Self::NullEntity => ErrorCode::NullEntity,
            Self::EmptyEntity => ErrorCode::EmptyEntity,
            Self::EntityNotSupported { .. } => ErrorCode::EntityNotSupported,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::InvalidStatus { .. } => ErrorCode::InvalidStatus,
            Self::UnsupportedConversion { .. } => ErrorCode::UnsupportedConversion,
            Self::Serialize { .. } => ErrorCode::SerializeJson,
            Self::Deserialize { .. } => ErrorCode::Deserialize,
            Self::Io { .. } => ErrorCode::Io,
            Self::RequestBuild { .. } => ErrorCode::RequestBuild,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::HttpStatus(_) => ErrorCode::HttpStatus,
            Self::UnmatchedMock { .. } => ErrorCode::UnmatchedMock,
            Self::Execution { .. } => ErrorCode::Execution,
            Self::ResponseMissing => ErrorCode::ResponseMissing,
        }
    }

    /// Wraps a failure that has no dedicated variant.
    pub fn execution(source: impl Into<BoxError>) -> Self {
        Self::Execution {
            source: source.into(),
        }
    }

    pub fn http_status(&self) -> Option<&HttpStatusError> {
        match self {
            Self::HttpStatus(error) => Some(error),
            _ => None,
        }
    }
}

impl From<HttpStatusError> for Error {
    fn from(error: HttpStatusError) -> Self {
        Self::HttpStatus(Box::new(error))
    }
}
