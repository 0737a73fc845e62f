use http::StatusCode;

use crate::response::Response;

macro_rules! status_kinds {
    ($($variant:ident => $code:literal,)+) => {
        /// Named failure kind for a response status of 300 or above.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum StatusKind {
            $($variant,)+
            /// Any status without a dedicated kind.
            Other(u16),
        }

        impl StatusKind {
            pub const fn from_code(code: u16) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Other(other),
                }
            }

            pub const fn code(self) -> u16 {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Other(code) => code,
                }
            }
        }
    };
}

status_kinds! {
    MultipleChoices => 300,
    MovedPermanently => 301,
    Found => 302,
    SeeOther => 303,
    NotModified => 304,
    UseProxy => 305,
    TemporaryRedirect => 307,
    BadRequest => 400,
    Unauthorized => 401,
    PaymentRequired => 402,
    Forbidden => 403,
    NotFound => 404,
    MethodNotAllowed => 405,
    NotAcceptable => 406,
    ProxyAuthenticationRequired => 407,
    RequestTimeout => 408,
    Conflict => 409,
    Gone => 410,
    LengthRequired => 411,
    PreconditionFailed => 412,
    PayloadTooLarge => 413,
    UriTooLong => 414,
    UnsupportedMediaType => 415,
    RangeNotSatisfiable => 416,
    ExpectationFailed => 417,
    UnprocessableEntity => 422,
    InternalServerError => 500,
    NotImplemented => 501,
    BadGateway => 502,
    ServiceUnavailable => 503,
    GatewayTimeout => 504,
    HttpVersionNotSupported => 505,
}

impl StatusKind {
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(self) -> bool {
        self.code() >= 500
    }
}

/// A completed response whose status signals failure, kept whole for inspection.
#[derive(Debug, thiserror::Error)]
#[error(
    "http status error {} ({kind:?}) for {}",
    .response.status().as_u16(),
    .response.request().uri()
)]
pub struct HttpStatusError {
    kind: StatusKind,
    response: Response,
}

impl HttpStatusError {
    /// Hands the response back when its status is below 300.
    pub fn from_response(response: Response) -> Result<Self, Response> {
        if response.status().as_u16() < 300 {
            return Err(response);
        }
        Ok(Self {
            kind: StatusKind::from_code(response.status().as_u16()),
            response,
        })
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::StatusKind;

    #[test]
    fn known_codes_map_to_dedicated_kinds() {
        assert_eq!(StatusKind::from_code(404), StatusKind::NotFound);
        assert_eq!(StatusKind::from_code(307), StatusKind::TemporaryRedirect);
        assert_eq!(StatusKind::from_code(422), StatusKind::UnprocessableEntity);
        assert_eq!(StatusKind::from_code(505).code(), 505);
    }

    #[test]
    fn unknown_codes_fall_back_to_other() {
        assert_eq!(StatusKind::from_code(418), StatusKind::Other(418));
        assert_eq!(StatusKind::from_code(306), StatusKind::Other(306));
        assert!(StatusKind::from_code(418).is_client_error());
        assert!(StatusKind::from_code(599).is_server_error());
    }
}
