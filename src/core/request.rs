use std::sync::Arc;
use std::time::Duration;

use percent_encoding::percent_decode_str;

use crate::error::Error;
use crate::filter::{FilterChain, HttpClientFilter};
use crate::multi_map::MultiValuedMap;

/// Method-independent description of a logical HTTP call.
///
/// The URI is kept as `scheme://host[:port]path`; its query string lives in
/// [`Request::query_parameters`]. Cloning copies headers, query parameters and the
/// filter list independently.
#[derive(Clone, Debug)]
pub struct Request {
    uri: String,
    accept: Option<String>,
    read_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    ssl_validated: bool,
    follow_redirects: bool,
    buffer_response_entity: bool,
    headers: MultiValuedMap,
    query_parameters: MultiValuedMap,
    filters: FilterChain,
}

fn parse_uri(uri: &str) -> crate::Result<(String, MultiValuedMap)> {
    let invalid = || Error::InvalidUri {
        uri: uri.to_owned(),
    };
    let parsed = url::Url::parse(uri.trim()).map_err(|_| invalid())?;
    let host = parsed.host_str().ok_or_else(invalid)?;

    // url drops the port when it is the scheme default
    let mut normalized = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }
    normalized.push_str(parsed.path());

    let query_parameters = parsed.query().map(parse_query).unwrap_or_default();

    Ok((normalized, query_parameters))
}

/// Splits on `&` and the first `=`. Only `%XX` escapes are decoded; `+` stays literal.
fn parse_query(query: &str) -> MultiValuedMap {
    let mut parameters = MultiValuedMap::new();
    for token in query.split('&').filter(|token| !token.is_empty()) {
        let (name, value) = token.split_once('=').unwrap_or((token, ""));
        parameters.add(
            percent_decode_str(name).decode_utf8_lossy(),
            percent_decode_str(value).decode_utf8_lossy(),
        );
    }
    parameters
}

impl Request {
    pub fn new(uri: impl AsRef<str>) -> crate::Result<Self> {
        let (uri, query_parameters) = parse_uri(uri.as_ref())?;
        Ok(Self {
            uri,
            accept: None,
            read_timeout: None,
            connect_timeout: None,
            ssl_validated: true,
            follow_redirects: true,
            buffer_response_entity: true,
            headers: MultiValuedMap::new(),
            query_parameters,
            filters: FilterChain::new(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Replaces the URI. Query parameters are reset to exactly those the new URI encodes.
    pub fn set_uri(&mut self, uri: impl AsRef<str>) -> crate::Result<&mut Self> {
        let (uri, query_parameters) = parse_uri(uri.as_ref())?;
        self.uri = uri;
        self.query_parameters = query_parameters;
        Ok(self)
    }

    /// URI with the query parameters encoded back in.
    pub fn full_uri(&self) -> String {
        if self.query_parameters.is_empty() {
            return self.uri.clone();
        }

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.query_parameters {
            if values.is_empty() {
                serializer.append_key_only(name);
            }
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        format!("{}?{}", self.uri, serializer.finish())
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn set_accept(&mut self, accept: impl Into<String>) -> &mut Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn clear_accept(&mut self) -> &mut Self {
        self.accept = None;
        self
    }

    /// `None` leaves the transport default in place.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn is_ssl_validated(&self) -> bool {
        self.ssl_validated
    }

    pub fn set_ssl_validated(&mut self, ssl_validated: bool) -> &mut Self {
        self.ssl_validated = ssl_validated;
        self
    }

    pub fn is_follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn set_follow_redirects(&mut self, follow_redirects: bool) -> &mut Self {
        self.follow_redirects = follow_redirects;
        self
    }

    pub fn is_buffer_response_entity(&self) -> bool {
        self.buffer_response_entity
    }

    pub fn set_buffer_response_entity(&mut self, buffer_response_entity: bool) -> &mut Self {
        self.buffer_response_entity = buffer_response_entity;
        self
    }

    pub fn headers(&self) -> &MultiValuedMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut MultiValuedMap {
        &mut self.headers
    }

    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.headers.add(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn add_headers(&mut self, headers: &MultiValuedMap) -> &mut Self {
        self.headers.merge(headers);
        self
    }

    pub fn set_headers(&mut self, headers: &MultiValuedMap) -> &mut Self {
        self.headers.replace_with(headers);
        self
    }

    pub fn query_parameters(&self) -> &MultiValuedMap {
        &self.query_parameters
    }

    pub fn query_parameters_mut(&mut self) -> &mut MultiValuedMap {
        &mut self.query_parameters
    }

    pub fn add_query_parameter(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.query_parameters.add(name, value);
        self
    }

    pub fn set_query_parameter(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.query_parameters.set(name, value);
        self
    }

    pub fn add_query_parameters(&mut self, parameters: &MultiValuedMap) -> &mut Self {
        self.query_parameters.merge(parameters);
        self
    }

    pub fn set_query_parameters(&mut self, parameters: &MultiValuedMap) -> &mut Self {
        self.query_parameters.replace_with(parameters);
        self
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    /// Attaches a filter that applies to calls made with this request only.
    pub fn add_filter<F>(&mut self, filter: F) -> &mut Self
    where
        F: HttpClientFilter + 'static,
    {
        self.filters.add(filter);
        self
    }

    pub fn add_shared_filter<F>(&mut self, filter: Arc<F>) -> &mut Self
    where
        F: HttpClientFilter + 'static,
    {
        self.filters.add_shared(filter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Request;
    use crate::error::Error;

    #[test]
    fn query_string_is_moved_into_parameters() {
        let request = Request::new("http://example.com/x?a=1&b=2&c").expect("valid uri");

        assert_eq!(request.uri(), "http://example.com/x");
        let parameters = request.query_parameters();
        assert_eq!(parameters.get("a"), Some(&["1".to_owned()][..]));
        assert_eq!(parameters.get("b"), Some(&["2".to_owned()][..]));
        assert_eq!(parameters.get("c"), Some(&["".to_owned()][..]));
        assert_eq!(parameters.len(), 3);
    }

    #[test]
    fn value_keeps_everything_after_first_equals() {
        let request = Request::new("http://example.com/?expr=a=b=c").expect("valid uri");
        assert_eq!(request.query_parameters().get_first("expr"), Some("a=b=c"));
    }

    #[test]
    fn plus_stays_literal_and_percent_escapes_decode() {
        let request =
            Request::new("http://example.com/x?q=a+b&e=1%2B1&s=a%20b&n%C3%A9=v").expect("valid uri");
        let parameters = request.query_parameters();
        assert_eq!(parameters.get_first("q"), Some("a+b"));
        assert_eq!(parameters.get_first("e"), Some("1+1"));
        assert_eq!(parameters.get_first("s"), Some("a b"));
        assert_eq!(parameters.get_first("né"), Some("v"));
    }

    #[test]
    fn default_ports_are_stripped() {
        let https = Request::new("https://example.com:443/x").expect("valid uri");
        assert_eq!(https.uri(), "https://example.com/x");

        let http = Request::new("http://example.com:80/x").expect("valid uri");
        assert_eq!(http.uri(), "http://example.com/x");

        let custom = Request::new("https://example.com:8443/x").expect("valid uri");
        assert_eq!(custom.uri(), "https://example.com:8443/x");
    }

    #[test]
    fn set_uri_resets_query_parameters() {
        let mut request = Request::new("http://example.com/x?a=1").expect("valid uri");
        request.add_query_parameter("extra", "2");

        request
            .set_uri("http://example.com/y?b=3")
            .expect("valid replacement");
        assert_eq!(request.uri(), "http://example.com/y");
        assert!(!request.query_parameters().contains_key("a"));
        assert!(!request.query_parameters().contains_key("extra"));
        assert_eq!(request.query_parameters().get_first("b"), Some("3"));
    }

    #[test]
    fn malformed_uri_is_rejected() {
        let error = Request::new("not a uri").expect_err("relative text must fail");
        match error {
            Error::InvalidUri { uri } => assert_eq!(uri, "not a uri"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(Request::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn clone_is_independent() {
        let mut original = Request::new("http://example.com/x?a=1").expect("valid uri");
        original.add_header("X-Id", "1");

        let mut copy = original.clone();
        copy.add_header("x-id", "2")
            .add_query_parameter("a", "9")
            .set_read_timeout(std::time::Duration::from_secs(1));

        assert_eq!(original.headers().get_flat("x-id").as_deref(), Some("1"));
        assert_eq!(original.query_parameters().get_flat("a").as_deref(), Some("1"));
        assert_eq!(original.read_timeout(), None);
        assert_eq!(copy.headers().get_flat("X-ID").as_deref(), Some("1,2"));
    }

    #[test]
    fn full_uri_encodes_parameters() {
        let mut request = Request::new("http://example.com/search").expect("valid uri");
        request
            .add_query_parameter("q", "a b&c")
            .add_query_parameter("page", "2");
        assert_eq!(
            request.full_uri(),
            "http://example.com/search?page=2&q=a+b%26c"
        );
    }

    #[test]
    fn defaults_follow_safe_policy() {
        let request = Request::new("https://example.com").expect("valid uri");
        assert!(request.is_ssl_validated());
        assert!(request.is_follow_redirects());
        assert!(request.is_buffer_response_entity());
        assert_eq!(request.accept(), None);
        assert!(request.filters().is_empty());
    }
}
