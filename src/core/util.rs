use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use http::header::{HeaderName, HeaderValue};

use crate::error::Error;

pub(crate) const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn redact_uri_for_logs(uri_text: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(uri_text) else {
        return uri_text.split('?').next().unwrap_or(uri_text).to_owned();
    };

    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string()
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, Error> {
    name.parse().map_err(|source| Error::InvalidHeaderName {
        name: name.to_owned(),
        source,
    })
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    value.parse().map_err(|source| Error::InvalidHeaderValue {
        name: name.to_owned(),
        source,
    })
}

/// Splits a `Content-Type` header into its media type and optional charset.
///
/// Values `mime` rejects keep everything before the first `;` as the media type.
pub(crate) fn split_content_type(raw: &str) -> (Option<String>, Option<String>) {
    match raw.trim().parse::<mime::Mime>() {
        Ok(parsed) => {
            let charset = parsed
                .get_param(mime::CHARSET)
                .map(|charset| charset.as_str().to_owned())
                .filter(|charset| !charset.is_empty());
            (Some(parsed.essence_str().to_owned()), charset)
        }
        Err(_) => {
            let media_type = raw
                .split(';')
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned);
            (media_type, None)
        }
    }
}

pub(crate) fn join_content_type(content_type: Option<&str>, charset: Option<&str>) -> String {
    let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
    match charset {
        Some(charset) => format!("{content_type}; charset={charset}"),
        None => content_type.to_owned(),
    }
}

pub(crate) fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let raw_value = value.trim();
    if let Ok(seconds) = raw_value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = httpdate::parse_http_date(raw_value).ok()?;
    match date.duration_since(now) {
        Ok(duration) => Some(duration),
        Err(_) => Some(Duration::ZERO),
    }
}

/// Milliseconds for log fields, saturating at `u64::MAX`.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn truncate_text(body: &[u8], max_len: usize) -> String {
    let text = String::from_utf8_lossy(&body[..body.len().min(max_len)]).into_owned();
    if body.len() > max_len {
        return format!("{text} ...more...");
    }
    text
}
