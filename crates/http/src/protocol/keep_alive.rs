//! Persistent connection rules.
//!
//! A connection stays open after an exchange unless one of the peers asked to close it.
//! HTTP/1.1 defaults to keep-alive, HTTP/1.0 defaults to close unless the request carries
//! `Connection: keep-alive`.

use std::time::Duration;

use http::header::{CONNECTION, HeaderName};
use http::{HeaderMap, Version};

/// The non-standard `Keep-Alive` header, e.g. `Keep-Alive: timeout=5, max=100`.
pub static KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Returns true if any `Connection` header lists `token` (case-insensitive).
pub fn connection_has_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}

/// Whether the sender of a message with these headers wants the connection closed
/// after the exchange.
pub fn wants_close(headers: &HeaderMap, version: Version) -> bool {
    if connection_has_token(headers, "close") {
        return true;
    }

    match version {
        Version::HTTP_11 => false,
        Version::HTTP_10 => !connection_has_token(headers, "keep-alive"),
        _ => true,
    }
}

/// Parameters of a `Keep-Alive` header, each one optional.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveParams {
    pub timeout: Option<Duration>,
    pub max: Option<usize>,
}

impl KeepAliveParams {
    /// Parses `timeout=<secs>` and `max=<n>`, unknown or malformed parameters are ignored.
    /// Returns `None` when the header is absent.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(&KEEP_ALIVE)?.to_str().ok()?;

        let mut params = KeepAliveParams::default();
        for param in value.split(',') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if key.eq_ignore_ascii_case("timeout") {
                params.timeout = value.parse::<u64>().ok().map(Duration::from_secs);
            } else if key.eq_ignore_ascii_case("max") {
                params.max = value.parse::<usize>().ok();
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        assert!(!wants_close(&HeaderMap::new(), Version::HTTP_11));
        assert!(wants_close(&headers(&[("connection", "Close")]), Version::HTTP_11));
        assert!(wants_close(&headers(&[("connection", "upgrade, close")]), Version::HTTP_11));
    }

    #[test]
    fn http10_needs_explicit_keep_alive() {
        assert!(wants_close(&HeaderMap::new(), Version::HTTP_10));
        assert!(!wants_close(&headers(&[("connection", "Keep-Alive")]), Version::HTTP_10));
    }

    #[test]
    fn parse_keep_alive_params() {
        let params = KeepAliveParams::from_headers(&headers(&[("keep-alive", "timeout=2, max=10")])).unwrap();
        assert_eq!(params.timeout, Some(Duration::from_secs(2)));
        assert_eq!(params.max, Some(10));

        let params = KeepAliveParams::from_headers(&headers(&[("keep-alive", "max=abc, foo")])).unwrap();
        assert_eq!(params, KeepAliveParams::default());

        assert!(KeepAliveParams::from_headers(&HeaderMap::new()).is_none());
    }
}
