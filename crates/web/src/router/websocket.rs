//! WebSocket opening handshake for routes that declare an upgrade handler.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::BoxFuture;
use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Version};
use sha1::{Digest, Sha1};
use tracing::debug;
use wick_http::connection::{OnUpgrade, Upgraded};

use crate::body::ResponseBody;
use crate::request::ServerRequest;

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub(crate) type UpgradeHandler = Arc<dyn Fn(Upgraded) -> BoxFuture<'static, ()> + Send + Sync>;

/// The value of `Sec-WebSocket-Accept` answering a `Sec-WebSocket-Key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsocketAccept(String);

impl WebsocketAccept {
    pub fn from_key(key: &[u8]) -> Self {
        let mut sha1 = Sha1::new();
        sha1.update(key.trim_ascii());
        sha1.update(GUID.as_bytes());
        WebsocketAccept(STANDARD.encode(sha1.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WebsocketAccept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_token(headers: &HeaderMap, name: http::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Checks whether `req` opens a WebSocket and returns the accept value for it.
///
/// `None` when the request is not a version 13 upgrade request.
pub(crate) fn handshake(req: &ServerRequest) -> Option<WebsocketAccept> {
    if req.method() != Method::GET || req.version() != Version::HTTP_11 {
        return None;
    }

    let headers = req.headers();
    if !has_token(headers, CONNECTION, "upgrade") || !has_token(headers, UPGRADE, "websocket") {
        return None;
    }

    if headers.get(SEC_WEBSOCKET_VERSION).map(|v| v.as_bytes().trim_ascii()) != Some(&b"13"[..]) {
        debug!(version = ?headers.get(SEC_WEBSOCKET_VERSION), "unsupported websocket version");
        return None;
    }

    let mut keys = headers.get_all(SEC_WEBSOCKET_KEY).iter();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Some(WebsocketAccept::from_key(key.as_bytes())),
        (Some(_), Some(_)) => {
            debug!("duplicate Sec-WebSocket-Key");
            None
        }
        (None, _) => {
            debug!("no Sec-WebSocket-Key in upgrade request");
            None
        }
    }
}

/// The `101 Switching Protocols` response that hands the connection to `handler`.
pub(crate) fn switching_protocols(accept: &WebsocketAccept, handler: &UpgradeHandler) -> Response<ResponseBody> {
    let handler = Arc::clone(handler);

    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;

    let headers = response.headers_mut();
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
    if let Ok(value) = HeaderValue::from_str(accept.as_str()) {
        headers.insert(SEC_WEBSOCKET_ACCEPT, value);
    }

    response.extensions_mut().insert(OnUpgrade::new(move |upgraded| handler(upgraded)));
    response
}
