//! Trailer fields of chunked messages.

use http::HeaderMap;
use http::header::{CONTENT_LENGTH, HeaderName, TRAILER, TRANSFER_ENCODING};

use crate::ensure;
use crate::protocol::ParseError;

/// Field names that must never appear as trailers.
pub fn is_prohibited_trailer(name: &HeaderName) -> bool {
    name == TRANSFER_ENCODING || name == CONTENT_LENGTH || name == TRAILER
}

/// Collects the field names announced by the `Trailer` header.
///
/// Fails if a prohibited or syntactically invalid name is announced.
pub fn declared_trailers(headers: &HeaderMap) -> Result<Vec<HeaderName>, ParseError> {
    let mut declared = Vec::new();
    for value in headers.get_all(TRAILER) {
        let value = value.to_str().map_err(|e| ParseError::invalid_trailer(format!("trailer header is not visible ascii: {e}")))?;
        for name in value.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ParseError::invalid_trailer(format!("invalid trailer name {name:?}: {e}")))?;
            ensure!(!is_prohibited_trailer(&name), ParseError::invalid_trailer(format!("{name} is not allowed as a trailer")));
            declared.push(name);
        }
    }
    Ok(declared)
}

/// Merges trailer fields into `headers` and removes the `Trailer` declaration.
pub fn merge_trailers(headers: &mut HeaderMap, trailers: HeaderMap) {
    headers.remove(TRAILER);

    let mut last_name = None;
    for (name, value) in trailers {
        // `HeaderMap::into_iter` yields the name only for the first value of each field
        if let Some(name) = name {
            last_name = Some(name);
        }
        if let Some(name) = &last_name {
            headers.append(name.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn declared_names_are_collected() {
        let mut headers = HeaderMap::new();
        headers.append(TRAILER, HeaderValue::from_static("Expires, X-Checksum"));
        headers.append(TRAILER, HeaderValue::from_static("x-count"));

        let declared = declared_trailers(&headers).unwrap();
        assert_eq!(declared, vec!["expires", "x-checksum", "x-count"]);
    }

    #[test]
    fn prohibited_declaration_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(TRAILER, HeaderValue::from_static("Content-Length"));

        assert!(matches!(declared_trailers(&headers), Err(ParseError::InvalidTrailer { .. })));
    }

    #[test]
    fn merge_removes_declaration() {
        let mut headers = HeaderMap::new();
        headers.insert(TRAILER, HeaderValue::from_static("x-checksum"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let mut trailers = HeaderMap::new();
        trailers.append("x-checksum", HeaderValue::from_static("a1"));
        trailers.append("x-checksum", HeaderValue::from_static("b2"));

        merge_trailers(&mut headers, trailers);

        assert!(headers.get(TRAILER).is_none());
        let values: Vec<_> = headers.get_all("x-checksum").iter().collect();
        assert_eq!(values, vec!["a1", "b2"]);
        assert_eq!(headers["content-type"], "text/plain");
    }
}
