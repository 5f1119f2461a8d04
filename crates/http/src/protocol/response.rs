//! HTTP response header handling.
//!
//! Response heads are plain `http::Response<()>`; the body travels separately as
//! payload items.

use http::Response;

/// The header portion of an HTTP response, before the body is attached.
pub type ResponseHead = Response<()>;
