//! The application side of [`HttpConnection`](crate::connection::HttpConnection).
//!
//! Requests of one connection reach the handler strictly in order, the next one is read
//! only after the previous response went out. [`service_fn`] adapts an async function.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

/// Produces the response of one request.
///
/// An `Err` becomes `500 Internal Server Error` on the wire, the connection stays usable.
#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    type RespBody = H::RespBody;
    type Error = H::Error;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<H::RespBody>, H::Error> {
        (**self).call(req).await
    }
}

/// A [`Handler`] backed by a closure, see [`service_fn`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceFn<F>(F);

#[async_trait]
impl<F, Fut, B, E> Handler for ServiceFn<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<B>, E>> + Send,
    B: Body,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    type RespBody = B;
    type Error = E;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<B>, E> {
        (self.0)(req).await
    }
}

pub fn service_fn<F, Fut, B, E>(f: F) -> ServiceFn<F>
where
    F: Fn(Request<ReqBody>) -> Fut,
    Fut: Future<Output = Result<Response<B>, E>>,
    B: Body,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    ServiceFn(f)
}
