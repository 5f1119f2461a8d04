use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::request::ServerRequest;

pub type HandlerError = Box<dyn Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// A step of a route chain, a middleware, an error handler or a finalizer.
///
/// A handler answers by calling [`ServerRequest::respond`]. Returning without responding
/// lets the next step of the chain run.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: &mut ServerRequest) -> HandlerResult;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, req: &mut ServerRequest) -> HandlerResult {
        (**self).invoke(req).await
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, req: &mut ServerRequest) -> HandlerResult {
        (**self).invoke(req).await
    }
}

/// An async function borrowing the request for as long as its future runs.
///
/// Implemented for every `async fn(&mut ServerRequest) -> HandlerResult`.
pub trait AsyncHandlerFn<'r>: Send + Sync {
    type Fut: Future<Output = HandlerResult> + Send + 'r;

    fn call(&self, req: &'r mut ServerRequest) -> Self::Fut;
}

impl<'r, Func, Fut> AsyncHandlerFn<'r> for Func
where
    Func: Fn(&'r mut ServerRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'r,
{
    type Fut = Fut;

    #[inline]
    fn call(&self, req: &'r mut ServerRequest) -> Self::Fut {
        (self)(req)
    }
}

/// a holder of an async fn which makes it a [`RequestHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'r> AsyncHandlerFn<'r>,
{
    FnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'r> AsyncHandlerFn<'r>,
{
    async fn invoke(&self, req: &mut ServerRequest) -> HandlerResult {
        self.f.call(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, StatusCode};
    use wick_http::protocol::body::ReqBody;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    async fn hello(req: &mut ServerRequest) -> HandlerResult {
        req.respond("hello")?;
        Ok(())
    }

    async fn pass(_req: &mut ServerRequest) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn async_fn_is_handler() {
        assert_is_handler(&handler_fn(hello));
        assert_is_handler(&Box::new(handler_fn(pass)));

        let shared: Arc<dyn RequestHandler> = Arc::new(handler_fn(pass));
        assert_is_handler(&shared);
    }

    #[tokio::test]
    async fn fn_handler_invokes_the_fn() {
        let mut req = ServerRequest::from(Request::new(ReqBody::empty()));

        handler_fn(pass).invoke(&mut req).await.unwrap();
        assert!(!req.is_responded());

        handler_fn(hello).invoke(&mut req).await.unwrap();
        assert_eq!(req.response().unwrap().status(), StatusCode::OK);

        let err = handler_fn(hello).invoke(&mut req).await.unwrap_err();
        assert_eq!(err.to_string(), "request has already been responded");
    }
}
