//! Request routing.
//!
//! A [`Router`] is configured once through [`Router::builder`] and is read-only afterwards.
//! For every request [`Router::handle_route`] runs, in this order:
//!
//! 1. the middleware, until one of them responds;
//! 2. the first prefix route whose prefix starts the path at a `/` boundary, with the
//!    prefix stripped;
//! 3. the routes selected by [`matcher::find_longest_and_nearest_matches`], skipping routes
//!    whose method allow-list excludes the request method;
//! 4. the WebSocket handshake of a matched route that declares an upgrade handler.
//!
//! A nested router that answers nothing hands the request back to its parent, which goes on
//! with its own routes. Only when the outermost router found no answer does the dispatch fail
//! with [`RoutingError`]. A failure is handed once to the error handler; the finalizer runs
//! after every dispatch.

pub mod matcher;
mod websocket;

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use http::{Method, StatusCode};
use thiserror::Error;
use tracing::{debug, trace, warn};
use wick_http::connection::Upgraded;

use crate::handler::{HandlerError, HandlerResult, RequestHandler};
use crate::request::ServerRequest;
use matcher::{Pattern, find_longest_and_nearest_matches};
pub use websocket::WebsocketAccept;
use websocket::UpgradeHandler;

/// No route produced a response.
#[derive(Debug, Error)]
#[error("no route for '{path}': {status}")]
pub struct RoutingError {
    pub status: StatusCode,
    pub path: String,
}

impl RoutingError {
    fn not_found(path: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, path: path.into() }
    }
}

/// One step of a route chain: a handler, or a router dispatching on its own.
pub enum ChainItem {
    Handler(Box<dyn RequestHandler>),
    Router(Router),
}

/// The ordered steps a route runs until one of them responds.
#[derive(Default)]
pub struct Chain {
    items: Vec<ChainItem>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.items.push(ChainItem::Handler(Box::new(handler)));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.items.push(ChainItem::Router(router));
        self
    }

    async fn run(&self, prefix: &str, req: &mut ServerRequest) -> HandlerResult {
        for item in &self.items {
            match item {
                ChainItem::Handler(handler) => handler.invoke(req).await?,
                ChainItem::Router(router) => router.process(prefix, req, Nesting::Inner).await?,
            }

            if req.is_responded() {
                break;
            }
        }
        Ok(())
    }
}

impl<H: RequestHandler + 'static> From<H> for Chain {
    fn from(handler: H) -> Self {
        Chain::new().handler(handler)
    }
}

impl From<Router> for Chain {
    fn from(router: Router) -> Self {
        Chain::new().router(router)
    }
}

struct PrefixEntry {
    prefix: String,
    chain: Chain,
}

struct RouteEntry {
    pattern: Pattern,
    methods: Option<Vec<Method>>,
    chain: Chain,
    upgrade: Option<UpgradeHandler>,
}

impl RouteEntry {
    fn allows(&self, method: &Method) -> bool {
        self.methods.as_ref().is_none_or(|methods| methods.contains(method))
    }
}

pub struct Router {
    middleware: Vec<Box<dyn RequestHandler>>,
    prefixes: Vec<PrefixEntry>,
    routes: Vec<RouteEntry>,
    error_handler: Option<Box<dyn RequestHandler>>,
    finalizer: Option<Box<dyn RequestHandler>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Dispatches `req`, `prefix` is the part of the path already consumed by enclosing
    /// prefix routes.
    ///
    /// Fails with [`RoutingError`] when nothing responded, after the error handler had its
    /// chance to answer.
    pub fn handle_route<'a>(&'a self, prefix: &'a str, req: &'a mut ServerRequest) -> BoxFuture<'a, HandlerResult> {
        self.process(prefix, req, Nesting::Outermost)
    }

    fn process<'a>(&'a self, prefix: &'a str, req: &'a mut ServerRequest, nesting: Nesting) -> BoxFuture<'a, HandlerResult> {
        async move {
            let mut outcome = self.dispatch(prefix, req).await;
            if nesting == Nesting::Outermost && outcome.is_ok() && !req.is_responded() {
                let path = remaining_path(req.path(), prefix).to_owned();
                debug!(path, "no route responded");
                outcome = Err(RoutingError::not_found(path).into());
            }

            let result = match outcome {
                Ok(()) => Ok(()),
                Err(failure) => self.handle_failure(failure, req).await,
            };

            if let Some(finalizer) = &self.finalizer
                && let Err(e) = finalizer.invoke(req).await
            {
                warn!(cause = %e, "finalizer failed");
            }

            result
        }
        .boxed()
    }

    async fn dispatch(&self, prefix: &str, req: &mut ServerRequest) -> HandlerResult {
        for middleware in &self.middleware {
            middleware.invoke(req).await?;
            if req.is_responded() {
                return Ok(());
            }
        }

        let path = remaining_path(req.path(), prefix).to_owned();
        trace!(path, prefix, "dispatching request");

        if let Some(entry) = self.prefixes.iter().find(|entry| prefix_matches(&path, &entry.prefix)) {
            let nested = format!("{prefix}{}", entry.prefix);
            entry.chain.run(&nested, req).await?;
            if req.is_responded() {
                return Ok(());
            }
        }

        let candidates = find_longest_and_nearest_matches(&path, self.routes.iter().map(|route| &route.pattern));
        for candidate in candidates {
            let Some(route) = self.routes.get(candidate.index) else {
                continue;
            };

            if !route.allows(req.method()) {
                trace!(pattern = route.pattern.as_str(), method = %req.method(), "method not allowed by route");
                continue;
            }

            req.set_params(candidate.params);
            route.chain.run(prefix, req).await?;
            if req.is_responded() {
                return Ok(());
            }

            if let Some(upgrade) = &route.upgrade
                && let Some(accept) = websocket::handshake(req)
            {
                debug!(pattern = route.pattern.as_str(), "switching to websocket");
                req.respond(websocket::switching_protocols(&accept, upgrade))?;
                return Ok(());
            }
        }

        trace!(path, "no route of this router responded");
        Ok(())
    }

    async fn handle_failure(&self, failure: HandlerError, req: &mut ServerRequest) -> HandlerResult {
        let Some(error_handler) = &self.error_handler else {
            return Err(failure);
        };

        req.set_failure(Some(failure));
        let handled = error_handler.invoke(req).await;
        let failure = req.set_failure(None);

        match (handled, failure) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(failure)) if !req.is_responded() => Err(failure),
            (Ok(()), _) => Ok(()),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("middleware", &self.middleware.len())
            .field("prefixes", &self.prefixes.iter().map(|p| p.prefix.as_str()).collect::<Vec<_>>())
            .field("routes", &self.routes.iter().map(|r| &r.pattern).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// The path left after `prefix`, `/` when the prefix consumed all of it.
fn remaining_path<'p>(path: &'p str, prefix: &str) -> &'p str {
    path.get(prefix.len()..).filter(|rest| !rest.is_empty()).unwrap_or("/")
}

/// Case-insensitive, and the prefix has to end where a path segment ends: `/api` matches
/// `/api` and `/api/users` but not `/apiary`.
fn prefix_matches(path: &str, prefix: &str) -> bool {
    let path = path.as_bytes();
    let head_matches = path.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()));
    head_matches && path.get(prefix.len()).is_none_or(|next| *next == b'/')
}

/// Whether a router is the one the server called or runs inside another router's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Outermost,
    Inner,
}

pub struct RouterBuilder {
    router: Router,
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Registers a route only matching `", stringify!($method), "` requests.")]
        pub fn $name(self, pattern: impl Into<Pattern>, chain: impl Into<Chain>) -> Self {
            self.methods(pattern, &[Method::$method], chain)
        }
    };
}

impl RouterBuilder {
    fn new() -> Self {
        Self {
            router: Router {
                middleware: Vec::new(),
                prefixes: Vec::new(),
                routes: Vec::new(),
                error_handler: None,
                finalizer: None,
            },
        }
    }

    /// Registers a route matching any method.
    pub fn route(self, pattern: impl Into<Pattern>, chain: impl Into<Chain>) -> Self {
        self.push_route(pattern.into(), None, chain.into(), None)
    }

    pub fn methods(self, pattern: impl Into<Pattern>, methods: &[Method], chain: impl Into<Chain>) -> Self {
        self.push_route(pattern.into(), Some(methods.to_vec()), chain.into(), None)
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(patch, PATCH);
    method_route!(options, OPTIONS);

    /// Registers a `GET` route that accepts WebSocket upgrades.
    ///
    /// `chain` runs first; when it does not respond and the request is a valid handshake,
    /// the route answers `101 Switching Protocols` and `on_upgrade` receives the connection.
    pub fn upgrade<F>(self, pattern: impl Into<Pattern>, chain: impl Into<Chain>, on_upgrade: F) -> Self
    where
        F: Fn(Upgraded) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let upgrade: UpgradeHandler = Arc::new(on_upgrade);
        self.push_route(pattern.into(), Some(vec![Method::GET]), chain.into(), Some(upgrade))
    }

    /// Registers a chain for every path starting with `prefix`; the chain sees the path
    /// without it. Prefixes are tried in registration order and the first one wins.
    pub fn prefix(mut self, prefix: impl Into<String>, chain: impl Into<Chain>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_owned();
        self.router.prefixes.push(PrefixEntry { prefix, chain: chain.into() });
        self
    }

    pub fn middleware<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.router.middleware.push(Box::new(handler));
        self
    }

    /// Sets the handler receiving dispatch failures, see [`ServerRequest::failure`].
    pub fn on_error<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.router.error_handler = Some(Box::new(handler));
        self
    }

    pub fn finalizer<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.router.finalizer = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Router {
        self.router
    }

    fn push_route(
        mut self,
        pattern: Pattern,
        methods: Option<Vec<Method>>,
        chain: Chain,
        upgrade: Option<UpgradeHandler>,
    ) -> Self {
        self.router.routes.push(RouteEntry { pattern, methods, chain, upgrade });
        self
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RouterBuilder").field(&self.router).finish()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.items.len()).finish()
    }
}

impl fmt::Debug for ChainItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainItem::Handler(_) => f.write_str("Handler"),
            ChainItem::Router(router) => f.debug_tuple("Router").field(router).finish(),
        }
    }
}
