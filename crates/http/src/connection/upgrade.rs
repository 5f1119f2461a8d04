//! Connection upgrade hand-off.
//!
//! A handler that answers `101 Switching Protocols` puts an [`OnUpgrade`] into the response
//! extensions. Once the response head is written, the connection stops speaking HTTP and
//! passes its raw halves, wrapped in [`Upgraded`], to the callback.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type UpgradeFn = Box<dyn FnOnce(Upgraded) -> BoxFuture<'static, ()> + Send>;

/// The callback that takes over an upgraded connection.
///
/// Cloning shares the callback; it runs at most once.
#[derive(Clone)]
pub struct OnUpgrade {
    callback: Arc<Mutex<Option<UpgradeFn>>>,
}

impl OnUpgrade {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Upgraded) -> BoxFuture<'static, ()> + Send + 'static,
    {
        Self { callback: Arc::new(Mutex::new(Some(Box::new(f)))) }
    }

    /// Runs the callback, does nothing if it already ran.
    pub async fn call(self, upgraded: Upgraded) {
        let callback = match self.callback.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(callback) = callback {
            callback(upgraded).await;
        }
    }
}

impl fmt::Debug for OnUpgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnUpgrade").finish_non_exhaustive()
    }
}

/// The raw connection after an upgrade.
///
/// Bytes the peer sent right behind the upgrade request may already sit in the HTTP read
/// buffer; they are returned first by `poll_read`.
pub struct Upgraded {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    read_buf: Bytes,
}

impl Upgraded {
    pub fn new<R, W>(reader: R, writer: W, read_buf: Bytes) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self { reader: Box::new(reader), writer: Box::new(writer), read_buf }
    }

    /// Bytes received before the hand-off that have not been read yet.
    pub fn buffered(&self) -> &Bytes {
        &self.read_buf
    }

    #[allow(clippy::type_complexity)]
    pub fn into_parts(self) -> (Box<dyn AsyncRead + Send + Unpin>, Box<dyn AsyncWrite + Send + Unpin>, Bytes) {
        (self.reader, self.writer, self.read_buf)
    }
}

impl fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgraded").field("buffered", &self.read_buf.len()).finish_non_exhaustive()
    }
}

impl AsyncRead for Upgraded {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.read_buf.has_remaining() {
            let n = buf.remaining().min(this.read_buf.len());
            buf.put_slice(&this.read_buf.split_to(n));
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for Upgraded {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}
