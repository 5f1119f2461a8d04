//! Read timeouts for connection halves.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

pin_project! {
    /// Bounds every read of the wrapped reader by a timeout.
    ///
    /// The timer starts when a read first returns `Pending` and is cleared as soon as the
    /// read completes. On expiry the read fails with [`io::ErrorKind::TimedOut`], which the
    /// codec turns into [`ParseError::Timeout`](crate::protocol::ParseError::Timeout).
    #[derive(Debug)]
    pub struct TimeoutReader<R> {
        #[pin]
        inner: R,
        timeout: Option<Duration>,
        deadline: Option<Pin<Box<Sleep>>>,
    }
}

impl<R> TimeoutReader<R> {
    pub fn new(inner: R, timeout: Option<Duration>) -> Self {
        Self { inner, timeout, deadline: None }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Changes the timeout, takes effect from the next pending read.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.deadline = None;
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead> AsyncRead for TimeoutReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.project();

        match this.inner.poll_read(cx, buf) {
            Poll::Ready(result) => {
                *this.deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => {
                let Some(timeout) = *this.timeout else {
                    return Poll::Pending;
                };

                let deadline = this.deadline.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                let fired = deadline.as_mut().poll(cx).is_ready();
                if fired {
                    *this.deadline = None;
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, format!("read timed out after {timeout:?}"))));
                }
                Poll::Pending
            }
        }
    }
}
