use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Reader that holds its average throughput at or below `limit` bytes per
/// second.
///
/// Bytes pass through unchanged; once the reader is ahead of its budget the
/// next read waits until the budget catches up.
pub struct ThrottledReader<R> {
    inner: R,
    limit: u64,
    started: Instant,
    consumed: u64,
    delay: Option<Pin<Box<Sleep>>>,
}

impl<R> ThrottledReader<R> {
    /// A `limit` of zero disables throttling.
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            started: Instant::now(),
            consumed: 0,
            delay: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottledReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(delay) = this.delay.as_mut() {
            ready!(delay.as_mut().poll(cx));
            this.delay = None;
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if this.limit == 0 {
            return Poll::Ready(Ok(()));
        }

        this.consumed += (buf.filled().len() - before) as u64;
        let due = Duration::from_secs_f64(this.consumed as f64 / this.limit as f64);
        let elapsed = this.started.elapsed();
        if due > elapsed {
            this.delay = Some(Box::pin(tokio::time::sleep(due - elapsed)));
        }
        Poll::Ready(Ok(()))
    }
}
