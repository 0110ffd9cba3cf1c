use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::checksum::Checksum;

/// Read size used when streaming a source through the hasher.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Incremental SHA-256 hasher producing a [`Checksum`].
#[derive(Clone, Default)]
pub struct ChecksumHasher {
    inner: Sha256,
}

impl ChecksumHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> Checksum {
        Checksum::from_digest(&self.inner.finalize())
    }

    /// Verify that `data` produces `expected`.
    pub fn verify(data: &[u8], expected: &Checksum) -> bool {
        Checksum::of(data) == *expected
    }
}

/// Consume `reader` to the end, returning its checksum and length.
///
/// The reader is left exhausted; callers that also need the bytes must
/// open the source again.
pub async fn digest_reader<R>(reader: &mut R, chunk_size: usize) -> io::Result<(Checksum, u64)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = ChecksumHasher::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hasher.finalize(), total))
}

/// Writer adapter that hashes every byte accepted by the inner writer.
///
/// Only bytes the inner writer reports as written are hashed, so a short
/// write never desynchronizes the digest from the file contents.
pub struct HashingWriter<W> {
    inner: W,
    hasher: ChecksumHasher,
    written: u64,
}

impl<W> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: ChecksumHasher::new(),
            written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Return the inner writer and the digest of everything written.
    pub fn finish(self) -> (W, Checksum) {
        (self.inner, self.hasher.finalize())
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for HashingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let n = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        this.hasher.update(&buf[..n]);
        this.written += n as u64;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
