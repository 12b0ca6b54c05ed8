//! Stream adapters shared by the decoders.

use bytes::{Buf, BytesMut};
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};

/// Size of each refill when peeking.
const PEEK_CHUNK: usize = 512;

/// A readable transport stream that owns a releasable resource.
///
/// `close` releases the resource. Implementations must tolerate being
/// closed once and then dropped.
pub trait ReadClose: Read {
    /// Releases the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

impl ReadClose for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl<T: ReadClose + ?Sized> ReadClose for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Wraps a plain reader as a [`ReadClose`] whose `close` does nothing.
#[derive(Debug)]
pub struct NopCloser<R>(pub R);

impl<R: Read> Read for NopCloser<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> ReadClose for NopCloser<R> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A reader that can look ahead without consuming.
///
/// Peeked bytes are returned by later reads before anything else is
/// pulled from the inner stream.
#[derive(Debug)]
pub struct PeekReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: Read> PeekReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
        }
    }

    /// Returns up to `n` upcoming bytes. Fewer are returned only when the
    /// stream ends first.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let mut chunk = [0u8; PEEK_CHUNK];
        while self.buf.len() < n {
            let read = match self.inner.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.buf.extend_from_slice(&chunk[..read]);
        }
        let end = n.min(self.buf.len());
        Ok(&self.buf[..end])
    }

    /// Returns a mutable reference to the inner reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Returns the inner reader. Bytes already peeked are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.buf.is_empty() {
            return self.inner.read(out);
        }
        let n = out.len().min(self.buf.len());
        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf.advance(n);
        Ok(n)
    }
}

impl<R: ReadClose> ReadClose for PeekReader<R> {
    fn close(&mut self) -> io::Result<()> {
        self.buf.clear();
        self.inner.close()
    }
}
