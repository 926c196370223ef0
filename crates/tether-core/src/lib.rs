//! Core transport capabilities for Tether.
//!
//! This crate provides:
//! - The blocking `Reader`/`Writer` capability traits that every transport
//!   (and every encrypted channel wrapped around a transport) implements
//! - Adapters lifting any `std::io` stream into the capability traits
//! - Length-prefixed record framing for stream transports that do not
//!   preserve message boundaries
//! - An in-memory blocking duplex pipe used by tests and demos
//!
//! # Design
//!
//! Transports are opaque byte streams: a `read` may return any prefix of the
//! bytes in flight, and message boundaries are not preserved. Anything that
//! needs record semantics (the handshake, the encrypted channel) layers the
//! framing from [`framing`] on top.
//!
//! The traits are object-safe and deliberately minimal so that an encrypted
//! channel presents exactly the same interface as the raw transport it
//! wraps.

#![forbid(unsafe_code)]

pub mod framing;
pub mod pipe;

use std::io;
use std::net::TcpStream;

/// Blocking byte-stream read capability.
///
/// `read` blocks until at least one byte is available, the peer closes the
/// stream (`Ok(0)`), or the transport fails.
pub trait Reader {
    /// Reads up to `buf.len()` bytes, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Blocking byte-stream write capability.
///
/// `write` blocks until the whole buffer is handed to the transport or the
/// transport fails. Partial writes are not surfaced to callers.
pub trait Writer {
    /// Writes the entire buffer.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl Reader for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }
}

impl Writer for TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, buf)
    }
}

impl<T: Reader + ?Sized> Reader for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

impl<T: Writer + ?Sized> Writer for &mut T {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }
}

/// Lifts any [`std::io::Read`] stream into a [`Reader`].
#[derive(Debug)]
pub struct IoReader<T>(T);

impl<T: io::Read> IoReader<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: io::Read> Reader for IoReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Lifts any [`std::io::Write`] stream into a [`Writer`].
#[derive(Debug)]
pub struct IoWriter<T>(T);

impl<T: io::Write> IoWriter<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: io::Write> Writer for IoWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_adapters_roundtrip() {
        let mut sink = IoWriter::new(Vec::new());
        sink.write(b"hello").unwrap();
        sink.write(b" tether").unwrap();
        let bytes = sink.into_inner();
        assert_eq!(bytes, b"hello tether");

        let mut source = IoReader::new(&bytes[..]);
        let mut buf = [0u8; 5];
        assert_eq!(source.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn reader_by_mut_ref() {
        let mut source = IoReader::new(&b"abc"[..]);
        fn take<R: Reader>(r: &mut R) -> usize {
            let mut buf = [0u8; 8];
            r.read(&mut buf).unwrap()
        }
        assert_eq!(take(&mut &mut source), 3);
    }
}
