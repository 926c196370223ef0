//! In-memory blocking duplex pipe.
//!
//! A pair of connected endpoints with the same blocking semantics as a
//! socket: reads block until data arrives or the far writer is dropped, at
//! which point reads drain the buffer and then return `Ok(0)`. Used by unit
//! tests and demos in place of a real transport.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::{Reader, Writer};

#[derive(Debug, Default)]
struct Shared {
    buf: VecDeque<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Channel {
    shared: Mutex<Shared>,
    available: Condvar,
}

/// Read half of a one-directional pipe.
#[derive(Debug)]
pub struct PipeReader {
    channel: Arc<Channel>,
}

/// Write half of a one-directional pipe.
#[derive(Debug)]
pub struct PipeWriter {
    channel: Arc<Channel>,
}

/// Creates a one-directional pipe.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let channel = Arc::new(Channel::default());
    (
        PipeReader {
            channel: Arc::clone(&channel),
        },
        PipeWriter { channel },
    )
}

/// Creates two connected endpoints, each a `(reader, writer)` pair.
///
/// Bytes written at one endpoint are read at the other, in both directions.
pub fn duplex() -> ((PipeReader, PipeWriter), (PipeReader, PipeWriter)) {
    let (a_reader, b_writer) = pipe();
    let (b_reader, a_writer) = pipe();
    ((a_reader, a_writer), (b_reader, b_writer))
}

impl Reader for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut shared = self.channel.shared.lock().expect("pipe lock poisoned");
        while shared.buf.is_empty() && !shared.closed {
            shared = self
                .channel
                .available
                .wait(shared)
                .expect("pipe lock poisoned");
        }

        if shared.buf.is_empty() {
            return Ok(0); // closed and drained
        }

        let n = buf.len().min(shared.buf.len());
        for byte in buf[..n].iter_mut() {
            *byte = shared.buf.pop_front().expect("length checked");
        }
        Ok(n)
    }
}

impl Writer for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut shared = self.channel.shared.lock().expect("pipe lock poisoned");
        if shared.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader dropped",
            ));
        }
        shared.buf.extend(buf.iter().copied());
        self.channel.available.notify_all();
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        let mut shared = self.channel.shared.lock().expect("pipe lock poisoned");
        shared.closed = true;
        self.channel.available.notify_all();
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        let mut shared = self.channel.shared.lock().expect("pipe lock poisoned");
        shared.closed = true;
        self.channel.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn write_then_read() {
        let (mut reader, mut writer) = pipe();
        writer.write(b"hello").unwrap();

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn read_blocks_until_data() {
        let (mut reader, mut writer) = pipe();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 4];
            let n = reader.read(&mut buf).unwrap();
            buf[..n].to_vec()
        });

        writer.write(b"ping").unwrap();
        assert_eq!(handle.join().unwrap(), b"ping");
    }

    #[test]
    fn eof_after_writer_drop() {
        let (mut reader, writer) = pipe();
        drop(writer);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn buffered_bytes_drain_before_eof() {
        let (mut reader, mut writer) = pipe();
        writer.write(b"tail").unwrap();
        drop(writer);

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"tail");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_after_reader_drop_fails() {
        let (reader, mut writer) = pipe();
        drop(reader);

        assert!(writer.write(b"lost").is_err());
    }

    #[test]
    fn duplex_is_bidirectional() {
        let ((mut a_reader, mut a_writer), (mut b_reader, mut b_writer)) = duplex();

        a_writer.write(b"to b").unwrap();
        b_writer.write(b"to a").unwrap();

        let mut buf = [0u8; 4];
        b_reader.read(&mut buf).unwrap();
        assert_eq!(&buf, b"to b");
        a_reader.read(&mut buf).unwrap();
        assert_eq!(&buf, b"to a");
    }
}
