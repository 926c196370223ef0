//! Length-prefixed record framing.
//!
//! Transports are plain byte streams with no message boundaries, so every
//! record (handshake message or encrypted channel record) is framed as:
//!
//! ```text
//! [2 bytes: payload length, big-endian] [payload]
//! ```
//!
//! The reader enforces an explicit upper bound on the payload length and
//! rejects oversized frames before allocating for them; nothing is ever
//! truncated to fit.

use std::io;
use thiserror::Error;

use crate::{Reader, Writer};

/// Length prefix size in bytes.
pub const FRAME_HEADER_LEN: usize = 2;

/// Largest payload the 2-byte length prefix can carry.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Payload does not fit the frame, or exceeds the caller's bound.
    #[error("frame payload is {len} bytes, limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Stream ended in the middle of a frame.
    #[error("stream closed mid-frame")]
    Closed,

    /// Underlying transport read failed.
    #[error("transport read failed: {0}")]
    Read(#[source] io::Error),

    /// Underlying transport write failed.
    #[error("transport write failed: {0}")]
    Write(#[source] io::Error),
}

/// Writes one framed record as a single transport write.
pub fn write_frame<W: Writer + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write(&frame).map_err(FrameError::Write)
}

/// Reads one framed record, rejecting payloads larger than `max_payload`.
///
/// The bound is checked against the length prefix before the payload is
/// read, so an oversized frame never causes an oversized allocation.
pub fn read_frame<R: Reader + ?Sized>(
    reader: &mut R,
    max_payload: usize,
) -> Result<Vec<u8>, FrameError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    read_exact(reader, &mut header)?;
    let len = u16::from_be_bytes(header) as usize;

    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            len,
            max: max_payload,
        });
    }

    let mut payload = vec![0u8; len];
    read_exact(reader, &mut payload)?;
    Ok(payload)
}

fn read_exact<R: Reader + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(FrameError::Closed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FrameError::Read(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe;

    #[test]
    fn frame_roundtrip() {
        let ((mut reader, _w), (_r, mut writer)) = pipe::duplex();

        write_frame(&mut writer, b"hello frame").unwrap();
        let payload = read_frame(&mut reader, MAX_FRAME_PAYLOAD).unwrap();
        assert_eq!(payload, b"hello frame");
    }

    #[test]
    fn empty_frame_roundtrip() {
        let ((mut reader, _w), (_r, mut writer)) = pipe::duplex();

        write_frame(&mut writer, &[]).unwrap();
        let payload = read_frame(&mut reader, MAX_FRAME_PAYLOAD).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn oversized_outbound_frame_rejected() {
        let ((_r, _w), (_r2, mut writer)) = pipe::duplex();

        let big = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        let err = write_frame(&mut writer, &big).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn oversized_inbound_frame_rejected() {
        let ((mut reader, _w), (_r, mut writer)) = pipe::duplex();

        write_frame(&mut writer, &[0u8; 64]).unwrap();
        let err = read_frame(&mut reader, 32).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { len: 64, max: 32 }));
    }

    #[test]
    fn closed_mid_frame() {
        let ((mut reader, _w), (_r, mut writer)) = pipe::duplex();

        // Header promises 10 bytes but the writer hangs up after 3.
        writer.write(&10u16.to_be_bytes()).unwrap();
        writer.write(&[1, 2, 3]).unwrap();
        drop(writer);

        let err = read_frame(&mut reader, MAX_FRAME_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::Closed));
    }

    #[test]
    fn sequential_frames_keep_boundaries() {
        let ((mut reader, _w), (_r, mut writer)) = pipe::duplex();

        write_frame(&mut writer, b"first").unwrap();
        write_frame(&mut writer, b"second").unwrap();

        assert_eq!(read_frame(&mut reader, 64).unwrap(), b"first");
        assert_eq!(read_frame(&mut reader, 64).unwrap(), b"second");
    }
}
