//! Encrypted channel over a raw transport.
//!
//! [`SecureChannel`] runs the handshake over a caller-supplied
//! reader/writer pair and hands back a [`SecureReader`]/[`SecureWriter`]
//! pair whose `read`/`write` transparently decrypt/encrypt. The encrypted
//! halves implement the same capability traits as the raw transport, so
//! callers (and anything layered above, including another handshake) cannot
//! tell the difference.
//!
//! # Wire format
//!
//! Every channel record is one frame:
//!
//! ```text
//! [2 bytes: length, big-endian] [ciphertext ‖ 16-byte tag]
//! ```
//!
//! # Lifecycle
//!
//! The channel owns no cryptographic logic; it binds the handshake's two
//! cipher contexts to the transport halves. Dropping a half wipes its
//! cipher key. `into_transport` releases the underlying transport without
//! closing it.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tether_core::framing::{read_frame, write_frame, FrameError, MAX_FRAME_PAYLOAD};
use tether_core::{Reader, Writer};
use tether_vault::{KeyPair, PublicKey, Vault, VaultError, AEAD_TAG_LENGTH};

use crate::cipher::{CipherContext, CipherError};
use crate::handshake::{self, HandshakeError};

/// Default and largest payload per record: the frame space minus the tag.
pub const DEFAULT_MAX_PAYLOAD: usize = MAX_FRAME_PAYLOAD - AEAD_TAG_LENGTH;

/// Channel construction parameters.
///
/// `max_payload` bounds the plaintext carried by a single record in both
/// directions. Oversized writes and oversized incoming frames are rejected,
/// never truncated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub max_payload: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The handshake failed; no channel was created.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// A record failed authentication. Terminal; never retried.
    #[error("record failed authentication")]
    Authentication,

    /// The send or receive counter is exhausted; the channel must be torn
    /// down and re-established.
    #[error("nonce counter exhausted")]
    NonceExhausted,

    /// The underlying transport read failed.
    #[error("transport read failed: {0}")]
    TransportRead(#[source] io::Error),

    /// The underlying transport write failed.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] io::Error),

    /// The caller's buffer cannot hold the decrypted record.
    #[error("caller buffer holds {capacity} bytes, record needs {needed}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// A payload or incoming record exceeds the configured bound.
    #[error("payload is {len} bytes, channel limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// The configuration was rejected before any I/O.
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(&'static str),

    /// The vault failed underneath the channel.
    #[error("vault operation failed: {0}")]
    Vault(VaultError),
}

impl From<CipherError> for ChannelError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::NonceExhausted => Self::NonceExhausted,
            CipherError::Authentication => Self::Authentication,
            CipherError::Vault(e) => Self::Vault(e),
        }
    }
}

fn read_error(e: FrameError) -> ChannelError {
    match e {
        FrameError::PayloadTooLarge { len, max } => ChannelError::PayloadTooLarge { len, max },
        FrameError::Closed => ChannelError::TransportRead(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed mid-record",
        )),
        FrameError::Read(e) => ChannelError::TransportRead(e),
        FrameError::Write(e) => ChannelError::TransportWrite(e),
    }
}

fn write_error(e: FrameError) -> ChannelError {
    match e {
        FrameError::PayloadTooLarge { len, max } => ChannelError::PayloadTooLarge { len, max },
        FrameError::Closed => ChannelError::TransportWrite(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "stream closed mid-record",
        )),
        FrameError::Read(e) => ChannelError::TransportRead(e),
        FrameError::Write(e) => ChannelError::TransportWrite(e),
    }
}

/// Establishes encrypted channels over caller-supplied transports.
///
/// Holds the vault handle, the channel configuration, and an optional
/// persistent static identity. Without an identity, a fresh static keypair
/// is generated through the vault for each attempt.
#[derive(Debug)]
pub struct SecureChannel {
    vault: Vault,
    config: ChannelConfig,
    identity: Option<KeyPair>,
}

impl SecureChannel {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault,
            config: ChannelConfig::default(),
            identity: None,
        }
    }

    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a persistent static identity for every handshake run by this
    /// instance.
    pub fn with_identity(mut self, identity: KeyPair) -> Self {
        self.identity = Some(identity);
        self
    }

    fn validate(&self) -> Result<(), ChannelError> {
        if self.config.max_payload == 0 {
            return Err(ChannelError::InvalidConfig("max_payload is zero"));
        }
        if self.config.max_payload > DEFAULT_MAX_PAYLOAD {
            return Err(ChannelError::InvalidConfig(
                "max_payload exceeds the frame space",
            ));
        }
        Ok(())
    }

    fn local_static(&self) -> Result<KeyPair, ChannelError> {
        match &self.identity {
            Some(identity) => Ok(identity.clone()),
            None => self.vault.generate_keypair().map_err(ChannelError::Vault),
        }
    }

    /// Runs the initiator side of the handshake over the transport pair and
    /// returns the encrypted pair.
    ///
    /// On failure no channel is created; closing the transport remains the
    /// caller's responsibility. To keep ownership of the transport across a
    /// failed attempt, pass the halves as `&mut` borrows (the capability
    /// traits are implemented for mutable references).
    pub fn connect<R: Reader, W: Writer>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> Result<(SecureReader<R>, SecureWriter<W>), ChannelError> {
        self.validate()?;
        let outcome = handshake::initiate(
            &self.vault,
            self.local_static()?,
            &mut reader,
            &mut writer,
        )?;
        debug!(
            peer = %outcome.remote_static.fingerprint(),
            "secure channel established (initiator)"
        );
        Ok(self.bind(reader, writer, outcome))
    }

    /// Runs the responder side of the handshake over the transport pair and
    /// returns the encrypted pair.
    pub fn accept<R: Reader, W: Writer>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> Result<(SecureReader<R>, SecureWriter<W>), ChannelError> {
        self.validate()?;
        let outcome = handshake::respond(
            &self.vault,
            self.local_static()?,
            &mut reader,
            &mut writer,
        )?;
        debug!(
            peer = %outcome.remote_static.fingerprint(),
            "secure channel established (responder)"
        );
        Ok(self.bind(reader, writer, outcome))
    }

    fn bind<R: Reader, W: Writer>(
        &self,
        reader: R,
        writer: W,
        outcome: handshake::HandshakeOutcome,
    ) -> (SecureReader<R>, SecureWriter<W>) {
        (
            SecureReader {
                transport: reader,
                cipher: outcome.recv,
                max_payload: self.config.max_payload,
                peer: outcome.remote_static,
            },
            SecureWriter {
                transport: writer,
                cipher: outcome.send,
                max_payload: self.config.max_payload,
                peer: outcome.remote_static,
            },
        )
    }
}

/// Decrypting read half of an established channel.
#[derive(Debug)]
pub struct SecureReader<R> {
    transport: R,
    cipher: CipherContext,
    max_payload: usize,
    peer: PublicKey,
}

impl<R: Reader> SecureReader<R> {
    /// Reads one record from the transport and decrypts it into `buf`,
    /// returning the plaintext length.
    ///
    /// The record size is checked against `buf` before decryption, so a
    /// too-small buffer does not consume the receive counter (the record
    /// itself, however, is already consumed from the stream).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let record = read_frame(&mut self.transport, self.max_payload + AEAD_TAG_LENGTH)
            .map_err(read_error)?;
        if record.len() < AEAD_TAG_LENGTH {
            return Err(ChannelError::Authentication);
        }

        let needed = record.len() - AEAD_TAG_LENGTH;
        if needed > buf.len() {
            return Err(ChannelError::BufferTooSmall {
                needed,
                capacity: buf.len(),
            });
        }

        let plaintext = self.cipher.decrypt(&[], &record)?;
        buf[..plaintext.len()].copy_from_slice(&plaintext);
        Ok(plaintext.len())
    }

    /// The peer's authenticated static public key.
    pub fn peer_public_key(&self) -> &PublicKey {
        &self.peer
    }

    /// The counter value of the next expected record.
    pub fn recv_nonce(&self) -> u64 {
        self.cipher.nonce()
    }

    /// Releases the underlying transport without closing it. The cipher
    /// key is wiped.
    pub fn into_transport(self) -> R {
        self.transport
    }
}

impl<R: Reader> Reader for SecureReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SecureReader::read(self, buf).map_err(channel_to_io)
    }
}

/// Encrypting write half of an established channel.
#[derive(Debug)]
pub struct SecureWriter<W> {
    transport: W,
    cipher: CipherContext,
    max_payload: usize,
    peer: PublicKey,
}

impl<W: Writer> SecureWriter<W> {
    /// Encrypts `plaintext` as one record and writes it to the transport.
    pub fn write(&mut self, plaintext: &[u8]) -> Result<(), ChannelError> {
        if plaintext.len() > self.max_payload {
            return Err(ChannelError::PayloadTooLarge {
                len: plaintext.len(),
                max: self.max_payload,
            });
        }

        let record = self.cipher.encrypt(&[], plaintext)?;
        write_frame(&mut self.transport, &record).map_err(write_error)
    }

    /// The peer's authenticated static public key.
    pub fn peer_public_key(&self) -> &PublicKey {
        &self.peer
    }

    /// The counter value of the next outgoing record. After N successful
    /// writes this is exactly N.
    pub fn send_nonce(&self) -> u64 {
        self.cipher.nonce()
    }

    /// Releases the underlying transport without closing it. The cipher
    /// key is wiped.
    pub fn into_transport(self) -> W {
        self.transport
    }

    #[cfg(test)]
    pub(crate) fn cipher_mut(&mut self) -> &mut CipherContext {
        &mut self.cipher
    }
}

impl<W: Writer> Writer for SecureWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        SecureWriter::write(self, buf).map_err(channel_to_io)
    }
}

fn channel_to_io(e: ChannelError) -> io::Error {
    match e {
        ChannelError::TransportRead(e) | ChannelError::TransportWrite(e) => e,
        ChannelError::Authentication => io::Error::new(io::ErrorKind::InvalidData, e),
        ChannelError::BufferTooSmall { .. } | ChannelError::PayloadTooLarge { .. } => {
            io::Error::new(io::ErrorKind::InvalidInput, e)
        }
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::NONCE_MAX;
    use std::thread;
    use tether_core::pipe::{self, PipeReader, PipeWriter};

    type Established = (
        (SecureReader<PipeReader>, SecureWriter<PipeWriter>),
        (SecureReader<PipeReader>, SecureWriter<PipeWriter>),
    );

    fn establish(config: ChannelConfig) -> Established {
        let vault = Vault::software();
        let (endpoint_a, endpoint_b) = pipe::duplex();

        let acceptor = SecureChannel::new(vault.clone()).with_config(config.clone());
        let handle = thread::spawn(move || {
            let (reader, writer) = endpoint_b;
            acceptor.accept(reader, writer).unwrap()
        });

        let connector = SecureChannel::new(vault).with_config(config);
        let (reader, writer) = endpoint_a;
        let initiator_side = connector.connect(reader, writer).unwrap();
        let responder_side = handle.join().unwrap();

        (initiator_side, responder_side)
    }

    #[test]
    fn hello_channel_scenario() {
        let ((mut i_reader, mut i_writer), (mut r_reader, mut r_writer)) =
            establish(ChannelConfig::default());

        i_writer.write(b"Hello Channel!").unwrap();
        let mut buf = [0u8; 64];
        let n = r_reader.read(&mut buf).unwrap();
        assert_eq!(n, 14);
        assert_eq!(&buf[..n], b"Hello Channel!");

        r_writer.write(b"OK").unwrap();
        let n = i_reader.read(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..n], b"OK");
    }

    #[test]
    fn nonce_counts_successful_writes() {
        let ((_, mut writer), (mut reader, _)) = establish(ChannelConfig::default());

        for i in 0..5u64 {
            assert_eq!(writer.send_nonce(), i);
            writer.write(format!("record {i}").as_bytes()).unwrap();
        }
        assert_eq!(writer.send_nonce(), 5);

        let mut buf = [0u8; 32];
        for i in 0..5u64 {
            let n = reader.read(&mut buf).unwrap();
            assert_eq!(&buf[..n], format!("record {i}").as_bytes());
        }
        assert_eq!(reader.recv_nonce(), 5);
    }

    #[test]
    fn exhausted_counter_fails_instead_of_wrapping() {
        let ((_, mut writer), _far) = establish(ChannelConfig::default());

        writer.cipher_mut().force_nonce(NONCE_MAX);
        let err = writer.write(b"one too many").unwrap_err();
        assert!(matches!(err, ChannelError::NonceExhausted));
    }

    #[test]
    fn buffer_too_small_reports_needed_size() {
        let ((_, mut writer), (mut reader, _)) = establish(ChannelConfig::default());

        writer.write(b"fourteen bytes").unwrap();
        let mut tiny = [0u8; 4];
        let err = reader.read(&mut tiny).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::BufferTooSmall {
                needed: 14,
                capacity: 4
            }
        ));
    }

    #[test]
    fn oversized_payload_rejected_not_truncated() {
        let config = ChannelConfig { max_payload: 32 };
        let ((_, mut writer), _far) = establish(config);

        let err = writer.write(&[0u8; 33]).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::PayloadTooLarge { len: 33, max: 32 }
        ));
        // Nothing was consumed from the send counter.
        assert_eq!(writer.send_nonce(), 0);
    }

    #[test]
    fn zero_max_payload_rejected_before_io() {
        let vault = Vault::software();
        let channel = SecureChannel::new(vault).with_config(ChannelConfig { max_payload: 0 });

        let ((reader, writer), _far) = pipe::duplex();
        let err = channel.connect(reader, writer).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidConfig(_)));
    }

    #[test]
    fn corrupted_record_fails_authentication() {
        let vault = Vault::software();

        // Initiator <-> relay <-> responder. The relay forwards the three
        // handshake frames verbatim, then flips a bit in the first data
        // record.
        let ((a_reader, a_writer), (mut relay_a_reader, mut relay_a_writer)) = pipe::duplex();
        let ((b_reader, b_writer), (mut relay_b_reader, mut relay_b_writer)) = pipe::duplex();

        let connector = SecureChannel::new(vault.clone());
        let initiator = thread::spawn(move || {
            let (_reader, mut writer) = connector.connect(a_reader, a_writer).unwrap();
            writer.write(b"sensitive").unwrap();
        });

        let acceptor = SecureChannel::new(vault);
        let responder = thread::spawn(move || {
            let (mut reader, _writer) = acceptor.accept(b_reader, b_writer).unwrap();
            let mut buf = [0u8; 64];
            reader.read(&mut buf)
        });

        // Handshake: message 1 and 3 travel A→B, message 2 travels B→A.
        let msg1 = read_frame(&mut relay_a_reader, MAX_FRAME_PAYLOAD).unwrap();
        write_frame(&mut relay_b_writer, &msg1).unwrap();
        let msg2 = read_frame(&mut relay_b_reader, MAX_FRAME_PAYLOAD).unwrap();
        write_frame(&mut relay_a_writer, &msg2).unwrap();
        let msg3 = read_frame(&mut relay_a_reader, MAX_FRAME_PAYLOAD).unwrap();
        write_frame(&mut relay_b_writer, &msg3).unwrap();

        // Data record, corrupted in flight.
        let mut record = read_frame(&mut relay_a_reader, MAX_FRAME_PAYLOAD).unwrap();
        record[3] ^= 0x01;
        write_frame(&mut relay_b_writer, &record).unwrap();

        initiator.join().unwrap();
        let err = responder.join().unwrap().unwrap_err();
        assert!(matches!(err, ChannelError::Authentication));
    }

    #[test]
    fn encrypted_halves_compose_as_transports() {
        // An established channel half satisfies the same capability trait
        // as the raw transport it wraps.
        fn assert_reader<R: Reader>(_r: &R) {}
        fn assert_writer<W: Writer>(_w: &W) {}

        let ((i_reader, i_writer), _far) = establish(ChannelConfig::default());
        assert_reader(&i_reader);
        assert_writer(&i_writer);
    }
}
