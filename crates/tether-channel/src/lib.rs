//! Mutually authenticated encrypted channels for Tether.
//!
//! This crate provides:
//! - The XX key-agreement engine, driven entirely through a
//!   [`tether_vault::Vault`] handle
//! - Directional cipher contexts with strict nonce accounting
//! - [`SecureChannel`], which wraps any blocking reader/writer transport in
//!   an encrypted reader/writer pair with the same interface
//!
//! # Design
//!
//! The handshake (`Noise_XX_25519_ChaChaPoly_SHA256`) gives mutual
//! authentication, identity hiding, and forward secrecy; after it
//! completes, each direction of traffic has its own key and counter, so the
//! two halves of a channel can be driven from separate threads without
//! coordination.
//!
//! Failures are terminal by design: a failed handshake or a record that
//! does not authenticate cannot be retried safely, so the caller tears the
//! attempt down and, if desired, starts fresh over a fresh connection.
//!
//! # Example
//!
//! ```
//! use std::thread;
//! use tether_channel::SecureChannel;
//! use tether_core::pipe;
//! use tether_vault::Vault;
//!
//! let vault = Vault::software();
//! let (near, far) = pipe::duplex();
//!
//! let acceptor = SecureChannel::new(vault.clone());
//! let responder = thread::spawn(move || {
//!     let (reader, writer) = far;
//!     let (mut reader, mut writer) = acceptor.accept(reader, writer).unwrap();
//!     let mut buf = [0u8; 64];
//!     let n = reader.read(&mut buf).unwrap();
//!     writer.write(b"OK").unwrap();
//!     buf[..n].to_vec()
//! });
//!
//! let (reader, writer) = near;
//! let (mut reader, mut writer) = SecureChannel::new(vault).connect(reader, writer).unwrap();
//! writer.write(b"Hello Channel!").unwrap();
//!
//! let mut buf = [0u8; 64];
//! let n = reader.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"OK");
//! assert_eq!(responder.join().unwrap(), b"Hello Channel!");
//! ```

#![forbid(unsafe_code)]

pub mod channel;
pub mod cipher;
pub mod handshake;

pub use channel::{ChannelConfig, ChannelError, SecureChannel, SecureReader, SecureWriter};
pub use cipher::{CipherContext, CipherError};
pub use handshake::{
    initiate, respond, HandshakeError, HandshakeOutcome, XxInitiator, XxResponder,
};
