//! XX key-agreement handshake engine.
//!
//! Runs the three-message XX pattern entirely through the vault: the engine
//! owns the sequencing (transcript hash, chaining key, message keys) and the
//! vault owns the primitives. Instance: `Noise_XX_25519_ChaChaPoly_SHA256`.
//!
//! # Why XX?
//!
//! The XX pattern provides:
//! - **Mutual authentication**: both peers prove possession of their static
//!   keys
//! - **Identity hiding**: static keys travel encrypted under ephemeral-only
//!   keys
//! - **Forward secrecy**: fresh ephemeral keys per handshake
//!
//! # Handshake flow
//!
//! ```text
//! Initiator                              Responder
//!     |                                      |
//!     |  -> e                                |  ephemeral key
//!     |------------------------------------->|
//!     |                                      |
//!     |  <- e, ee, s, es                     |  ephemeral, encrypted static
//!     |<-------------------------------------|
//!     |                                      |
//!     |  -> s, se                            |  encrypted static
//!     |------------------------------------->|
//!     |                                      |
//!     [   split: two directional keys        ]
//! ```
//!
//! Every message carries the entire preceding transcript in its associated
//! data, so tampering with any earlier byte surfaces as an authentication
//! failure at the peer's next decryption. All failures are terminal for the
//! attempt: there is no safe partial-progress recovery in a cryptographic
//! handshake, so the caller discards the attempt and may start a fresh one
//! over a fresh connection.

use thiserror::Error;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use tether_core::framing::{read_frame, write_frame, FrameError};
use tether_core::{Reader, Writer};
use tether_vault::{
    KeyPair, PublicKey, SymmetricKey, Vault, VaultError, AEAD_TAG_LENGTH, KEY_LENGTH,
    SHA256_DIGEST_LENGTH,
};

use crate::cipher::CipherContext;

/// Protocol name mixed into the initial transcript hash. Exactly 32 bytes,
/// so it seeds the hash directly.
pub const PROTOCOL_NAME: &[u8; 32] = b"Noise_XX_25519_ChaChaPoly_SHA256";

/// Wire size of message 1: one plaintext ephemeral key.
const MESSAGE_1_LEN: usize = KEY_LENGTH;
/// Wire size of message 2: ephemeral key, encrypted static key, encrypted
/// empty payload.
const MESSAGE_2_LEN: usize = KEY_LENGTH + (KEY_LENGTH + AEAD_TAG_LENGTH) + AEAD_TAG_LENGTH;
/// Wire size of message 3: encrypted static key, encrypted empty payload.
const MESSAGE_3_LEN: usize = (KEY_LENGTH + AEAD_TAG_LENGTH) + AEAD_TAG_LENGTH;

/// Upper bound used when reading handshake frames off the transport.
pub const MAX_HANDSHAKE_MESSAGE: usize = MESSAGE_2_LEN;

/// Handshake errors. Every variant aborts the attempt; the engine never
/// retries.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The vault failed underneath the engine.
    #[error("vault operation failed: {0}")]
    Vault(#[from] VaultError),

    /// A handshake message failed authentication against the transcript.
    /// May indicate tampering by an active attacker; always terminal.
    #[error("handshake message failed authentication")]
    Authentication,

    /// A message had the wrong shape for its position in the exchange.
    #[error("malformed handshake message: {0}")]
    Malformed(&'static str),

    /// A state-machine method was driven out of message order.
    #[error("handshake step driven out of sequence")]
    OutOfSequence,

    /// The transport failed mid-handshake.
    #[error("transport failure during handshake: {0}")]
    Transport(#[from] FrameError),
}

/// Everything a completed handshake produces.
///
/// The two cipher contexts are independent and directional; they may be
/// moved to separate threads of control without coordination.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// Encrypts traffic to the peer.
    pub send: CipherContext,
    /// Decrypts traffic from the peer.
    pub recv: CipherContext,
    /// Final transcript hash; identical on both sides of a completed
    /// handshake.
    pub transcript_hash: [u8; SHA256_DIGEST_LENGTH],
    /// The peer's authenticated static public key.
    pub remote_static: PublicKey,
}

/// Transcript state shared by both roles: running hash `h`, chaining key
/// `ck`, and the current message key with its counter.
///
/// Key material is wiped on drop, whether the handshake completed or
/// aborted.
struct SymmetricState {
    vault: Vault,
    h: [u8; SHA256_DIGEST_LENGTH],
    ck: Zeroizing<[u8; SHA256_DIGEST_LENGTH]>,
    key: Option<SymmetricKey>,
    nonce: u64,
}

impl SymmetricState {
    fn new(vault: Vault) -> Result<Self, HandshakeError> {
        let mut state = Self {
            vault,
            h: *PROTOCOL_NAME,
            ck: Zeroizing::new(*PROTOCOL_NAME),
            key: None,
            nonce: 0,
        };
        // Empty prologue.
        state.mix_hash(&[])?;
        Ok(state)
    }

    fn mix_hash(&mut self, data: &[u8]) -> Result<(), HandshakeError> {
        let mut input = Vec::with_capacity(self.h.len() + data.len());
        input.extend_from_slice(&self.h);
        input.extend_from_slice(data);
        self.h = self.vault.sha256(&input)?;
        Ok(())
    }

    /// Ratchets the chaining key with new input material and installs a
    /// fresh message key with a zeroed counter.
    fn mix_key(&mut self, ikm: &[u8]) -> Result<(), HandshakeError> {
        let mut okm = Zeroizing::new([0u8; 2 * KEY_LENGTH]);
        self.vault
            .hkdf_sha256(self.ck.as_ref(), ikm, &[], okm.as_mut())?;

        self.ck.copy_from_slice(&okm[..KEY_LENGTH]);
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&okm[KEY_LENGTH..]);
        self.key = Some(SymmetricKey::from_bytes(key));
        self.nonce = 0;
        Ok(())
    }

    /// Encrypts `plaintext` bound to the transcript, then mixes the result
    /// into the transcript. Before any key is installed this is the
    /// identity transform.
    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let output = match self.key.as_ref() {
            Some(key) => {
                let ciphertext = self
                    .vault
                    .aead_encrypt(key, self.nonce, &self.h, plaintext)?;
                self.nonce += 1;
                ciphertext
            }
            None => plaintext.to_vec(),
        };
        self.mix_hash(&output)?;
        Ok(output)
    }

    /// Verifies and decrypts `data` against the transcript, then mixes the
    /// ciphertext into the transcript.
    fn decrypt_and_hash(&mut self, data: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let output = match self.key.as_ref() {
            Some(key) => {
                let plaintext = self
                    .vault
                    .aead_decrypt(key, self.nonce, &self.h, data)
                    .map_err(|e| match e {
                        VaultError::AuthenticationFailure => HandshakeError::Authentication,
                        other => HandshakeError::Vault(other),
                    })?;
                self.nonce += 1;
                plaintext
            }
            None => data.to_vec(),
        };
        self.mix_hash(data)?;
        Ok(output)
    }

    /// Derives the two directional cipher contexts. Consumes the state;
    /// the chaining key and message key are wiped on return.
    fn split(self) -> Result<(CipherContext, CipherContext), HandshakeError> {
        let mut okm = Zeroizing::new([0u8; 2 * KEY_LENGTH]);
        self.vault
            .hkdf_sha256(self.ck.as_ref(), &[], &[], okm.as_mut())?;

        let mut first = [0u8; KEY_LENGTH];
        let mut second = [0u8; KEY_LENGTH];
        first.copy_from_slice(&okm[..KEY_LENGTH]);
        second.copy_from_slice(&okm[KEY_LENGTH..]);

        Ok((
            CipherContext::new(self.vault.clone(), SymmetricKey::from_bytes(first)),
            CipherContext::new(self.vault, SymmetricKey::from_bytes(second)),
        ))
    }
}

fn public_key_from_slice(bytes: &[u8]) -> Result<PublicKey, HandshakeError> {
    let bytes: [u8; KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| HandshakeError::Malformed("public key length"))?;
    Ok(PublicKey::from_bytes(bytes))
}

#[derive(Debug, PartialEq, Eq)]
enum InitiatorStep {
    WriteMessage1,
    ReadMessage2,
    WriteMessage3,
    Finalize,
}

/// Initiator side of the XX handshake, one method per message.
///
/// Most callers use the blocking [`initiate`] driver instead; the step
/// methods exist for transports that deliver messages out-of-band.
pub struct XxInitiator {
    state: SymmetricState,
    step: InitiatorStep,
    local_static: KeyPair,
    local_ephemeral: Option<KeyPair>,
    remote_ephemeral: Option<PublicKey>,
    remote_static: Option<PublicKey>,
}

impl XxInitiator {
    pub fn new(vault: &Vault, local_static: KeyPair) -> Result<Self, HandshakeError> {
        Ok(Self {
            state: SymmetricState::new(vault.clone())?,
            step: InitiatorStep::WriteMessage1,
            local_static,
            local_ephemeral: None,
            remote_ephemeral: None,
            remote_static: None,
        })
    }

    /// Produces message 1: `e`.
    pub fn write_message_1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.step != InitiatorStep::WriteMessage1 {
            return Err(HandshakeError::OutOfSequence);
        }

        let ephemeral = self.state.vault.generate_keypair()?;
        self.state.mix_hash(ephemeral.public().as_bytes())?;

        let mut message = ephemeral.public().as_bytes().to_vec();
        message.extend_from_slice(&self.state.encrypt_and_hash(&[])?);

        self.local_ephemeral = Some(ephemeral);
        self.step = InitiatorStep::ReadMessage2;
        Ok(message)
    }

    /// Consumes message 2: `e, ee, s, es`.
    pub fn read_message_2(&mut self, message: &[u8]) -> Result<(), HandshakeError> {
        if self.step != InitiatorStep::ReadMessage2 {
            return Err(HandshakeError::OutOfSequence);
        }
        if message.len() != MESSAGE_2_LEN {
            return Err(HandshakeError::Malformed("message 2 length"));
        }
        let local_ephemeral = self
            .local_ephemeral
            .as_ref()
            .ok_or(HandshakeError::OutOfSequence)?;

        let remote_ephemeral = public_key_from_slice(&message[..KEY_LENGTH])?;
        self.state.mix_hash(remote_ephemeral.as_bytes())?;

        let ee = self
            .state
            .vault
            .key_agreement(local_ephemeral.secret(), &remote_ephemeral)?;
        self.state.mix_key(ee.as_bytes())?;

        let static_end = KEY_LENGTH + KEY_LENGTH + AEAD_TAG_LENGTH;
        let remote_static =
            public_key_from_slice(&self.state.decrypt_and_hash(&message[KEY_LENGTH..static_end])?)?;

        let es = self
            .state
            .vault
            .key_agreement(local_ephemeral.secret(), &remote_static)?;
        self.state.mix_key(es.as_bytes())?;

        self.state.decrypt_and_hash(&message[static_end..])?;

        self.remote_ephemeral = Some(remote_ephemeral);
        self.remote_static = Some(remote_static);
        self.step = InitiatorStep::WriteMessage3;
        Ok(())
    }

    /// Produces message 3: `s, se`.
    pub fn write_message_3(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.step != InitiatorStep::WriteMessage3 {
            return Err(HandshakeError::OutOfSequence);
        }
        let remote_ephemeral = self
            .remote_ephemeral
            .ok_or(HandshakeError::OutOfSequence)?;

        let static_bytes = self.local_static.public().as_bytes().to_vec();
        let mut message = self.state.encrypt_and_hash(&static_bytes)?;

        let se = self
            .state
            .vault
            .key_agreement(self.local_static.secret(), &remote_ephemeral)?;
        self.state.mix_key(se.as_bytes())?;

        message.extend_from_slice(&self.state.encrypt_and_hash(&[])?);

        self.step = InitiatorStep::Finalize;
        Ok(message)
    }

    /// Splits the final chaining key into the two directional cipher
    /// contexts. All handshake key material is wiped.
    pub fn finalize(self) -> Result<HandshakeOutcome, HandshakeError> {
        if self.step != InitiatorStep::Finalize {
            return Err(HandshakeError::OutOfSequence);
        }
        let remote_static = self.remote_static.ok_or(HandshakeError::OutOfSequence)?;
        let transcript_hash = self.state.h;
        let (initiator_to_responder, responder_to_initiator) = self.state.split()?;

        Ok(HandshakeOutcome {
            send: initiator_to_responder,
            recv: responder_to_initiator,
            transcript_hash,
            remote_static,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ResponderStep {
    ReadMessage1,
    WriteMessage2,
    ReadMessage3,
    Finalize,
}

/// Responder side of the XX handshake, one method per message.
pub struct XxResponder {
    state: SymmetricState,
    step: ResponderStep,
    local_static: KeyPair,
    local_ephemeral: Option<KeyPair>,
    remote_ephemeral: Option<PublicKey>,
    remote_static: Option<PublicKey>,
}

impl XxResponder {
    pub fn new(vault: &Vault, local_static: KeyPair) -> Result<Self, HandshakeError> {
        Ok(Self {
            state: SymmetricState::new(vault.clone())?,
            step: ResponderStep::ReadMessage1,
            local_static,
            local_ephemeral: None,
            remote_ephemeral: None,
            remote_static: None,
        })
    }

    /// Consumes message 1: `e`.
    pub fn read_message_1(&mut self, message: &[u8]) -> Result<(), HandshakeError> {
        if self.step != ResponderStep::ReadMessage1 {
            return Err(HandshakeError::OutOfSequence);
        }
        if message.len() != MESSAGE_1_LEN {
            return Err(HandshakeError::Malformed("message 1 length"));
        }

        let remote_ephemeral = public_key_from_slice(&message[..KEY_LENGTH])?;
        self.state.mix_hash(remote_ephemeral.as_bytes())?;
        self.state.decrypt_and_hash(&message[KEY_LENGTH..])?;

        self.remote_ephemeral = Some(remote_ephemeral);
        self.step = ResponderStep::WriteMessage2;
        Ok(())
    }

    /// Produces message 2: `e, ee, s, es`.
    pub fn write_message_2(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.step != ResponderStep::WriteMessage2 {
            return Err(HandshakeError::OutOfSequence);
        }
        let remote_ephemeral = self
            .remote_ephemeral
            .ok_or(HandshakeError::OutOfSequence)?;

        let ephemeral = self.state.vault.generate_keypair()?;
        self.state.mix_hash(ephemeral.public().as_bytes())?;
        let mut message = ephemeral.public().as_bytes().to_vec();

        let ee = self
            .state
            .vault
            .key_agreement(ephemeral.secret(), &remote_ephemeral)?;
        self.state.mix_key(ee.as_bytes())?;

        let static_bytes = self.local_static.public().as_bytes().to_vec();
        message.extend_from_slice(&self.state.encrypt_and_hash(&static_bytes)?);

        let es = self
            .state
            .vault
            .key_agreement(self.local_static.secret(), &remote_ephemeral)?;
        self.state.mix_key(es.as_bytes())?;

        message.extend_from_slice(&self.state.encrypt_and_hash(&[])?);

        self.local_ephemeral = Some(ephemeral);
        self.step = ResponderStep::ReadMessage3;
        Ok(message)
    }

    /// Consumes message 3: `s, se`.
    pub fn read_message_3(&mut self, message: &[u8]) -> Result<(), HandshakeError> {
        if self.step != ResponderStep::ReadMessage3 {
            return Err(HandshakeError::OutOfSequence);
        }
        if message.len() != MESSAGE_3_LEN {
            return Err(HandshakeError::Malformed("message 3 length"));
        }
        let local_ephemeral = self
            .local_ephemeral
            .as_ref()
            .ok_or(HandshakeError::OutOfSequence)?;

        let static_end = KEY_LENGTH + AEAD_TAG_LENGTH;
        let remote_static =
            public_key_from_slice(&self.state.decrypt_and_hash(&message[..static_end])?)?;

        let se = self
            .state
            .vault
            .key_agreement(local_ephemeral.secret(), &remote_static)?;
        self.state.mix_key(se.as_bytes())?;

        self.state.decrypt_and_hash(&message[static_end..])?;

        self.remote_static = Some(remote_static);
        self.step = ResponderStep::Finalize;
        Ok(())
    }

    /// Splits the final chaining key into the two directional cipher
    /// contexts. All handshake key material is wiped.
    pub fn finalize(self) -> Result<HandshakeOutcome, HandshakeError> {
        if self.step != ResponderStep::Finalize {
            return Err(HandshakeError::OutOfSequence);
        }
        let remote_static = self.remote_static.ok_or(HandshakeError::OutOfSequence)?;
        let transcript_hash = self.state.h;
        let (initiator_to_responder, responder_to_initiator) = self.state.split()?;

        Ok(HandshakeOutcome {
            send: responder_to_initiator,
            recv: initiator_to_responder,
            transcript_hash,
            remote_static,
        })
    }
}

/// Runs the initiator side over a blocking transport: one framed write or
/// read per handshake step.
pub fn initiate<R: Reader, W: Writer>(
    vault: &Vault,
    local_static: KeyPair,
    reader: &mut R,
    writer: &mut W,
) -> Result<HandshakeOutcome, HandshakeError> {
    let mut handshake = XxInitiator::new(vault, local_static)?;

    let message_1 = handshake.write_message_1()?;
    write_frame(writer, &message_1)?;
    trace!(len = message_1.len(), "sent handshake message 1");

    let message_2 = read_frame(reader, MAX_HANDSHAKE_MESSAGE)?;
    trace!(len = message_2.len(), "received handshake message 2");
    handshake.read_message_2(&message_2)?;

    let message_3 = handshake.write_message_3()?;
    write_frame(writer, &message_3)?;
    trace!(len = message_3.len(), "sent handshake message 3");

    let outcome = handshake.finalize()?;
    debug!(
        peer = %outcome.remote_static.fingerprint(),
        "handshake complete (initiator)"
    );
    Ok(outcome)
}

/// Runs the responder side over a blocking transport: one framed read or
/// write per handshake step.
pub fn respond<R: Reader, W: Writer>(
    vault: &Vault,
    local_static: KeyPair,
    reader: &mut R,
    writer: &mut W,
) -> Result<HandshakeOutcome, HandshakeError> {
    let mut handshake = XxResponder::new(vault, local_static)?;

    let message_1 = read_frame(reader, MAX_HANDSHAKE_MESSAGE)?;
    trace!(len = message_1.len(), "received handshake message 1");
    handshake.read_message_1(&message_1)?;

    let message_2 = handshake.write_message_2()?;
    write_frame(writer, &message_2)?;
    trace!(len = message_2.len(), "sent handshake message 2");

    let message_3 = read_frame(reader, MAX_HANDSHAKE_MESSAGE)?;
    trace!(len = message_3.len(), "received handshake message 3");
    handshake.read_message_3(&message_3)?;

    let outcome = handshake.finalize()?;
    debug!(
        peer = %outcome.remote_static.fingerprint(),
        "handshake complete (responder)"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::pipe;

    fn new_pair(vault: &Vault) -> (XxInitiator, XxResponder, PublicKey, PublicKey) {
        let initiator_static = vault.generate_keypair().unwrap();
        let responder_static = vault.generate_keypair().unwrap();
        let initiator_public = *initiator_static.public();
        let responder_public = *responder_static.public();
        (
            XxInitiator::new(vault, initiator_static).unwrap(),
            XxResponder::new(vault, responder_static).unwrap(),
            initiator_public,
            responder_public,
        )
    }

    fn run_to_completion(
        mut initiator: XxInitiator,
        mut responder: XxResponder,
    ) -> (HandshakeOutcome, HandshakeOutcome) {
        let msg1 = initiator.write_message_1().unwrap();
        responder.read_message_1(&msg1).unwrap();

        let msg2 = responder.write_message_2().unwrap();
        initiator.read_message_2(&msg2).unwrap();

        let msg3 = initiator.write_message_3().unwrap();
        responder.read_message_3(&msg3).unwrap();

        (initiator.finalize().unwrap(), responder.finalize().unwrap())
    }

    #[test]
    fn completed_handshake_agrees() {
        let vault = Vault::software();
        let (initiator, responder, initiator_public, responder_public) = new_pair(&vault);
        let (mut i_out, mut r_out) = run_to_completion(initiator, responder);

        // Identical transcripts, mutually authenticated statics.
        assert_eq!(i_out.transcript_hash, r_out.transcript_hash);
        assert_eq!(i_out.remote_static, responder_public);
        assert_eq!(r_out.remote_static, initiator_public);

        // Complementary directional keys.
        let record = i_out.send.encrypt(b"", b"initiator says hi").unwrap();
        assert_eq!(r_out.recv.decrypt(b"", &record).unwrap(), b"initiator says hi");

        let record = r_out.send.encrypt(b"", b"responder replies").unwrap();
        assert_eq!(i_out.recv.decrypt(b"", &record).unwrap(), b"responder replies");
    }

    #[test]
    fn directions_are_independent() {
        let vault = Vault::software();
        let (initiator, responder, _, _) = new_pair(&vault);
        let (mut i_out, mut r_out) = run_to_completion(initiator, responder);

        // A record sent initiator→responder must not decrypt in the other
        // direction's context.
        let record = i_out.send.encrypt(b"", b"one way only").unwrap();
        assert!(i_out.recv.decrypt(b"", &record).is_err());
        assert!(r_out.send.nonce() == 0);
        assert_eq!(r_out.recv.decrypt(b"", &record).unwrap(), b"one way only");
    }

    #[test]
    fn tampered_message_1_detected_at_next_decryption() {
        let vault = Vault::software();
        let (mut initiator, mut responder, _, _) = new_pair(&vault);

        let mut msg1 = initiator.write_message_1().unwrap();
        msg1[0] ^= 0x01;
        // The responder cannot tell yet; message 1 carries no tag.
        responder.read_message_1(&msg1).unwrap();

        let msg2 = responder.write_message_2().unwrap();
        let err = initiator.read_message_2(&msg2).unwrap_err();
        assert!(matches!(err, HandshakeError::Authentication));
    }

    #[test]
    fn tampered_message_2_rejected() {
        let vault = Vault::software();

        // Tamper with the ephemeral key, the encrypted static key, and the
        // encrypted payload in turn.
        for index in [0usize, 40, 95] {
            let (mut i, mut r, _, _) = new_pair(&vault);
            let m1 = i.write_message_1().unwrap();
            r.read_message_1(&m1).unwrap();
            let mut m2 = r.write_message_2().unwrap();
            m2[index] ^= 0x01;
            let err = i.read_message_2(&m2).unwrap_err();
            assert!(
                matches!(err, HandshakeError::Authentication),
                "byte {index} should fail authentication, got {err:?}"
            );
        }
    }

    #[test]
    fn tampered_message_3_rejected() {
        let vault = Vault::software();
        let (mut initiator, mut responder, _, _) = new_pair(&vault);

        let msg1 = initiator.write_message_1().unwrap();
        responder.read_message_1(&msg1).unwrap();
        let msg2 = responder.write_message_2().unwrap();
        initiator.read_message_2(&msg2).unwrap();

        let mut msg3 = initiator.write_message_3().unwrap();
        msg3[10] ^= 0x01;
        let err = responder.read_message_3(&msg3).unwrap_err();
        assert!(matches!(err, HandshakeError::Authentication));
    }

    #[test]
    fn wrong_length_messages_are_malformed() {
        let vault = Vault::software();
        let (mut initiator, mut responder, _, _) = new_pair(&vault);

        assert!(matches!(
            responder.read_message_1(&[0u8; 31]).unwrap_err(),
            HandshakeError::Malformed(_)
        ));

        let msg1 = initiator.write_message_1().unwrap();
        responder.read_message_1(&msg1).unwrap();
        let msg2 = responder.write_message_2().unwrap();
        assert!(matches!(
            initiator.read_message_2(&msg2[..msg2.len() - 1]).unwrap_err(),
            HandshakeError::Malformed(_)
        ));
    }

    #[test]
    fn steps_cannot_run_out_of_sequence() {
        let vault = Vault::software();
        let (mut initiator, responder, _, _) = new_pair(&vault);

        assert!(matches!(
            initiator.read_message_2(&[0u8; 96]).unwrap_err(),
            HandshakeError::OutOfSequence
        ));
        assert!(matches!(
            initiator.write_message_3().unwrap_err(),
            HandshakeError::OutOfSequence
        ));
        assert!(matches!(
            responder.finalize().unwrap_err(),
            HandshakeError::OutOfSequence
        ));
    }

    #[test]
    fn blocking_drivers_complete_over_pipes() {
        let vault = Vault::software();
        let initiator_static = vault.generate_keypair().unwrap();
        let responder_static = vault.generate_keypair().unwrap();

        let ((mut a_reader, mut a_writer), (mut b_reader, mut b_writer)) = pipe::duplex();

        let responder_vault = vault.clone();
        let handle = std::thread::spawn(move || {
            respond(
                &responder_vault,
                responder_static,
                &mut b_reader,
                &mut b_writer,
            )
            .unwrap()
        });

        let i_out = initiate(&vault, initiator_static, &mut a_reader, &mut a_writer).unwrap();
        let r_out = handle.join().unwrap();

        assert_eq!(i_out.transcript_hash, r_out.transcript_hash);
    }

    #[test]
    fn driver_fails_cleanly_on_closed_transport() {
        let vault = Vault::software();
        let local_static = vault.generate_keypair().unwrap();

        let ((mut reader, mut writer), far_end) = pipe::duplex();
        drop(far_end); // peer never shows up

        let err = initiate(&vault, local_static, &mut reader, &mut writer).unwrap_err();
        assert!(matches!(err, HandshakeError::Transport(_)));
    }
}
