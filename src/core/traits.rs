//! Collaborator seams of the wire layer.
//!
//! The framing and encryption core stays body-agnostic and algorithm-agnostic:
//! per-command serialization, signature math and key derivation are all
//! injected through these traits. Default implementations live in
//! [`crate::crypto`]; higher layers may substitute their own.

use zeroize::Zeroizing;

use super::{Dialect, error::DecodeError};

/// Per-command message body serializer.
///
/// Implemented once per SMB2 command by the resource layer; the header codec
/// only delegates to it and accounts for the bytes it produced or consumed.
pub trait MessageBody: Send {
    /// Write the body at `offset`, returning the number of bytes written.
    fn write_body(&self, dst: &mut [u8], offset: usize) -> usize;

    /// Read the body at `offset`, returning the number of bytes consumed.
    fn read_body(&mut self, src: &[u8], offset: usize) -> Result<usize, DecodeError>;
}

/// Signs and verifies individual message spans.
///
/// The signature algorithm (HMAC-SHA256 for SMB 2.x, AES-CMAC for SMB 3.x)
/// is the implementor's concern; the codec only decides when a span is
/// signed or verified.
pub trait SigningDigest: Send + Sync {
    /// Sign `length` bytes starting at `offset`, writing the signature into
    /// the header's signature field and setting the signed flag bit.
    ///
    /// Called after the message's bytes are final.
    fn sign(&self, data: &mut [u8], offset: usize, length: usize);

    /// Verify the signature over `length` bytes starting at `offset`.
    ///
    /// `extra_pad` is the number of trailing padding bytes the transport
    /// already accounted for. Returns `true` when verification FAILED.
    /// A message without the signed flag bit is vacuously valid: trust is
    /// deferred to the caller.
    fn verify(&self, data: &[u8], offset: usize, length: usize, extra_pad: usize) -> bool;
}

/// Pure-function key derivation collaborator.
///
/// Both methods must be deterministic in their inputs; the encryption
/// context calls them during automatic key rotation.
pub trait KeyDerivation: Send + Sync {
    /// Derive a client-to-server encryption key of `key_len` bytes.
    fn derive_encryption_key(
        &self,
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8]>,
        key_len: usize,
    ) -> Zeroizing<Vec<u8>>;

    /// Derive a server-to-client decryption key of `key_len` bytes.
    fn derive_decryption_key(
        &self,
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8]>,
        key_len: usize,
    ) -> Zeroizing<Vec<u8>>;
}

/// Opaque key store notified when the encryption context stores, rotates or
/// wipes key material. Storage policy is the implementor's concern.
pub trait KeyStore: Send + Sync {
    /// Store (or replace) a key under `label`.
    fn store(&self, label: &str, key: &[u8]);

    /// Discard the key stored under `label`, wiping any copies.
    fn discard(&self, label: &str);
}
