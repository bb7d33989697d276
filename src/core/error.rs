//! Error types for the SMB2/SMB3 wire layer.

use thiserror::Error;

/// Errors raised while decoding received messages.
///
/// Decoding errors are surfaced immediately and never recovered locally;
/// retry policy belongs to the surrounding transport.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Buffer does not start with the SMB2 protocol marker.
    #[error("bad SMB2 protocol marker")]
    BadProtocolId,

    /// Buffer does not start with the SMB2 transform marker.
    #[error("bad SMB2 transform marker")]
    BadTransformId,

    /// Buffer ends before the structure being decoded.
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Bytes required to decode the structure.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The command code does not name any known SMB2 command.
    #[error("unknown command code {0:#06x}")]
    UnknownCommand(u16),

    /// A non-zero next-command offset is not 8-byte aligned.
    #[error("chained command offset {0} is not 8-byte aligned")]
    MisalignedChain(u32),

    /// An error response carried the wrong structure-size tag.
    #[error("error response structure size should be 9, got {0}")]
    BadErrorStructureSize(u16),

    /// The message signature did not verify.
    ///
    /// Distinct from generic decode failures; never suppressible.
    #[error("signature verification failed for mid {mid}")]
    SignatureVerification {
        /// Message id of the failing message.
        mid: u64,
    },
}

/// Errors raised by encryption, decryption and key management.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed (tag mismatch or corrupted ciphertext).
    ///
    /// The whole operation fails atomically; no partial plaintext is
    /// ever returned.
    #[error("AEAD decryption failed (invalid tag or corrupted)")]
    DecryptionFailed,

    /// A key had the wrong length for the negotiated cipher.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Key length required by the cipher.
        expected: usize,
        /// Key length supplied.
        actual: usize,
    },

    /// A nonce had the wrong length for the negotiated cipher.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Nonce length required by the cipher.
        expected: usize,
        /// Nonce length supplied.
        actual: usize,
    },

    /// A signature/tag had the wrong length.
    #[error("invalid signature length: expected 16, got {0}")]
    InvalidSignatureLength(usize),

    /// Destination buffer too small for the structure being encoded.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required to encode the structure.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The nonce counter reached its cipher-specific limit and no
    /// rotation could reset it - the context must be replaced.
    #[error("nonce counter exhausted - rotate keys or terminate the session")]
    NonceExhausted,

    /// Keys crossed their usage threshold but no session-key material is
    /// available for automatic rotation.
    ///
    /// A configuration/protocol-state error, not a transient one.
    #[error("encryption keys need rotation but no session key is available")]
    RotationUnavailable,

    /// Key material has been wiped and is no longer usable.
    #[error("encryption keys have been wiped")]
    KeysUnavailable,

    /// Operation on a closed encryption context.
    #[error("encryption context is closed")]
    ContextClosed,

    /// Unknown or unsupported cipher identifier.
    #[error("unsupported cipher id: {0}")]
    UnsupportedCipher(u16),
}

/// Top-level wire-layer errors.
#[derive(Debug, Error)]
pub enum SmbError {
    /// Decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
