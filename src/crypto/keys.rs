//! Negotiated cipher selection and zeroizing key material.

use std::fmt;

use zeroize::Zeroizing;

use crate::core::constants::{CCM_NONCE_LENGTH, GCM_NONCE_LENGTH};
use crate::core::error::CryptoError;

/// SMB3 encryption cipher, as negotiated in the encryption capabilities
/// context of the negotiate exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CipherId {
    /// AES-128 in CCM mode (SMB 3.0 / 3.0.2 default).
    Aes128Ccm = 0x0001,
    /// AES-128 in GCM mode (SMB 3.1.1 default).
    Aes128Gcm = 0x0002,
    /// AES-256 in CCM mode.
    Aes256Ccm = 0x0003,
    /// AES-256 in GCM mode.
    Aes256Gcm = 0x0004,
}

impl CipherId {
    /// Map a negotiated cipher code to its identifier.
    pub fn from_code(code: u16) -> Result<Self, CryptoError> {
        match code {
            0x0001 => Ok(Self::Aes128Ccm),
            0x0002 => Ok(Self::Aes128Gcm),
            0x0003 => Ok(Self::Aes256Ccm),
            0x0004 => Ok(Self::Aes256Gcm),
            other => Err(CryptoError::UnsupportedCipher(other)),
        }
    }

    /// The wire code of this cipher.
    pub fn as_code(self) -> u16 {
        self as u16
    }

    /// Key length in bytes.
    pub fn key_length(self) -> usize {
        match self {
            Self::Aes128Ccm | Self::Aes128Gcm => 16,
            Self::Aes256Ccm | Self::Aes256Gcm => 32,
        }
    }

    /// Whether this cipher runs in GCM mode.
    pub fn is_gcm(self) -> bool {
        matches!(self, Self::Aes128Gcm | Self::Aes256Gcm)
    }

    /// Nonce length in bytes fed to the AEAD.
    pub fn nonce_length(self) -> usize {
        if self.is_gcm() { GCM_NONCE_LENGTH } else { CCM_NONCE_LENGTH }
    }
}

impl fmt::Display for CipherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aes128Ccm => "AES-128-CCM",
            Self::Aes128Gcm => "AES-128-GCM",
            Self::Aes256Ccm => "AES-256-CCM",
            Self::Aes256Gcm => "AES-256-GCM",
        };
        f.write_str(name)
    }
}

/// Secret key material that is zeroed on wipe and on drop.
///
/// Wiping is idempotent; a wiped key yields `None` from [`SecretKey::bytes`]
/// and every consumer must treat that as [`CryptoError::KeysUnavailable`].
pub struct SecretKey {
    bytes: Option<Zeroizing<Vec<u8>>>,
}

impl SecretKey {
    /// Wrap key material, taking ownership of it.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Some(Zeroizing::new(bytes)) }
    }

    /// Wrap already-zeroizing key material.
    pub fn from_zeroizing(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self { bytes: Some(bytes) }
    }

    /// The key bytes, or `None` once wiped.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref().map(Vec::as_slice)
    }

    /// Key length in bytes; 0 once wiped.
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, |b| b.len())
    }

    /// Whether the key has been wiped (or was empty to begin with).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero the key material in place. Idempotent.
    pub fn wipe(&mut self) {
        // dropping the Zeroizing wrapper zeroes the buffer
        self.bytes = None;
    }

    /// Whether the key material has been wiped.
    pub fn is_wiped(&self) -> bool {
        self.bytes.is_none()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print key material
        match &self.bytes {
            Some(b) => write!(f, "SecretKey({} bytes)", b.len()),
            None => f.write_str("SecretKey(wiped)"),
        }
    }
}
