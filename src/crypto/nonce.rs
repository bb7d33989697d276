//! Per-message nonce construction.
//!
//! GCM nonces are 16 bytes: a 12-byte per-context random salt followed by a
//! 4-byte little-endian counter. CCM nonces are 12 bytes: an 8-byte
//! little-endian counter followed by 4 reserved zero bytes. The counter half
//! guarantees uniqueness within one key generation; the context owns the
//! counter and never reuses a value under the same key.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::constants::{CCM_NONCE_LENGTH, GCM_NONCE_LENGTH, GCM_SALT_LENGTH};

use super::keys::CipherId;

/// Largest GCM counter value; beyond this the 4-byte counter field would
/// wrap and repeat a nonce.
pub const GCM_COUNTER_MAX: u64 = u32::MAX as u64;

/// Fresh random salt for a GCM key generation.
pub fn random_salt() -> [u8; GCM_SALT_LENGTH] {
    let mut salt = [0u8; GCM_SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Build the GCM nonce for `counter` under `salt`.
pub fn gcm_nonce(salt: &[u8; GCM_SALT_LENGTH], counter: u32) -> [u8; GCM_NONCE_LENGTH] {
    let mut nonce = [0u8; GCM_NONCE_LENGTH];
    nonce[..GCM_SALT_LENGTH].copy_from_slice(salt);
    nonce[GCM_SALT_LENGTH..].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// Build the CCM nonce for `counter`.
pub fn ccm_nonce(counter: u64) -> [u8; CCM_NONCE_LENGTH] {
    let mut nonce = [0u8; CCM_NONCE_LENGTH];
    nonce[..8].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// Fully random nonce of the cipher's length, for callers outside the
/// counter discipline (never mixed with counter nonces under one key).
pub fn secure_nonce(cipher: CipherId) -> Vec<u8> {
    let mut nonce = vec![0u8; cipher.nonce_length()];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcm_nonce_layout() {
        let salt = [0x11u8; GCM_SALT_LENGTH];
        let nonce = gcm_nonce(&salt, 0x0A0B0C0D);
        assert_eq!(&nonce[..12], &salt);
        assert_eq!(hex::encode(&nonce[12..]), "0d0c0b0a");
    }

    #[test]
    fn ccm_nonce_layout() {
        let nonce = ccm_nonce(0x0102030405060708);
        assert_eq!(hex::encode(&nonce[..8]), "0807060504030201");
        assert_eq!(&nonce[8..], &[0, 0, 0, 0]);
    }

    #[test]
    fn consecutive_counters_differ() {
        let salt = random_salt();
        assert_ne!(gcm_nonce(&salt, 1), gcm_nonce(&salt, 2));
        assert_ne!(ccm_nonce(1), ccm_nonce(2));
    }

    #[test]
    fn secure_nonce_matches_cipher_length() {
        assert_eq!(secure_nonce(CipherId::Aes128Gcm).len(), GCM_NONCE_LENGTH);
        assert_eq!(secure_nonce(CipherId::Aes256Ccm).len(), CCM_NONCE_LENGTH);
        assert_ne!(
            secure_nonce(CipherId::Aes128Gcm),
            secure_nonce(CipherId::Aes128Gcm)
        );
    }
}
