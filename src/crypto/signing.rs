//! HMAC-SHA256 message signing.
//!
//! Signs exactly the span the codec hands over, with the 16-byte signature
//! field zeroed during MAC computation. HMAC-SHA256 output is truncated to
//! the field's 16 bytes; comparison on verify is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::core::constants::{
    FLAGS_OFFSET, SIGNATURE_LENGTH, SIGNATURE_OFFSET, SMB2_FLAGS_SIGNED, SMB2_HEADER_LENGTH,
};
use crate::core::traits::SigningDigest;
use crate::core::wire::{get_u32, put_u32};

type HmacSha256 = Hmac<Sha256>;

/// Session signing digest keyed with the derived signing key.
pub struct HmacSigningDigest {
    key: Zeroizing<Vec<u8>>,
}

impl HmacSigningDigest {
    /// Create a digest over the given signing key.
    pub fn new(signing_key: &[u8]) -> Self {
        Self { key: Zeroizing::new(signing_key.to_vec()) }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }
}

impl SigningDigest for HmacSigningDigest {
    fn sign(&self, data: &mut [u8], offset: usize, length: usize) {
        let flags = get_u32(data, offset + FLAGS_OFFSET) | SMB2_FLAGS_SIGNED;
        put_u32(data, offset + FLAGS_OFFSET, flags);
        data[offset + SIGNATURE_OFFSET..offset + SIGNATURE_OFFSET + SIGNATURE_LENGTH].fill(0);

        let mut mac = self.mac();
        mac.update(&data[offset..offset + length]);
        let tag = mac.finalize().into_bytes();
        data[offset + SIGNATURE_OFFSET..offset + SIGNATURE_OFFSET + SIGNATURE_LENGTH]
            .copy_from_slice(&tag[..SIGNATURE_LENGTH]);
    }

    fn verify(&self, data: &[u8], offset: usize, length: usize, extra_pad: usize) -> bool {
        let span = length + extra_pad;
        if span < SMB2_HEADER_LENGTH || data.len() < offset + span {
            return true;
        }
        let flags = get_u32(data, offset + FLAGS_OFFSET);
        if flags & SMB2_FLAGS_SIGNED == 0 {
            // unsigned messages are vacuously valid; the caller decides trust
            tracing::debug!("verify called on unsigned message");
            return false;
        }

        let mut mac = self.mac();
        mac.update(&data[offset..offset + SIGNATURE_OFFSET]);
        mac.update(&[0u8; SIGNATURE_LENGTH]);
        mac.update(&data[offset + SIGNATURE_OFFSET + SIGNATURE_LENGTH..offset + span]);
        mac.verify_truncated_left(
            &data[offset + SIGNATURE_OFFSET..offset + SIGNATURE_OFFSET + SIGNATURE_LENGTH],
        )
        .is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_message(key: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 96];
        data[..4].copy_from_slice(&crate::core::constants::SMB2_PROTOCOL_ID);
        for (i, b) in data[64..].iter_mut().enumerate() {
            *b = i as u8;
        }
        HmacSigningDigest::new(key).sign(&mut data, 0, 96);
        data
    }

    #[test]
    fn sign_sets_flag_and_verifies() {
        let key = [0x42u8; 16];
        let data = signed_message(&key);
        assert_ne!(&data[48..64], &[0u8; 16]);
        assert_ne!(get_u32(&data, FLAGS_OFFSET) & SMB2_FLAGS_SIGNED, 0);
        assert!(!HmacSigningDigest::new(&key).verify(&data, 0, 96, 0));
    }

    #[test]
    fn tampered_byte_fails_verification() {
        let key = [0x42u8; 16];
        let mut data = signed_message(&key);
        data[70] ^= 0x01;
        assert!(HmacSigningDigest::new(&key).verify(&data, 0, 96, 0));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let key = [0x42u8; 16];
        let mut data = signed_message(&key);
        data[50] ^= 0x80;
        assert!(HmacSigningDigest::new(&key).verify(&data, 0, 96, 0));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let data = signed_message(&[0x42u8; 16]);
        assert!(HmacSigningDigest::new(&[0x43u8; 16]).verify(&data, 0, 96, 0));
    }

    #[test]
    fn unsigned_message_is_vacuously_valid() {
        let data = vec![0u8; 96];
        assert!(!HmacSigningDigest::new(&[0x42u8; 16]).verify(&data, 0, 96, 0));
    }

    #[test]
    fn extra_pad_extends_the_verified_span() {
        let key = [0x42u8; 16];
        let mut data = vec![0u8; 104];
        HmacSigningDigest::new(&key).sign(&mut data, 0, 96);
        // padding beyond the signed span must not pass as covered
        data[99] = 0xFF;
        assert!(HmacSigningDigest::new(&key).verify(&data, 0, 96, 8));
        assert!(!HmacSigningDigest::new(&key).verify(&data, 0, 96, 0));
    }

    #[test]
    fn undersized_span_is_rejected() {
        let data = vec![0u8; 32];
        assert!(HmacSigningDigest::new(&[0x42u8; 16]).verify(&data, 0, 32, 0));
    }
}
