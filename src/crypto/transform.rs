//! SMB2 transform header codec.
//!
//! Every encrypted message travels as a 52-byte transform header followed by
//! ciphertext. The trailing 32 bytes of the header (nonce through session id)
//! are the associated data of the AEAD; the AEAD tag lands in the signature
//! field.
//!
//! ```text
//! +-------------+---------------------+----------------+
//! | ProtocolId  | Signature (tag)     | Nonce          |
//! | 4 bytes     | 16 bytes            | 16 bytes       |
//! +-------------+---------------------+----------------+
//! | OriginalSize| Reserved | Flags    | SessionId      |
//! | 4 bytes     | 2 bytes  | 2 bytes  | 8 bytes        |
//! +-------------+---------------------+----------------+
//! ```

use crate::core::constants::{
    AEAD_TAG_LENGTH, GCM_NONCE_LENGTH, SMB2_TRANSFORM_ID, TRANSFORM_HEADER_LENGTH,
};
use crate::core::error::{CryptoError, DecodeError};
use crate::core::wire::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};

/// Length of the associated-data span: nonce through session id.
pub const ASSOCIATED_DATA_LENGTH: usize = 32;

/// Decoded (or to-be-encoded) transform header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformHeader {
    /// AEAD authentication tag.
    pub signature: [u8; AEAD_TAG_LENGTH],
    /// Nonce field; ciphers with shorter nonces zero-pad the tail.
    pub nonce: [u8; GCM_NONCE_LENGTH],
    /// Plaintext length of the protected message.
    pub original_size: u32,
    /// Transform flags (encryption algorithm id before SMB 3.1.1).
    pub flags: u16,
    /// Session the message belongs to.
    pub session_id: u64,
}

impl TransformHeader {
    /// Build a header with the tag left blank, to be filled after sealing.
    pub fn new(nonce: [u8; GCM_NONCE_LENGTH], original_size: u32, flags: u16, session_id: u64) -> Self {
        Self {
            signature: [0; AEAD_TAG_LENGTH],
            nonce,
            original_size,
            flags,
            session_id,
        }
    }

    /// Encode into `dst` at `offset`, returning the bytes written.
    pub fn encode(&self, dst: &mut [u8], offset: usize) -> Result<usize, CryptoError> {
        if dst.len() < offset + TRANSFORM_HEADER_LENGTH {
            return Err(CryptoError::BufferTooSmall {
                needed: offset + TRANSFORM_HEADER_LENGTH,
                available: dst.len(),
            });
        }
        dst[offset..offset + 4].copy_from_slice(&SMB2_TRANSFORM_ID);
        dst[offset + 4..offset + 20].copy_from_slice(&self.signature);
        dst[offset + 20..offset + 36].copy_from_slice(&self.nonce);
        put_u32(dst, offset + 36, self.original_size);
        put_u16(dst, offset + 40, 0); // reserved
        put_u16(dst, offset + 42, self.flags);
        put_u64(dst, offset + 44, self.session_id);
        Ok(TRANSFORM_HEADER_LENGTH)
    }

    /// Decode from `src` at `offset`.
    pub fn decode(src: &[u8], offset: usize) -> Result<Self, DecodeError> {
        if src.len() < offset + TRANSFORM_HEADER_LENGTH {
            return Err(DecodeError::BufferTooShort {
                needed: offset + TRANSFORM_HEADER_LENGTH,
                available: src.len(),
            });
        }
        if src[offset..offset + 4] != SMB2_TRANSFORM_ID {
            return Err(DecodeError::BadTransformId);
        }
        let mut signature = [0u8; AEAD_TAG_LENGTH];
        signature.copy_from_slice(&src[offset + 4..offset + 20]);
        let mut nonce = [0u8; GCM_NONCE_LENGTH];
        nonce.copy_from_slice(&src[offset + 20..offset + 36]);
        Ok(Self {
            signature,
            nonce,
            original_size: get_u32(src, offset + 36),
            flags: get_u16(src, offset + 42),
            session_id: get_u64(src, offset + 44),
        })
    }

    /// The associated-data bytes authenticated by the AEAD: exactly the
    /// encoded nonce-through-session-id span.
    pub fn associated_data(&self) -> [u8; ASSOCIATED_DATA_LENGTH] {
        let mut aad = [0u8; ASSOCIATED_DATA_LENGTH];
        aad[..16].copy_from_slice(&self.nonce);
        aad[16..20].copy_from_slice(&self.original_size.to_le_bytes());
        // bytes 20..22 stay zero (reserved)
        aad[22..24].copy_from_slice(&self.flags.to_le_bytes());
        aad[24..32].copy_from_slice(&self.session_id.to_le_bytes());
        aad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransformHeader {
        let mut nonce = [0u8; GCM_NONCE_LENGTH];
        nonce[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let mut header = TransformHeader::new(nonce, 1234, 0x0001, 0x1122334455667788);
        header.signature = [0xA5; AEAD_TAG_LENGTH];
        header
    }

    #[test]
    fn encode_decode_roundtrip() {
        let header = sample();
        let mut buf = [0u8; TRANSFORM_HEADER_LENGTH];
        let written = header.encode(&mut buf, 0).unwrap();
        assert_eq!(written, TRANSFORM_HEADER_LENGTH);
        assert_eq!(&buf[..4], &SMB2_TRANSFORM_ID);
        assert_eq!(TransformHeader::decode(&buf, 0).unwrap(), header);
    }

    #[test]
    fn associated_data_matches_encoded_tail() {
        let header = sample();
        let mut buf = [0u8; TRANSFORM_HEADER_LENGTH];
        header.encode(&mut buf, 0).unwrap();
        assert_eq!(header.associated_data(), buf[20..52]);
    }

    #[test]
    fn bad_marker_rejected() {
        let buf = [0u8; TRANSFORM_HEADER_LENGTH];
        assert!(matches!(
            TransformHeader::decode(&buf, 0),
            Err(DecodeError::BadTransformId)
        ));
    }

    #[test]
    fn short_buffer_rejected() {
        let header = sample();
        let mut buf = [0u8; 51];
        assert!(matches!(
            header.encode(&mut buf, 0),
            Err(CryptoError::BufferTooSmall { .. })
        ));
        assert!(matches!(
            TransformHeader::decode(&buf, 0),
            Err(DecodeError::BufferTooShort { .. })
        ));
    }
}
