//! SMB3 key derivation (SP800-108 counter mode with HMAC-SHA256).
//!
//! SMB 3.1.1 binds derived keys to the preauth integrity hash of the
//! session-setup exchange; SMB 3.0/3.0.2 use fixed direction labels instead.
//! Labels carry their null terminators as laid out in the protocol.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::core::Dialect;
use crate::core::traits::KeyDerivation;

type HmacSha256 = Hmac<Sha256>;

const LABEL_ENC_311: &[u8] = b"SMBC2SCipherKey\0";
const LABEL_DEC_311: &[u8] = b"SMBS2CCipherKey\0";
const LABEL_SIGN_311: &[u8] = b"SMBSigningKey\0";
const LABEL_CIPHER_300: &[u8] = b"SMB2AESCCM\0";
const LABEL_SIGN_300: &[u8] = b"SMB2AESCMAC\0";
const CONTEXT_ENC_300: &[u8] = b"ServerIn \0";
const CONTEXT_DEC_300: &[u8] = b"ServerOut\0";
const CONTEXT_SIGN_300: &[u8] = b"SmbSign\0";

/// One round of the counter-mode KDF.
///
/// PRF input is `i (u32 BE) || label || context || L (u32 BE)`; the label
/// bytes include the null separator.
fn kdf_counter(key: &[u8], label: &[u8], context: &[u8], out_len: usize) -> Zeroizing<Vec<u8>> {
    let l_bits = (out_len as u32) * 8;
    let mut out = Zeroizing::new(Vec::with_capacity(out_len));
    let mut i: u32 = 1;
    while out.len() < out_len {
        let mut mac =
            HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
        mac.update(&i.to_be_bytes());
        mac.update(label);
        mac.update(context);
        mac.update(&l_bits.to_be_bytes());
        let block = mac.finalize().into_bytes();
        let take = usize::min(out_len - out.len(), block.len());
        out.extend_from_slice(&block[..take]);
        i += 1;
    }
    out
}

/// Default SMB3 key derivation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Smb3Kdf;

impl Smb3Kdf {
    fn derive(
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8]>,
        label_311: &'static [u8],
        label_300: &'static [u8],
        context_300: &'static [u8],
        key_len: usize,
    ) -> Zeroizing<Vec<u8>> {
        if dialect.at_least(Dialect::Smb311) {
            let context = preauth_hash.unwrap_or(&[]);
            kdf_counter(session_key, label_311, context, key_len)
        } else {
            kdf_counter(session_key, label_300, context_300, key_len)
        }
    }

    /// Derive the signing key for `dialect`.
    pub fn derive_signing_key(
        &self,
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8]>,
    ) -> Zeroizing<Vec<u8>> {
        Self::derive(
            dialect,
            session_key,
            preauth_hash,
            LABEL_SIGN_311,
            LABEL_SIGN_300,
            CONTEXT_SIGN_300,
            16,
        )
    }
}

impl KeyDerivation for Smb3Kdf {
    fn derive_encryption_key(
        &self,
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8]>,
        key_len: usize,
    ) -> Zeroizing<Vec<u8>> {
        Self::derive(
            dialect,
            session_key,
            preauth_hash,
            LABEL_ENC_311,
            LABEL_CIPHER_300,
            CONTEXT_ENC_300,
            key_len,
        )
    }

    fn derive_decryption_key(
        &self,
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8]>,
        key_len: usize,
    ) -> Zeroizing<Vec<u8>> {
        Self::derive(
            dialect,
            session_key,
            preauth_hash,
            LABEL_DEC_311,
            LABEL_CIPHER_300,
            CONTEXT_DEC_300,
            key_len,
        )
    }
}
