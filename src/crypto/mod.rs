//! SMB3 confidentiality and integrity: ciphers, nonces, the transform
//! header, key derivation, message signing and the session encryption
//! context.

pub mod context;
pub mod kdf;
pub mod keys;
pub mod nonce;
pub mod signing;
pub mod transform;

pub use context::EncryptionContext;
pub use kdf::Smb3Kdf;
pub use keys::{CipherId, SecretKey};
pub use signing::HmacSigningDigest;
pub use transform::TransformHeader;
