//! # smb3-wire
//!
//! Client-side SMB2/SMB3 message framing, integrity and confidentiality.
//!
//! The crate covers the layer between a byte transport and the command
//! bodies of an SMB client:
//!
//! - **Framing**: the fixed 64-byte SMB2 header, compound chaining with
//!   8-byte alignment, and error-response parsing
//! - **Integrity**: per-message HMAC-SHA256 signing with a pluggable
//!   [`core::traits::SigningDigest`] seam
//! - **Confidentiality**: the SMB3 transform envelope over AES-GCM and
//!   AES-CCM, with counter-disciplined nonces, usage tracking and key
//!   rotation
//! - **Key material**: SP800-108 derivation for the 3.0.x and 3.1.1
//!   dialect families, zeroed on wipe and on drop
//!
//! ## Modules
//!
//! - [`core`]: constants, dialects, errors and the collaborator traits
//! - [`message`]: commands, header flags and the header codec
//! - [`crypto`]: ciphers, nonces, transform header, KDF, signing and the
//!   session encryption context
//!
//! ## Example
//!
//! ```rust
//! use smb3_wire::prelude::*;
//!
//! let body = RawBody::new(vec![0x04, 0x00, 0x00, 0x00]);
//! let mut msg = Message::new(Command::Echo, Box::new(body));
//! msg.set_mid(1);
//!
//! let mut buf = vec![0u8; 128];
//! let len = msg.encode(&mut buf, 0);
//! assert_eq!(len, 68);
//! assert_eq!(&buf[..4], &[0xFE, b'S', b'M', b'B']);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod crypto;
pub mod message;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::constants::*;
    pub use crate::core::traits::{KeyDerivation, KeyStore, MessageBody, SigningDigest};
    pub use crate::core::{CryptoError, DecodeError, Dialect, SmbError};
    pub use crate::crypto::{
        CipherId, EncryptionContext, HmacSigningDigest, SecretKey, Smb3Kdf, TransformHeader,
    };
    pub use crate::message::{Command, EmptyBody, HeaderFlags, Message, RawBody};
}

pub use crate::core::{CryptoError, DecodeError, Dialect, SmbError};
pub use crate::crypto::EncryptionContext;
pub use crate::message::Message;
