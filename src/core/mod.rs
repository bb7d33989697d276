//! Core types: constants, errors, dialects and collaborator traits.

pub mod constants;
pub mod dialect;
pub mod error;
pub mod traits;
pub mod wire;

pub use constants::*;
pub use dialect::Dialect;
pub use error::{CryptoError, DecodeError, SmbError};
pub use traits::{KeyDerivation, KeyStore, MessageBody, SigningDigest};
