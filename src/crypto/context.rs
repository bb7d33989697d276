//! Session encryption context: AEAD sealing/opening, nonce discipline,
//! usage tracking, key rotation and wiping.
//!
//! One context per encrypted session. Encrypt and decrypt can be called from
//! multiple transport threads; the active key generation sits behind a
//! read-write lock so rotation swaps keys, salt and counters in one step
//! while in-flight operations finish under the generation they started with.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use aes::{Aes128, Aes256};
use aes_gcm::AesGcm;
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use ccm::Ccm;
use zeroize::Zeroizing;

use crate::core::Dialect;
use crate::core::constants::{
    AEAD_TAG_LENGTH, CCM_NONCE_LENGTH, DEFAULT_KEY_ROTATION_BYTES, DEFAULT_KEY_ROTATION_SECS,
    GCM_NONCE_LENGTH,
    GCM_SALT_LENGTH, TRANSFORM_FLAG_ENCRYPTED, TRANSFORM_HEADER_LENGTH,
};
use crate::core::error::{CryptoError, SmbError};
use crate::core::traits::{KeyDerivation, KeyStore};

use super::kdf::Smb3Kdf;
use super::keys::{CipherId, SecretKey};
use super::nonce::{GCM_COUNTER_MAX, ccm_nonce, gcm_nonce, random_salt, secure_nonce};
use super::transform::TransformHeader;

type Aes128GcmLong = AesGcm<Aes128, U16>;
type Aes256GcmLong = AesGcm<Aes256, U16>;
type Aes128CcmSmb = Ccm<Aes128, U16, U12>;
type Aes256CcmSmb = Ccm<Aes256, U16, U12>;

const STORE_LABEL_ENCRYPTION: &str = "smb3-c2s-cipher-key";
const STORE_LABEL_DECRYPTION: &str = "smb3-s2c-cipher-key";

/// One key generation: the pair of direction keys plus the nonce and usage
/// state bound to them. Replaced wholesale on rotation.
struct KeyGeneration {
    encryption_key: SecretKey,
    decryption_key: SecretKey,
    gcm_salt: [u8; GCM_SALT_LENGTH],
    nonce_counter: AtomicU64,
    bytes_encrypted: AtomicU64,
    rotation_epoch: AtomicU64,
}

impl KeyGeneration {
    fn new(encryption_key: SecretKey, decryption_key: SecretKey) -> Self {
        Self {
            encryption_key,
            decryption_key,
            gcm_salt: random_salt(),
            nonce_counter: AtomicU64::new(0),
            bytes_encrypted: AtomicU64::new(0),
            rotation_epoch: AtomicU64::new(unix_secs()),
        }
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Per-session encryption state.
///
/// Sharing is by reference: all operations take `&self`. Key rotation and
/// wiping are atomic with respect to concurrent encrypt/decrypt calls.
pub struct EncryptionContext {
    cipher: CipherId,
    dialect: Dialect,
    session_id: u64,
    keys: RwLock<KeyGeneration>,
    session_key: Option<Zeroizing<Vec<u8>>>,
    preauth_hash: Option<Zeroizing<Vec<u8>>>,
    kdf: Arc<dyn KeyDerivation>,
    key_store: Option<Arc<dyn KeyStore>>,
    rotation_bytes_limit: AtomicU64,
    rotation_time_limit: AtomicU64,
    rotation_count: AtomicU32,
    closed: AtomicBool,
}

impl EncryptionContext {
    /// Create a context over freshly derived direction keys.
    ///
    /// Key lengths must match the negotiated cipher.
    pub fn new(
        cipher: CipherId,
        dialect: Dialect,
        session_id: u64,
        encryption_key: Vec<u8>,
        decryption_key: Vec<u8>,
    ) -> Result<Self, CryptoError> {
        let expected = cipher.key_length();
        for key in [&encryption_key, &decryption_key] {
            if key.len() != expected {
                return Err(CryptoError::InvalidKeyLength { expected, actual: key.len() });
            }
        }
        Ok(Self {
            cipher,
            dialect,
            session_id,
            keys: RwLock::new(KeyGeneration::new(
                SecretKey::new(encryption_key),
                SecretKey::new(decryption_key),
            )),
            session_key: None,
            preauth_hash: None,
            kdf: Arc::new(Smb3Kdf),
            key_store: None,
            rotation_bytes_limit: AtomicU64::new(DEFAULT_KEY_ROTATION_BYTES),
            rotation_time_limit: AtomicU64::new(DEFAULT_KEY_ROTATION_SECS),
            rotation_count: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Attach the session key automatic rotation derives fresh keys from.
    pub fn with_session_key(mut self, session_key: Vec<u8>) -> Self {
        self.session_key = Some(Zeroizing::new(session_key));
        self
    }

    /// Attach the preauth integrity hash (SMB 3.1.1 derivation context).
    pub fn with_preauth_hash(mut self, preauth_hash: Vec<u8>) -> Self {
        self.preauth_hash = Some(Zeroizing::new(preauth_hash));
        self
    }

    /// Substitute the key derivation collaborator.
    pub fn with_kdf(mut self, kdf: Arc<dyn KeyDerivation>) -> Self {
        self.kdf = kdf;
        self
    }

    /// Attach a key store notified on rotation and wipe.
    pub fn with_key_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.key_store = Some(store);
        self
    }

    /// The negotiated cipher.
    pub fn cipher(&self) -> CipherId {
        self.cipher
    }

    /// The negotiated dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The session this context encrypts for.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Number of completed key rotations.
    pub fn rotation_count(&self) -> u32 {
        self.rotation_count.load(Ordering::Relaxed)
    }

    /// Plaintext bytes encrypted under the current key generation.
    pub fn bytes_encrypted(&self) -> u64 {
        self.generation().bytes_encrypted.load(Ordering::Relaxed)
    }

    /// Whether the context has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Transform-header flags value for the negotiated dialect: the
    /// encrypted flag on SMB 3.1.1, the cipher id before it.
    pub fn transform_flags(&self) -> u16 {
        if self.dialect.at_least(Dialect::Smb311) {
            TRANSFORM_FLAG_ENCRYPTED
        } else {
            self.cipher.as_code()
        }
    }

    /// Encrypt one outbound message, returning transform header plus
    /// ciphertext ready for the wire.
    ///
    /// Runs the rotation check first so the current message is counted
    /// against the usage limits before it consumes key material. A wrapped
    /// GCM nonce counter also forces a rotation when session-key material
    /// is available; without it the encrypt fails with
    /// [`CryptoError::NonceExhausted`].
    pub fn encrypt_message(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.ensure_open()?;
        if self.needs_key_rotation(plaintext.len()) {
            self.rotate_once()?;
        }
        match self.encrypt_under_current_keys(plaintext) {
            // recoverable while we can derive fresh keys: the new
            // generation starts with a zero counter
            Err(CryptoError::NonceExhausted) if self.session_key.is_some() => {
                self.rotate_once()?;
                self.encrypt_under_current_keys(plaintext)
            }
            other => other,
        }
    }

    fn encrypt_under_current_keys(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let generation = self.generation();
        let key = generation
            .encryption_key
            .bytes()
            .ok_or(CryptoError::KeysUnavailable)?;

        let counter = generation.nonce_counter.fetch_add(1, Ordering::Relaxed);
        let nonce_field = if self.cipher.is_gcm() {
            if counter > GCM_COUNTER_MAX {
                return Err(CryptoError::NonceExhausted);
            }
            gcm_nonce(&generation.gcm_salt, counter as u32)
        } else {
            let mut field = [0u8; GCM_NONCE_LENGTH];
            field[..CCM_NONCE_LENGTH].copy_from_slice(&ccm_nonce(counter));
            field
        };

        let mut header = TransformHeader::new(
            nonce_field,
            plaintext.len() as u32,
            self.transform_flags(),
            self.session_id,
        );
        let aad = header.associated_data();
        let sealed = self.seal(key, &nonce_field[..self.cipher.nonce_length()], &aad, plaintext)?;

        let ciphertext_len = sealed.len() - AEAD_TAG_LENGTH;
        header.signature.copy_from_slice(&sealed[ciphertext_len..]);

        let mut out = vec![0u8; TRANSFORM_HEADER_LENGTH + ciphertext_len];
        header.encode(&mut out, 0)?;
        out[TRANSFORM_HEADER_LENGTH..].copy_from_slice(&sealed[..ciphertext_len]);

        generation
            .bytes_encrypted
            .fetch_add(plaintext.len() as u64, Ordering::Relaxed);
        tracing::trace!(
            session = self.session_id,
            cipher = %self.cipher,
            bytes = plaintext.len(),
            "encrypted message"
        );
        Ok(out)
    }

    /// Decrypt one inbound transform message, returning the plaintext.
    ///
    /// Fails atomically: a bad tag, a session mismatch or a declared-size
    /// mismatch yields an error and no plaintext.
    pub fn decrypt_message(&self, buffer: &[u8]) -> Result<Vec<u8>, SmbError> {
        self.ensure_open()?;
        let header = TransformHeader::decode(buffer, 0)?;
        if header.session_id != self.session_id {
            tracing::warn!(
                expected = self.session_id,
                got = header.session_id,
                "transform message for a different session"
            );
            return Err(CryptoError::DecryptionFailed.into());
        }
        if header.flags != self.transform_flags() {
            return Err(CryptoError::DecryptionFailed.into());
        }

        let generation = self.generation();
        let key = generation
            .decryption_key
            .bytes()
            .ok_or(CryptoError::KeysUnavailable)?;

        let ciphertext = &buffer[TRANSFORM_HEADER_LENGTH..];
        let mut sealed = Vec::with_capacity(ciphertext.len() + AEAD_TAG_LENGTH);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(&header.signature);

        let aad = header.associated_data();
        let plaintext = self.open(
            key,
            &header.nonce[..self.cipher.nonce_length()],
            &aad,
            &sealed,
        )?;
        if plaintext.len() != header.original_size as usize {
            return Err(CryptoError::DecryptionFailed.into());
        }
        Ok(plaintext)
    }

    /// Whether the current generation, plus `pending` more plaintext bytes,
    /// crosses the byte limit or the age limit.
    pub fn needs_key_rotation(&self, pending: usize) -> bool {
        let generation = self.generation();
        let bytes_limit = self.rotation_bytes_limit.load(Ordering::Relaxed);
        if bytes_limit > 0 {
            let used = generation.bytes_encrypted.load(Ordering::Relaxed);
            if used + pending as u64 >= bytes_limit {
                return true;
            }
        }
        let time_limit = self.rotation_time_limit.load(Ordering::Relaxed);
        if time_limit > 0 {
            let epoch = generation.rotation_epoch.load(Ordering::Relaxed);
            if unix_secs().saturating_sub(epoch) >= time_limit {
                return true;
            }
        }
        false
    }

    /// Reset the usage tracking of the current generation: the byte count
    /// and the age clock.
    ///
    /// The nonce counter keeps running; a reset there would repeat nonces
    /// under the live keys.
    pub fn reset_key_rotation_tracking(&self) {
        let generation = self.generation();
        generation.bytes_encrypted.store(0, Ordering::Relaxed);
        generation.rotation_epoch.store(unix_secs(), Ordering::Relaxed);
    }

    /// Set the usage limit in plaintext bytes that triggers rotation.
    /// Zero disables the byte-based trigger.
    pub fn set_key_rotation_bytes_limit(&self, limit: u64) {
        self.rotation_bytes_limit.store(limit, Ordering::Relaxed);
    }

    /// Set the key-generation age in seconds that triggers rotation.
    /// Zero disables the time-based trigger.
    pub fn set_key_rotation_time_limit(&self, seconds: u64) {
        self.rotation_time_limit.store(seconds, Ordering::Relaxed);
    }

    /// Age of the current key generation in seconds.
    pub fn seconds_since_last_rotation(&self) -> u64 {
        let epoch = self.generation().rotation_epoch.load(Ordering::Relaxed);
        unix_secs().saturating_sub(epoch)
    }

    /// Install a fresh key pair, wiping the old generation.
    ///
    /// The new generation starts with a zero nonce counter, a fresh GCM salt
    /// and zero usage; a rotation is the only safe way to reset the nonce
    /// counter.
    pub fn rotate_keys(
        &self,
        encryption_key: Zeroizing<Vec<u8>>,
        decryption_key: Zeroizing<Vec<u8>>,
    ) -> Result<(), CryptoError> {
        self.ensure_open()?;
        self.install_keys(encryption_key, decryption_key, None)
    }

    /// One limit-triggered rotation: derive from the session key and
    /// install against the rotation count seen now, so racing callers
    /// rotate once between them.
    fn rotate_once(&self) -> Result<(), CryptoError> {
        let snapshot = self.rotation_count.load(Ordering::SeqCst);
        let (encryption_key, decryption_key) = self.derive_rotation_keys()?;
        self.install_keys(encryption_key, decryption_key, Some(snapshot))
    }

    /// Swap in a new key generation under the write lock.
    ///
    /// With `expected_rotation` set, the swap only happens while the
    /// rotation count still matches: concurrent encrypts that both crossed
    /// the usage limit rotate once, not once each. The count only changes
    /// under this same lock, so check and increment are atomic together.
    fn install_keys(
        &self,
        encryption_key: Zeroizing<Vec<u8>>,
        decryption_key: Zeroizing<Vec<u8>>,
        expected_rotation: Option<u32>,
    ) -> Result<(), CryptoError> {
        let expected = self.cipher.key_length();
        for key in [&encryption_key, &decryption_key] {
            if key.len() != expected {
                return Err(CryptoError::InvalidKeyLength { expected, actual: key.len() });
            }
        }

        let mut generation = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if let Some(snapshot) = expected_rotation {
            if self.rotation_count.load(Ordering::SeqCst) != snapshot {
                return Ok(());
            }
        }
        generation.encryption_key.wipe();
        generation.decryption_key.wipe();
        if let Some(store) = &self.key_store {
            store.store(STORE_LABEL_ENCRYPTION, &encryption_key);
            store.store(STORE_LABEL_DECRYPTION, &decryption_key);
        }
        *generation = KeyGeneration::new(
            SecretKey::from_zeroizing(encryption_key),
            SecretKey::from_zeroizing(decryption_key),
        );
        let count = self.rotation_count.fetch_add(1, Ordering::SeqCst) + 1;
        drop(generation);

        tracing::info!(session = self.session_id, rotation = count, "rotated encryption keys");
        Ok(())
    }

    /// Derive and install a fresh key pair from the attached session key.
    ///
    /// The derivation input is the session key extended with the rotation
    /// ordinal and the current unix time, so each rotation yields distinct
    /// keys even within one second of the last.
    pub fn perform_automatic_key_rotation(&self) -> Result<(), CryptoError> {
        self.ensure_open()?;
        let (encryption_key, decryption_key) = self.derive_rotation_keys()?;
        self.install_keys(encryption_key, decryption_key, None)
    }

    /// Derive the next key pair from the attached session key.
    #[allow(clippy::type_complexity)]
    fn derive_rotation_keys(
        &self,
    ) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>), CryptoError> {
        let session_key = self
            .session_key
            .as_ref()
            .ok_or(CryptoError::RotationUnavailable)?;

        let ordinal = self.rotation_count.load(Ordering::SeqCst).wrapping_add(1);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let mut material = Zeroizing::new(Vec::with_capacity(session_key.len() + 8));
        material.extend_from_slice(session_key);
        material.extend_from_slice(&ordinal.to_le_bytes());
        material.extend_from_slice(&timestamp.to_le_bytes());

        let key_len = self.cipher.key_length();
        let preauth = self.preauth_hash.as_deref().map(Vec::as_slice);
        let encryption_key =
            self.kdf
                .derive_encryption_key(self.dialect, &material, preauth, key_len);
        let decryption_key =
            self.kdf
                .derive_decryption_key(self.dialect, &material, preauth, key_len);
        Ok((encryption_key, decryption_key))
    }

    /// Zero both direction keys in place and notify the key store.
    /// Idempotent; later encrypt/decrypt calls fail with
    /// [`CryptoError::KeysUnavailable`].
    pub fn secure_wipe_keys(&self) {
        let mut generation = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if generation.encryption_key.is_wiped() && generation.decryption_key.is_wiped() {
            return;
        }
        generation.encryption_key.wipe();
        generation.decryption_key.wipe();
        drop(generation);

        if let Some(store) = &self.key_store {
            store.discard(STORE_LABEL_ENCRYPTION);
            store.discard(STORE_LABEL_DECRYPTION);
        }
        tracing::debug!(session = self.session_id, "wiped encryption keys");
    }

    /// Close the context: wipe keys and reject further crypto operations.
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.secure_wipe_keys();
        tracing::debug!(session = self.session_id, "closed encryption context");
    }

    /// Next nonce under the per-generation counter, at the cipher's
    /// nonce length.
    ///
    /// Draws from the same counter as [`Self::encrypt_message`], so a value
    /// handed out here is never repeated by an encrypt under the current
    /// keys. A wrapped GCM counter yields
    /// [`CryptoError::NonceExhausted`].
    pub fn generate_nonce(&self) -> Result<Vec<u8>, CryptoError> {
        self.ensure_open()?;
        let generation = self.generation();
        let counter = generation.nonce_counter.fetch_add(1, Ordering::Relaxed);
        if self.cipher.is_gcm() {
            if counter > GCM_COUNTER_MAX {
                return Err(CryptoError::NonceExhausted);
            }
            Ok(gcm_nonce(&generation.gcm_salt, counter as u32).to_vec())
        } else {
            Ok(ccm_nonce(counter).to_vec())
        }
    }

    /// Fully random nonce of the cipher's length, outside the per-key
    /// counter discipline. Usable even after close.
    pub fn generate_secure_nonce(&self) -> Vec<u8> {
        secure_nonce(self.cipher)
    }

    fn ensure_open(&self) -> Result<(), CryptoError> {
        if self.is_closed() {
            return Err(CryptoError::ContextClosed);
        }
        Ok(())
    }

    fn generation(&self) -> RwLockReadGuard<'_, KeyGeneration> {
        self.keys.read().unwrap_or_else(|e| e.into_inner())
    }

    fn seal(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        let payload = Payload { msg: plaintext, aad };
        let sealed = match self.cipher {
            CipherId::Aes128Gcm => self
                .aead_cipher::<Aes128GcmLong>(key)?
                .encrypt(GenericArray::from_slice(nonce), payload),
            CipherId::Aes256Gcm => self
                .aead_cipher::<Aes256GcmLong>(key)?
                .encrypt(GenericArray::from_slice(nonce), payload),
            CipherId::Aes128Ccm => self
                .aead_cipher::<Aes128CcmSmb>(key)?
                .encrypt(GenericArray::from_slice(nonce), payload),
            CipherId::Aes256Ccm => self
                .aead_cipher::<Aes256CcmSmb>(key)?
                .encrypt(GenericArray::from_slice(nonce), payload),
        };
        sealed.map_err(|_| CryptoError::EncryptionFailed)
    }

    fn open(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        sealed: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        let payload = Payload { msg: sealed, aad };
        let opened = match self.cipher {
            CipherId::Aes128Gcm => self
                .aead_cipher::<Aes128GcmLong>(key)?
                .decrypt(GenericArray::from_slice(nonce), payload),
            CipherId::Aes256Gcm => self
                .aead_cipher::<Aes256GcmLong>(key)?
                .decrypt(GenericArray::from_slice(nonce), payload),
            CipherId::Aes128Ccm => self
                .aead_cipher::<Aes128CcmSmb>(key)?
                .decrypt(GenericArray::from_slice(nonce), payload),
            CipherId::Aes256Ccm => self
                .aead_cipher::<Aes256CcmSmb>(key)?
                .decrypt(GenericArray::from_slice(nonce), payload),
        };
        opened.map_err(|_| CryptoError::DecryptionFailed)
    }

    fn check_nonce(&self, nonce: &[u8]) -> Result<(), CryptoError> {
        let expected = self.cipher.nonce_length();
        if nonce.len() != expected {
            return Err(CryptoError::InvalidNonceLength { expected, actual: nonce.len() });
        }
        Ok(())
    }

    fn aead_cipher<C: KeyInit>(&self, key: &[u8]) -> Result<C, CryptoError> {
        C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: self.cipher.key_length(),
            actual: key.len(),
        })
    }

    #[cfg(test)]
    fn force_nonce_counter(&self, value: u64) {
        self.generation().nonce_counter.store(value, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn force_rotation_epoch(&self, secs: u64) {
        self.generation().rotation_epoch.store(secs, Ordering::Relaxed);
    }
}

// Key material stays out of the output, like [`SecretKey`]'s Debug.
impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("cipher", &self.cipher)
            .field("dialect", &self.dialect)
            .field("session_id", &self.session_id)
            .field("rotations", &self.rotation_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for EncryptionContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::core::constants::SMB2_TRANSFORM_ID;

    const PLAINTEXT: &[u8] = b"\xfeSMB fake message body for sealing tests";
    const SESSION: u64 = 0x0011223344556677;

    fn key(cipher: CipherId, fill: u8) -> Vec<u8> {
        vec![fill; cipher.key_length()]
    }

    /// A context pair wired as two ends of one session: what one end
    /// encrypts, the other decrypts.
    fn peer_pair(cipher: CipherId, dialect: Dialect) -> (EncryptionContext, EncryptionContext) {
        let a = EncryptionContext::new(cipher, dialect, SESSION, key(cipher, 0xC1), key(cipher, 0xC2))
            .unwrap();
        let b = EncryptionContext::new(cipher, dialect, SESSION, key(cipher, 0xC2), key(cipher, 0xC1))
            .unwrap();
        (a, b)
    }

    struct RecordingStore {
        events: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self { events: Mutex::new(Vec::new()) })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl KeyStore for RecordingStore {
        fn store(&self, label: &str, _key: &[u8]) {
            self.events.lock().unwrap().push(format!("store:{label}"));
        }

        fn discard(&self, label: &str) {
            self.events.lock().unwrap().push(format!("discard:{label}"));
        }
    }

    #[test]
    fn roundtrip_all_ciphers() {
        for cipher in [
            CipherId::Aes128Ccm,
            CipherId::Aes128Gcm,
            CipherId::Aes256Ccm,
            CipherId::Aes256Gcm,
        ] {
            let (a, b) = peer_pair(cipher, Dialect::Smb311);
            let wire = a.encrypt_message(PLAINTEXT).unwrap();
            assert_eq!(&wire[..4], &SMB2_TRANSFORM_ID);
            assert_eq!(wire.len(), TRANSFORM_HEADER_LENGTH + PLAINTEXT.len());
            assert_eq!(b.decrypt_message(&wire).unwrap(), PLAINTEXT);
        }
    }

    #[test]
    fn roundtrip_pre_311_dialect() {
        let (a, b) = peer_pair(CipherId::Aes128Ccm, Dialect::Smb300);
        let wire = a.encrypt_message(PLAINTEXT).unwrap();
        let header = TransformHeader::decode(&wire, 0).unwrap();
        assert_eq!(header.flags, CipherId::Aes128Ccm.as_code());
        assert_eq!(b.decrypt_message(&wire).unwrap(), PLAINTEXT);
    }

    #[test]
    fn transform_flags_per_dialect() {
        let ctx = EncryptionContext::new(
            CipherId::Aes128Gcm,
            Dialect::Smb311,
            SESSION,
            key(CipherId::Aes128Gcm, 1),
            key(CipherId::Aes128Gcm, 2),
        )
        .unwrap();
        assert_eq!(ctx.transform_flags(), TRANSFORM_FLAG_ENCRYPTED);

        let ctx = EncryptionContext::new(
            CipherId::Aes256Gcm,
            Dialect::Smb302,
            SESSION,
            key(CipherId::Aes256Gcm, 1),
            key(CipherId::Aes256Gcm, 2),
        )
        .unwrap();
        assert_eq!(ctx.transform_flags(), CipherId::Aes256Gcm.as_code());
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let (a, b) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let mut wire = a.encrypt_message(PLAINTEXT).unwrap();
        wire[TRANSFORM_HEADER_LENGTH + 3] ^= 0x01;
        assert!(matches!(
            b.decrypt_message(&wire),
            Err(SmbError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[test]
    fn tampered_tag_rejected() {
        let (a, b) = peer_pair(CipherId::Aes256Ccm, Dialect::Smb311);
        let mut wire = a.encrypt_message(PLAINTEXT).unwrap();
        wire[4] ^= 0x80; // signature field
        assert!(b.decrypt_message(&wire).is_err());
    }

    #[test]
    fn tampered_nonce_rejected() {
        let (a, b) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let mut wire = a.encrypt_message(PLAINTEXT).unwrap();
        wire[20] ^= 0x01; // nonce is associated data
        assert!(b.decrypt_message(&wire).is_err());
    }

    #[test]
    fn session_mismatch_rejected() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let other = EncryptionContext::new(
            CipherId::Aes128Gcm,
            Dialect::Smb311,
            SESSION + 1,
            key(CipherId::Aes128Gcm, 0xC2),
            key(CipherId::Aes128Gcm, 0xC1),
        )
        .unwrap();
        let wire = a.encrypt_message(PLAINTEXT).unwrap();
        assert!(matches!(
            other.decrypt_message(&wire),
            Err(SmbError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[test]
    fn bad_transform_marker_rejected() {
        let (_, b) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let wire = vec![0u8; 80];
        assert!(matches!(
            b.decrypt_message(&wire),
            Err(SmbError::Decode(crate::core::error::DecodeError::BadTransformId))
        ));
    }

    #[test]
    fn nonce_counter_advances_per_message() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let first = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        let second = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        assert_eq!(&first.nonce[..GCM_SALT_LENGTH], &second.nonce[..GCM_SALT_LENGTH]);
        assert_eq!(first.nonce[12..16], [0, 0, 0, 0]);
        assert_eq!(second.nonce[12..16], [1, 0, 0, 0]);
    }

    #[test]
    fn ccm_nonce_counter_in_leading_bytes() {
        let (a, _) = peer_pair(CipherId::Aes128Ccm, Dialect::Smb311);
        a.encrypt_message(PLAINTEXT).unwrap();
        let second = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        assert_eq!(second.nonce[..8], [1, 0, 0, 0, 0, 0, 0, 0]);
        // the field tail beyond the CCM nonce stays zero
        assert_eq!(second.nonce[CCM_NONCE_LENGTH..], [0; 4]);
    }

    #[test]
    fn gcm_counter_exhaustion_detected() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.force_nonce_counter(GCM_COUNTER_MAX + 1);
        assert!(matches!(
            a.encrypt_message(PLAINTEXT),
            Err(CryptoError::NonceExhausted)
        ));
    }

    #[test]
    fn usage_tracking_counts_plaintext_bytes() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        assert_eq!(a.bytes_encrypted(), 0);
        a.encrypt_message(PLAINTEXT).unwrap();
        a.encrypt_message(PLAINTEXT).unwrap();
        assert_eq!(a.bytes_encrypted(), 2 * PLAINTEXT.len() as u64);
    }

    #[test]
    fn rotation_check_includes_pending_message() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.set_key_rotation_bytes_limit(PLAINTEXT.len() as u64 + 1);
        assert!(!a.needs_key_rotation(PLAINTEXT.len()));
        assert!(a.needs_key_rotation(PLAINTEXT.len() + 1));
    }

    #[test]
    fn automatic_rotation_without_session_key_fails() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.set_key_rotation_bytes_limit(1);
        assert!(matches!(
            a.encrypt_message(PLAINTEXT),
            Err(CryptoError::RotationUnavailable)
        ));
    }

    #[test]
    fn automatic_rotation_derives_fresh_keys() {
        let cipher = CipherId::Aes128Gcm;
        let a = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, key(cipher, 1), key(cipher, 2))
            .unwrap()
            .with_session_key(vec![0x5E; 16])
            .with_preauth_hash(vec![0x7A; 64]);
        a.set_key_rotation_bytes_limit(1);

        let wire = a.encrypt_message(PLAINTEXT).unwrap();
        assert_eq!(a.rotation_count(), 1);
        // the encrypt that crossed the limit already ran under the new keys
        let b = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, key(cipher, 2), key(cipher, 1))
            .unwrap();
        assert!(b.decrypt_message(&wire).is_err());
    }

    #[test]
    fn manual_rotation_resets_counters_and_salt() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.encrypt_message(PLAINTEXT).unwrap();
        a.encrypt_message(PLAINTEXT).unwrap();
        let before = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        assert_eq!(before.nonce[12..16], [2, 0, 0, 0]);

        a.rotate_keys(
            Zeroizing::new(key(CipherId::Aes128Gcm, 9)),
            Zeroizing::new(key(CipherId::Aes128Gcm, 8)),
        )
        .unwrap();
        assert_eq!(a.rotation_count(), 1);
        assert_eq!(a.bytes_encrypted(), 0);

        let after = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        assert_eq!(after.nonce[12..16], [0, 0, 0, 0]);
        assert_ne!(before.nonce[..GCM_SALT_LENGTH], after.nonce[..GCM_SALT_LENGTH]);
    }

    #[test]
    fn rotation_rejects_wrong_key_length() {
        let (a, _) = peer_pair(CipherId::Aes256Gcm, Dialect::Smb311);
        let err = a
            .rotate_keys(Zeroizing::new(vec![0; 16]), Zeroizing::new(vec![0; 16]))
            .unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength { expected: 32, actual: 16 }
        ));
    }

    #[test]
    fn tracking_reset_keeps_nonce_counter_running() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.encrypt_message(PLAINTEXT).unwrap();
        a.reset_key_rotation_tracking();
        assert_eq!(a.bytes_encrypted(), 0);
        let next = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        assert_eq!(next.nonce[12..16], [1, 0, 0, 0]);
    }

    #[test]
    fn zero_bytes_limit_disables_byte_trigger() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.set_key_rotation_bytes_limit(0);
        a.encrypt_message(PLAINTEXT).unwrap();
        assert!(!a.needs_key_rotation(usize::MAX / 2));
        assert_eq!(a.rotation_count(), 0);
    }

    #[test]
    fn gcm_counter_wrap_rotates_under_session_key() {
        let cipher = CipherId::Aes128Gcm;
        let a = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, key(cipher, 1), key(cipher, 2))
            .unwrap()
            .with_session_key(vec![0x5E; 16])
            .with_preauth_hash(vec![0x7A; 64]);
        a.force_nonce_counter(GCM_COUNTER_MAX + 1);

        let wire = a.encrypt_message(PLAINTEXT).unwrap();
        assert_eq!(a.rotation_count(), 1);
        // the retried encrypt ran under the fresh generation's zero counter
        let header = TransformHeader::decode(&wire, 0).unwrap();
        assert_eq!(header.nonce[12..16], [0, 0, 0, 0]);
    }

    #[test]
    fn elapsed_time_triggers_rotation() {
        let cipher = CipherId::Aes128Gcm;
        let a = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, key(cipher, 1), key(cipher, 2))
            .unwrap()
            .with_session_key(vec![0x5E; 16])
            .with_preauth_hash(vec![0x7A; 64]);
        a.force_rotation_epoch(0);
        assert!(a.seconds_since_last_rotation() >= DEFAULT_KEY_ROTATION_SECS);
        assert!(a.needs_key_rotation(0));

        a.encrypt_message(PLAINTEXT).unwrap();
        assert_eq!(a.rotation_count(), 1);
        // the fresh generation starts its age clock at now
        assert!(a.seconds_since_last_rotation() < DEFAULT_KEY_ROTATION_SECS);
    }

    #[test]
    fn zero_time_limit_disables_age_trigger() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.force_rotation_epoch(0);
        a.set_key_rotation_time_limit(0);
        assert!(!a.needs_key_rotation(PLAINTEXT.len()));
        a.encrypt_message(PLAINTEXT).unwrap();
        assert_eq!(a.rotation_count(), 0);
    }

    #[test]
    fn tracking_reset_restarts_age_clock() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.force_rotation_epoch(0);
        assert!(a.needs_key_rotation(0));
        a.reset_key_rotation_tracking();
        assert!(a.seconds_since_last_rotation() < DEFAULT_KEY_ROTATION_SECS);
        assert!(!a.needs_key_rotation(0));
    }

    #[test]
    fn wiped_keys_fail_fast() {
        let (a, b) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let wire = a.encrypt_message(PLAINTEXT).unwrap();
        b.secure_wipe_keys();
        b.secure_wipe_keys(); // idempotent
        assert!(matches!(
            b.decrypt_message(&wire),
            Err(SmbError::Crypto(CryptoError::KeysUnavailable))
        ));
        a.secure_wipe_keys();
        assert!(matches!(
            a.encrypt_message(PLAINTEXT),
            Err(CryptoError::KeysUnavailable)
        ));
    }

    #[test]
    fn closed_context_rejects_everything() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let wire = a.encrypt_message(PLAINTEXT).unwrap();
        a.close();
        a.close(); // idempotent
        assert!(a.is_closed());
        assert!(matches!(
            a.encrypt_message(PLAINTEXT),
            Err(CryptoError::ContextClosed)
        ));
        assert!(matches!(
            a.decrypt_message(&wire),
            Err(SmbError::Crypto(CryptoError::ContextClosed))
        ));
        assert!(matches!(
            a.rotate_keys(
                Zeroizing::new(key(CipherId::Aes128Gcm, 1)),
                Zeroizing::new(key(CipherId::Aes128Gcm, 2)),
            ),
            Err(CryptoError::ContextClosed)
        ));
        // random nonces stay available for teardown messaging
        assert_eq!(a.generate_secure_nonce().len(), GCM_NONCE_LENGTH);
    }

    #[test]
    fn key_store_sees_rotation_and_wipe() {
        let store = RecordingStore::new();
        let cipher = CipherId::Aes128Gcm;
        let a = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, key(cipher, 1), key(cipher, 2))
            .unwrap()
            .with_key_store(store.clone());

        a.rotate_keys(
            Zeroizing::new(key(cipher, 3)),
            Zeroizing::new(key(cipher, 4)),
        )
        .unwrap();
        a.secure_wipe_keys();

        let events = store.events();
        assert_eq!(
            events,
            vec![
                format!("store:{STORE_LABEL_ENCRYPTION}"),
                format!("store:{STORE_LABEL_DECRYPTION}"),
                format!("discard:{STORE_LABEL_ENCRYPTION}"),
                format!("discard:{STORE_LABEL_DECRYPTION}"),
            ]
        );
    }

    #[test]
    fn construction_rejects_wrong_key_length() {
        let err = EncryptionContext::new(
            CipherId::Aes256Gcm,
            Dialect::Smb311,
            SESSION,
            vec![0; 16],
            vec![0; 32],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength { expected: 32, actual: 16 }
        ));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let (a, b) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let wire = a.encrypt_message(&[]).unwrap();
        assert_eq!(wire.len(), TRANSFORM_HEADER_LENGTH);
        assert_eq!(b.decrypt_message(&wire).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn wipe_does_not_leak_across_contexts() {
        let (a, b) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let (c, d) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.secure_wipe_keys();
        b.secure_wipe_keys();
        let wire = c.encrypt_message(PLAINTEXT).unwrap();
        assert_eq!(d.decrypt_message(&wire).unwrap(), PLAINTEXT);
    }

    #[test]
    fn hello_message_scenario() {
        let message = b"Hello, SMB3 Encryption!";
        assert_eq!(message.len(), 23);
        let session = 0x1234_5678_9ABC_DEF0;
        let a = EncryptionContext::new(
            CipherId::Aes128Gcm,
            Dialect::Smb311,
            session,
            vec![0xA1; 16],
            vec![0xB2; 16],
        )
        .unwrap();
        let b = EncryptionContext::new(
            CipherId::Aes128Gcm,
            Dialect::Smb311,
            session,
            vec![0xB2; 16],
            vec![0xA1; 16],
        )
        .unwrap();

        let wire = a.encrypt_message(message).unwrap();
        // 52-byte transform header + 23 ciphertext bytes; the 16-byte tag
        // rides inside the header's signature field
        assert_eq!(wire.len(), 52 + 23);
        let header = TransformHeader::decode(&wire, 0).unwrap();
        assert_eq!(header.original_size, 23);
        assert_eq!(header.session_id, session);
        assert_ne!(header.signature, [0u8; AEAD_TAG_LENGTH]);
        assert_eq!(b.decrypt_message(&wire).unwrap(), message);
    }

    #[test]
    fn rotation_threshold_scenario() {
        let cipher = CipherId::Aes128Gcm;
        let a = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, key(cipher, 1), key(cipher, 2))
            .unwrap()
            .with_session_key(vec![0x5E; 16])
            .with_preauth_hash(vec![0x7A; 64]);
        a.set_key_rotation_bytes_limit(100);

        a.encrypt_message(&[0x11; 50]).unwrap();
        assert_eq!(a.rotation_count(), 0);

        a.encrypt_message(&[0x22; 150]).unwrap();
        assert!(a.rotation_count() > 0);

        a.encrypt_message(&[0x33; 10]).unwrap();
    }

    #[test]
    fn generated_nonces_share_the_encrypt_counter() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.encrypt_message(PLAINTEXT).unwrap();
        let nonce = a.generate_nonce().unwrap();
        assert_eq!(nonce.len(), GCM_NONCE_LENGTH);
        assert_eq!(nonce[12..16], [1, 0, 0, 0]);
        // the encrypt after it skips the handed-out value
        let next = TransformHeader::decode(&a.encrypt_message(PLAINTEXT).unwrap(), 0).unwrap();
        assert_eq!(next.nonce[12..16], [2, 0, 0, 0]);

        let (c, _) = peer_pair(CipherId::Aes256Ccm, Dialect::Smb311);
        let nonce = c.generate_nonce().unwrap();
        assert_eq!(nonce.len(), CCM_NONCE_LENGTH);
        assert_eq!(nonce[..8], [0; 8]);
    }

    #[test]
    fn generated_nonces_respect_exhaustion_and_close() {
        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        a.force_nonce_counter(GCM_COUNTER_MAX + 1);
        assert!(matches!(a.generate_nonce(), Err(CryptoError::NonceExhausted)));
        a.close();
        assert!(matches!(a.generate_nonce(), Err(CryptoError::ContextClosed)));
    }

    #[test]
    fn debug_output_omits_key_material() {
        let cipher = CipherId::Aes128Gcm;
        let a = EncryptionContext::new(cipher, Dialect::Smb311, SESSION, vec![0xA7; 16], vec![0xB9; 16])
            .unwrap()
            .with_session_key(vec![0xC3; 16]);
        let printed = format!("{a:?}");
        assert!(printed.contains("EncryptionContext"));
        assert!(printed.contains("Aes128Gcm"));
        for byte in ["a7", "A7", "b9", "B9", "c3", "C3"] {
            assert!(!printed.contains(&format!("{byte}, {byte}")), "leaked key bytes: {printed}");
        }
    }

    #[test]
    fn concurrent_encrypts_never_repeat_nonces() {
        use std::collections::HashSet;
        use std::thread;

        let (a, _) = peer_pair(CipherId::Aes128Gcm, Dialect::Smb311);
        let a = Arc::new(a);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ctx = Arc::clone(&a);
            handles.push(thread::spawn(move || {
                (0..64)
                    .map(|_| {
                        let wire = ctx.encrypt_message(PLAINTEXT).unwrap();
                        TransformHeader::decode(&wire, 0).unwrap().nonce
                    })
                    .collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(seen.insert(nonce), "nonce repeated under one key");
            }
        }
        assert_eq!(seen.len(), 4 * 64);
    }
}
