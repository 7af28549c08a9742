//!
//! Cryptographic provider handed to the verification and keystore stages
//!
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey, rand_core::OsRng};
use uuid::Uuid;

use crate::{Result, keystore::Protection};

/// Source of the primitives and parameters used by [MatchVerifier](crate::MatchVerifier)
/// and [KeystoreWriter](crate::KeystoreWriter).
pub trait CryptoProvider {
    /// Fresh, unique plaintext for one verification round trip
    fn nonce(&self) -> String;

    /// RSA encryption with PKCS#1 v1.5 padding
    fn encrypt(&self, key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// RSA decryption with PKCS#1 v1.5 padding
    fn decrypt(&self, key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Protection applied to keys and keystores written through this provider
    fn protection(&self) -> Protection;
}

/// Provider backed by the RustCrypto `rsa` crate and the operating system RNG
#[derive(Debug, Clone, Default)]
pub struct RustCryptoProvider {
    protection: Protection,
}

impl RustCryptoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protection(protection: Protection) -> Self {
        Self { protection }
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn nonce(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn encrypt(&self, key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)?)
    }

    fn decrypt(&self, key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(key.decrypt(Pkcs1v15Encrypt, ciphertext)?)
    }

    fn protection(&self) -> Protection {
        self.protection
    }
}
