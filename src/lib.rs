//!
//! Import PEM-encoded X.509 certificate chains and RSA private keys into password-protected
//! PKCS#12 keystores, readable by Java `keytool` and `openssl pkcs12`.
//!
//! The import runs in stages, each of which is usable on its own:
//!
//! * [pem::decode] splits a PEM file into [PemObject] blocks
//! * [Certificate::from_pem] and [PrivateKey::from_pem] parse those blocks
//! * [MatchVerifier] proves that a private key belongs to the leaf certificate
//! * [KeystoreWriter] loads or creates a keystore, inserts the entry and saves it atomically
//!
//! [import::run] chains them together for one [import::ImportRequest].
//!
//! Each entry in the keystore is accessed by 'alias'. A key entry holds the private key,
//! sealed under its own entry password, and the certificate chain with the leaf first.
//! A certificate entry holds a single trusted certificate.
//!
//! Supported encryption schemes:
//!
//! * [EncryptionAlgorithm::PbeWithHmacSha256AndAes256] - the default for new content
//! * [EncryptionAlgorithm::PbeWithShaAnd3KeyTripleDesCbc] - legacy, requires the `pbes1` feature
//! * [EncryptionAlgorithm::PbeWithShaAnd40BitRc2Cbc] - legacy, requires the `pbes1` feature
//!
//! Supported MAC algorithms: [MacAlgorithm::HmacSha1], [MacAlgorithm::HmacSha256]
//!

mod cert;
mod codec;
pub mod error;
pub mod import;
mod key;
mod keychain;
mod keystore;
mod oid;
mod pbe;
pub mod pem;
pub mod provider;
mod verify;
mod writer;

use std::fmt;

/// Result type for import and keystore operations
pub type Result<T> = std::result::Result<T, error::Error>;

pub use cert::{Certificate, CertificateChain, certificates};
pub use key::{PrivateKey, private_keys};
pub use keychain::PrivateKeyChain;
pub use keystore::{
    EncryptionAlgorithm, KeyStore, KeyStoreEntry, MacAlgorithm, OpaqueEntry, Pkcs12Writer, Protection,
};
pub use pem::PemObject;
pub use provider::{CryptoProvider, RustCryptoProvider};
pub use verify::MatchVerifier;
pub use writer::{KeystoreWriter, open_keystore};

/// Links a private key bag to the certificate bag of its leaf certificate
#[derive(Clone, PartialEq, Eq)]
pub struct LocalKeyId(pub Vec<u8>);

impl From<Vec<u8>> for LocalKeyId {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for LocalKeyId {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl AsRef<[u8]> for LocalKeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for LocalKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalKeyId").field(&hex::encode(&self.0)).finish()
    }
}
