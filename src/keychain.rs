use std::fmt;

use der::{Decode, Encode, asn1::OctetString};
use pkcs12::pbe_params::EncryptedPrivateKeyInfo;
use sha1::{Digest, Sha1};

use crate::{
    LocalKeyId, Result,
    cert::{Certificate, CertificateChain},
    error::Error,
    key::PrivateKey,
    keystore::Protection,
    pbe,
};

/// PrivateKeyChain represents a password-protected private key and its certificate chain.
///
/// The key stays encrypted under its entry password (a PKCS#8 `EncryptedPrivateKeyInfo`)
/// for as long as the chain lives in a keystore; [PrivateKeyChain::unseal] recovers it.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyChain {
    pub(crate) sealed_key: Vec<u8>,
    pub(crate) local_key_id: LocalKeyId,
    pub(crate) certs: Vec<Certificate>,
}

impl PrivateKeyChain {
    /// Encrypts `key` under `password` and binds it to `chain`.
    /// The local key id is the SHA-1 digest of the leaf certificate.
    pub fn seal(key: &PrivateKey, password: &str, chain: &CertificateChain, protection: &Protection) -> Result<Self> {
        let (encryption_algorithm, encrypted) = pbe::encrypt(
            protection.encryption_algorithm,
            protection.encryption_iterations,
            key.as_der(),
            password,
        )?;

        let sealed_key = EncryptedPrivateKeyInfo {
            encryption_algorithm,
            encrypted_data: OctetString::new(encrypted)?,
        }
        .to_der()?;

        Ok(Self {
            sealed_key,
            local_key_id: Sha1::digest(chain.leaf().as_der()).to_vec().into(),
            certs: chain.to_vec(),
        })
    }

    /// Decrypts the private key with the entry password
    pub fn unseal(&self, password: &str) -> Result<PrivateKey> {
        let info = EncryptedPrivateKeyInfo::from_der(&self.sealed_key)?;
        let plain = pbe::decrypt(&info.encryption_algorithm, info.encrypted_data.as_bytes(), password)
            .map_err(|_| Error::UnrecoverableKey)?;
        PrivateKey::from_pkcs8_der(&plain).map_err(|_| Error::UnrecoverableKey)
    }

    /// Get certificates, leaf first
    pub fn certs(&self) -> &[Certificate] {
        &self.certs
    }

    /// Get local key id
    pub fn local_key_id(&self) -> &LocalKeyId {
        &self.local_key_id
    }
}

impl fmt::Debug for PrivateKeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyChain")
            .field("key", &"<sealed>")
            .field("certs", &self.certs)
            .field("local_key_id", &self.local_key_id)
            .finish()
    }
}
