use std::fmt;

use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey},
};

use crate::{
    Result,
    error::Error,
    pem::{PKCS8_KEY_LABEL, PemObject, RSA_KEY_LABEL},
};

/// RSA private key, kept in PKCS#8 DER form next to the decoded key material
#[derive(Clone)]
pub struct PrivateKey {
    pub(crate) data: Vec<u8>,
    pub(crate) key: RsaPrivateKey,
}

impl PrivateKey {
    /// Parses a PKCS#8 RSA private key encoded in DER format.
    pub fn from_pkcs8_der(data: &[u8]) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_der(data).map_err(|e| Error::MalformedKey(e.to_string()))?;
        Ok(Self {
            data: data.to_vec(),
            key,
        })
    }

    /// Parses a legacy PKCS#1 `RSAPrivateKey` and re-encodes it as PKCS#8.
    pub fn from_pkcs1_der(data: &[u8]) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_der(data).map_err(|e| Error::MalformedKey(e.to_string()))?;
        let pkcs8 = key.to_pkcs8_der().map_err(|e| Error::MalformedKey(e.to_string()))?;
        Ok(Self {
            data: pkcs8.as_bytes().to_vec(),
            key,
        })
    }

    /// Parses a `PRIVATE KEY` or `RSA PRIVATE KEY` PEM block.
    ///
    /// PKCS#8 is tried first for both labels, so PKCS#8 payloads mislabelled as
    /// `RSA PRIVATE KEY` are accepted as well as the real PKCS#1 layout.
    pub fn from_pem(object: &PemObject) -> Result<Self> {
        match object.label() {
            PKCS8_KEY_LABEL => Self::from_pkcs8_der(object.bytes()),
            RSA_KEY_LABEL => Self::from_pkcs8_der(object.bytes()).or_else(|_| Self::from_pkcs1_der(object.bytes())),
            other => Err(Error::UnexpectedPemLabel(other.to_owned())),
        }
    }

    /// Returns a reference to the private key data in PKCS#8 DER-encoded format.
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }

    /// Decoded RSA key material
    pub fn rsa(&self) -> &RsaPrivateKey {
        &self.key
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("data", &"<PKCS#8>").finish()
    }
}

/// Parse all private key blocks, keeping their order and skipping other labels.
pub fn private_keys(objects: &[PemObject]) -> Result<Vec<PrivateKey>> {
    objects
        .iter()
        .filter(|o| matches!(o.label(), PKCS8_KEY_LABEL | RSA_KEY_LABEL))
        .map(PrivateKey::from_pem)
        .collect()
}
