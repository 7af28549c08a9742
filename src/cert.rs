use std::{fmt, ops::Deref};

use crate::{
    Result,
    error::Error,
    pem::{CERTIFICATE_LABEL, PemObject},
};

/// X.509 certificate wrapper
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    pub(crate) data: Vec<u8>,
    pub(crate) subject: String,
    pub(crate) issuer: String,
    pub(crate) public_key: Vec<u8>,
}

impl Certificate {
    /// Create certificate from DER encoding
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)?;
        Ok(Self {
            data: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            public_key: cert.public_key().raw.to_vec(),
        })
    }

    /// Create certificate from a PEM block labelled `CERTIFICATE`
    pub fn from_pem(object: &PemObject) -> Result<Self> {
        if object.label() != CERTIFICATE_LABEL {
            return Err(Error::UnexpectedPemLabel(object.label().to_owned()));
        }
        Self::from_der(object.bytes())
    }

    /// Get certificate subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get certificate issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Get the SubjectPublicKeyInfo in DER encoding
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Get certificate data in DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("data", &"<X.509>")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Parse all `CERTIFICATE` blocks, keeping their order and skipping other labels.
pub fn certificates(objects: &[PemObject]) -> Result<Vec<Certificate>> {
    objects
        .iter()
        .filter(|o| o.label() == CERTIFICATE_LABEL)
        .map(Certificate::from_pem)
        .collect()
}

/// Non-empty, leaf-first list of certificates in the order they were read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain(Vec<Certificate>);

impl CertificateChain {
    pub fn new<I>(certs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Certificate>,
    {
        let certs: Vec<_> = certs.into_iter().collect();
        if certs.is_empty() {
            return Err(Error::EmptyCertificateChain);
        }
        Ok(Self(certs))
    }

    /// The end-entity certificate
    pub fn leaf(&self) -> &Certificate {
        &self.0[0]
    }

    pub fn into_vec(self) -> Vec<Certificate> {
        self.0
    }
}

impl Deref for CertificateChain {
    type Target = [Certificate];

    fn deref(&self) -> &[Certificate] {
        &self.0
    }
}

impl TryFrom<Vec<Certificate>> for CertificateChain {
    type Error = Error;

    fn try_from(certs: Vec<Certificate>) -> Result<Self> {
        Self::new(certs)
    }
}
