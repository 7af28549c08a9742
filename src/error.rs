//!
//! [Error] enum definition
//!
use std::io;

use x509_parser::error::X509Error;

/// Possible errors for import and keystore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error(transparent)]
    DerError(#[from] der::Error),

    #[error("Malformed PEM data: {0}")]
    MalformedPem(#[source] ::pem::PemError),

    #[error("PEM block {0} has no END line")]
    UnterminatedPem(String),

    #[error("Unexpected PEM label {0}")]
    UnexpectedPemLabel(String),

    #[error("Malformed certificate: {0}")]
    MalformedCertificate(#[from] x509_parser::nom::Err<X509Error>),

    #[error("Malformed private key: {0}")]
    MalformedKey(String),

    #[error("No certificates found")]
    EmptyCertificateChain,

    #[error("No keys found")]
    EmptyKeyFile,

    #[error("Private key does not match the certificate")]
    KeyCertificateMismatch,

    #[error("Keystore password is incorrect or the keystore is corrupted")]
    KeystoreAuthError,

    #[error("Not a PKCS#12 keystore")]
    UnsupportedFormat,

    #[error("Cannot recover private key: wrong key password or corrupted entry")]
    UnrecoverableKey,

    #[error("Unsupported ContentType")]
    UnsupportedContentType,

    #[error("Unsupported certificate type")]
    UnsupportedCertificateType,

    #[error("Invalid length")]
    InvalidLength,

    #[error("Unpad error")]
    UnpadError,

    #[error("Invalid parameters")]
    InvalidParameters,

    #[error("Unsupported encryption scheme")]
    UnsupportedEncryptionScheme,

    #[error("{0}")]
    Pkcs5Error(String),

    #[error(transparent)]
    RsaError(#[from] rsa::Error),
}
