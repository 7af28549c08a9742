//!
//! End-to-end import of PEM files into a keystore
//!
use std::path::{Path, PathBuf};

use crate::{
    Result,
    cert::{self, CertificateChain},
    error::Error,
    key::{self, PrivateKey},
    pem,
    provider::CryptoProvider,
    verify::MatchVerifier,
    writer::KeystoreWriter,
};

/// Alias used when none is given
pub const DEFAULT_ALIAS: &str = "item";

/// Inputs of one import run
#[derive(Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub cert_path: PathBuf,
    pub key_path: Option<PathBuf>,
    pub store_path: PathBuf,
    pub store_password: String,
    pub alias: String,
    pub alias_password: String,
}

impl ImportRequest {
    /// Request with the default alias and empty passwords
    pub fn new<C: Into<PathBuf>, S: Into<PathBuf>>(cert_path: C, store_path: S) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: None,
            store_path: store_path.into(),
            store_password: String::new(),
            alias: DEFAULT_ALIAS.to_owned(),
            alias_password: String::new(),
        }
    }

    pub fn key_path<K: Into<PathBuf>>(mut self, key_path: K) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn store_password<S: Into<String>>(mut self, password: S) -> Self {
        self.store_password = password.into();
        self
    }

    pub fn alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn alias_password<S: Into<String>>(mut self, password: S) -> Self {
        self.alias_password = password.into();
        self
    }
}

impl std::fmt::Debug for ImportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportRequest")
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("store_path", &self.store_path)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

/// Read every `CERTIFICATE` block of a PEM file, in file order
pub fn read_certificate_chain<P: AsRef<Path>>(path: P) -> Result<Vec<cert::Certificate>> {
    log::info!("Reading certificate file");
    cert::certificates(&pem::read_file(path)?)
}

/// Read every private key block of a PEM file, in file order
pub fn read_private_keys<P: AsRef<Path>>(path: P) -> Result<Vec<PrivateKey>> {
    log::info!("Reading key file");
    key::private_keys(&pem::read_file(path)?)
}

/// Decode, verify and store. Nothing is written unless every earlier step succeeds.
pub fn run<P: CryptoProvider + ?Sized>(request: &ImportRequest, provider: &P) -> Result<()> {
    let certs = read_certificate_chain(&request.cert_path)?;

    let keys = match &request.key_path {
        Some(path) => Some(read_private_keys(path)?),
        None => None,
    };

    let chain = CertificateChain::new(certs)?;

    let key = match keys {
        Some(keys) => {
            if keys.len() > 1 {
                log::debug!("Using the first of {} private keys", keys.len());
            }
            Some(keys.into_iter().next().ok_or(Error::EmptyKeyFile)?)
        }
        None => None,
    };

    if let Some(key) = &key {
        MatchVerifier::new(provider).verify(chain.leaf(), key)?;
    }

    KeystoreWriter::new(provider).add_entry(
        &request.store_path,
        &request.store_password,
        &request.alias,
        &request.alias_password,
        &chain,
        key.as_ref(),
    )
}
