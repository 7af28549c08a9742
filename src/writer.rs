//!
//! Creating and updating keystore files on disk
//!
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::{
    Result,
    cert::CertificateChain,
    key::PrivateKey,
    keychain::PrivateKeyChain,
    keystore::{KeyStore, KeyStoreEntry},
    provider::CryptoProvider,
};

/// Load the keystore at `path`. A missing or empty file yields a new empty keystore.
pub fn open_keystore<P: AsRef<Path>>(path: P, password: &str) -> Result<KeyStore> {
    let data = match fs::read(path.as_ref()) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if data.is_empty() {
        log::debug!("No keystore at {}, starting a new one", path.as_ref().display());
        return Ok(KeyStore::new());
    }
    KeyStore::from_pkcs12(&data, password)
}

/// Replace the file at `path` with `data` through a temporary file in the same directory
fn persist<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Inserts certificate and key entries into keystore files
pub struct KeystoreWriter<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: CryptoProvider + ?Sized> KeystoreWriter<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Store `chain` under `alias`, together with `key` when one is given, and save the keystore.
    ///
    /// With a key the entry holds the whole chain and the key sealed under `alias_password`.
    /// Without a key only the leaf certificate is stored as a trusted certificate entry.
    /// An existing entry with the same alias is replaced; every other entry is kept.
    pub fn add_entry<S: AsRef<Path>>(
        &self,
        store_path: S,
        store_password: &str,
        alias: &str,
        alias_password: &str,
        chain: &CertificateChain,
        key: Option<&PrivateKey>,
    ) -> Result<()> {
        let protection = self.provider.protection();

        log::info!("Loading keystore");
        let mut keystore = open_keystore(store_path.as_ref(), store_password)?;

        match key {
            Some(key) => {
                log::info!("Adding key & cert chain entry to keystore");
                let entry = PrivateKeyChain::seal(key, alias_password, chain, &protection)?;
                keystore.add_entry(alias, KeyStoreEntry::PrivateKeyChain(entry));
            }
            None => {
                log::info!("Adding certificate entry to keystore");
                if chain.len() > 1 {
                    log::warn!(
                        "Certificate entry {alias} keeps only the leaf certificate, {} more certificate(s) dropped",
                        chain.len() - 1
                    );
                }
                keystore.add_entry(alias, KeyStoreEntry::Certificate(chain.leaf().clone()));
            }
        }

        let data = keystore.writer(store_password).protection(protection).write()?;

        log::info!("Saving keystore");
        persist(store_path, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.p12");

        assert_eq!(open_keystore(&path, "changeit").unwrap().entries_len(), 0);

        fs::write(&path, b"").unwrap();
        assert_eq!(open_keystore(&path, "changeit").unwrap().entries_len(), 0);
    }

    #[test]
    fn test_persist_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        fs::write(&path, b"old").unwrap();
        persist(&path, b"new contents").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new contents");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
