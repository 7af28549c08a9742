use std::{
    collections::{BTreeMap, btree_map::Iter},
    fmt,
};

use cms::content_info::ContentInfo;
use der::{Any, Decode, Encode, asn1::OctetString, oid::ObjectIdentifier};
use pkcs12::{
    authenticated_safe::AuthenticatedSafe,
    pfx::{Pfx, Version},
    safe_bag::SafeBag,
};

use crate::{
    Result,
    cert::Certificate,
    codec::{self, ParsedAuthSafe},
    error::Error,
    key::PrivateKey,
    keychain::PrivateKeyChain,
    oid,
};

/// A bag of a type this crate does not interpret (secret keys, CRLs, ...), carried through unchanged
#[derive(Clone, PartialEq, Eq)]
pub struct OpaqueEntry {
    pub(crate) bag: Vec<u8>,
}

impl OpaqueEntry {
    /// Get the SafeBag in DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.bag
    }
}

impl fmt::Debug for OpaqueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueEntry").field("len", &self.bag.len()).finish()
    }
}

/// KeyStoreEntry represents one entry in the keystore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreEntry {
    PrivateKeyChain(PrivateKeyChain),
    Certificate(Certificate),
    Opaque(OpaqueEntry),
}

/// Keystore entries iterator
pub struct Entries<'a> {
    iter: Iter<'a, String, KeyStoreEntry>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a String, &'a KeyStoreEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// KeyStore holds a dictionary of [KeyStoreEntry] instances indexed by aliases (names)
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: BTreeMap<String, KeyStoreEntry>,
}

impl KeyStore {
    /// Create new empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse keystore from PKCS#12 data.
    ///
    /// The password is checked against the integrity MAC and decrypts the certificate safes.
    /// Private keys stay encrypted under their own entry passwords.
    pub fn from_pkcs12(data: &[u8], password: &str) -> Result<Self> {
        let pfx = Pfx::from_der(data).map_err(|_| Error::UnsupportedFormat)?;

        if pfx.version != Version::V3 {
            return Err(Error::UnsupportedFormat);
        }

        if let Some(mac_data) = pfx.mac_data {
            codec::verify_mac(&mac_data, password, pfx.auth_safe.content.value())?;
        }

        let safes: AuthenticatedSafe = if pfx.auth_safe.content_type == oid::CONTENT_TYPE_DATA_OID {
            AuthenticatedSafe::from_der(&OctetString::from_der(&pfx.auth_safe.content.to_der()?)?.into_bytes())?
        } else {
            return Err(Error::UnsupportedContentType);
        };

        let mut parsed = ParsedAuthSafe::default();
        for safe in safes.iter() {
            parsed.extend(codec::parse_auth_safe(safe, password)?);
        }

        let ParsedAuthSafe { keys, certs, opaque } = parsed;
        let mut keystore = Self::new();

        let find_issuer = |issuer: &str| certs.iter().find(|c| c.cert.subject == issuer && !c.trusted);

        // entries sharing a leaf certificate share its local key id, pair them up in bag order
        let mut claimed = vec![false; certs.len()];

        for key in keys {
            let matches = |i: &usize| certs[*i].local_key_id.as_deref() == Some(key.local_key_id.as_slice());
            let Some(index) = (0..certs.len())
                .filter(matches)
                .find(|i| !claimed[*i])
                .or_else(|| (0..certs.len()).find(matches))
            else {
                log::warn!("Skipping private key without a matching certificate");
                continue;
            };
            claimed[index] = true;
            let leaf = &certs[index];
            let alias = key.friendly_name.clone().unwrap_or_else(|| leaf.cert.subject.clone());

            // chain certificates follow their leaf until the next leaf or trusted certificate
            let mut chain: Vec<Certificate> = std::iter::once(leaf)
                .chain(certs[index + 1..].iter().take_while(|c| c.local_key_id.is_none() && !c.trusted))
                .map(|c| c.cert.clone())
                .collect();

            // a shared issuer may be listed only once, after the first leaf using it
            if chain.len() == 1 {
                let mut current = leaf;
                while current.cert.issuer != current.cert.subject {
                    match find_issuer(&current.cert.issuer) {
                        Some(issuer) if !chain.contains(&issuer.cert) => {
                            chain.push(issuer.cert.clone());
                            current = issuer;
                        }
                        _ => break,
                    }
                }
            }

            log::debug!("Loaded key entry {alias} with {} certificate(s)", chain.len());
            keystore.add_entry(
                &alias,
                KeyStoreEntry::PrivateKeyChain(PrivateKeyChain {
                    sealed_key: key.sealed_key,
                    local_key_id: key.local_key_id.into(),
                    certs: chain,
                }),
            );
        }

        for cert in certs.iter().filter(|c| c.local_key_id.is_none() && c.trusted) {
            let alias = cert.friendly_name.clone().unwrap_or_else(|| cert.cert.subject.clone());
            keystore.add_entry(&alias, KeyStoreEntry::Certificate(cert.cert.clone()));
        }

        for bag in opaque {
            match bag.friendly_name {
                Some(alias) => keystore.add_entry(&alias, KeyStoreEntry::Opaque(OpaqueEntry { bag: bag.bag })),
                None => log::warn!("Dropping unnamed PKCS#12 bag of an unsupported type"),
            }
        }

        Ok(keystore)
    }

    /// Create keystore writer with a given store password
    pub fn writer<'a, 'b>(&'a self, password: &'b str) -> Pkcs12Writer<'a, 'b> {
        Pkcs12Writer {
            keystore: self,
            password,
            protection: Protection::default(),
        }
    }

    /// Get entries iterator
    pub fn entries(&self) -> Entries<'_> {
        let iter = self.entries.iter();
        Entries { iter }
    }

    /// Get an entry for a given alias
    pub fn entry(&self, alias: &str) -> Option<&KeyStoreEntry> {
        self.entries.get(alias)
    }

    /// Get entries count in the keystore
    pub fn entries_len(&self) -> usize {
        self.entries.len()
    }

    /// Add new entry to the keystore, replacing any entry with the same alias
    pub fn add_entry(&mut self, alias: &str, entry: KeyStoreEntry) {
        self.entries.insert(alias.to_owned(), entry);
    }

    /// Delete entry from the keystore
    pub fn delete_entry(&mut self, alias: &str) -> Option<KeyStoreEntry> {
        self.entries.remove(alias)
    }

    /// Get the trusted certificate, or the leaf certificate of a key entry
    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        match self.entry(alias)? {
            KeyStoreEntry::Certificate(cert) => Some(cert),
            KeyStoreEntry::PrivateKeyChain(chain) => chain.certs.first(),
            KeyStoreEntry::Opaque(_) => None,
        }
    }

    /// Get the certificate chain of a key entry
    pub fn certificate_chain(&self, alias: &str) -> Option<&[Certificate]> {
        match self.entry(alias)? {
            KeyStoreEntry::PrivateKeyChain(chain) => Some(chain.certs()),
            _ => None,
        }
    }

    /// Recover the private key of a key entry with its entry password
    pub fn key(&self, alias: &str, password: &str) -> Result<Option<PrivateKey>> {
        match self.entry(alias) {
            Some(KeyStoreEntry::PrivateKeyChain(chain)) => chain.unseal(password).map(Some),
            _ => Ok(None),
        }
    }
}

/// Encryption algorithm to use when creating the PKCS#12 file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum EncryptionAlgorithm {
    PbeWithHmacSha256AndAes256,
    PbeWithShaAnd40BitRc2Cbc,
    PbeWithShaAnd3KeyTripleDesCbc,
}

impl EncryptionAlgorithm {
    pub(crate) fn as_oid(&self) -> ObjectIdentifier {
        match self {
            EncryptionAlgorithm::PbeWithHmacSha256AndAes256 => oid::PBES2_OID,
            EncryptionAlgorithm::PbeWithShaAnd40BitRc2Cbc => oid::PBE_WITH_SHA_AND_40BIT_RC2_CBC_OID,
            EncryptionAlgorithm::PbeWithShaAnd3KeyTripleDesCbc => oid::PBE_WITH_SHA_AND3_KEY_TRIPLE_DES_CBC_OID,
        }
    }
}

/// MAC algorithm to use when creating the PKCS#12 file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha256,
}

/// Algorithms and iteration counts used for newly written keystore content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection {
    pub encryption_algorithm: EncryptionAlgorithm,
    pub encryption_iterations: u64,
    pub mac_algorithm: MacAlgorithm,
    pub mac_iterations: u64,
}

impl Default for Protection {
    // default values are taken from JVM java.security config file
    fn default() -> Self {
        Self {
            encryption_algorithm: EncryptionAlgorithm::PbeWithHmacSha256AndAes256,
            encryption_iterations: 10000,
            mac_algorithm: MacAlgorithm::HmacSha256,
            mac_iterations: 10000,
        }
    }
}

/// PKCS#12 writer
pub struct Pkcs12Writer<'a, 'b> {
    keystore: &'a KeyStore,
    password: &'b str,
    protection: Protection,
}

impl Pkcs12Writer<'_, '_> {
    /// Set algorithms and iterations for the certificate safe and the MAC. Default is [Protection::default]
    pub fn protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    /// Write keystore into PKCS#12 format
    pub fn write(self) -> Result<Vec<u8>> {
        let mut cert_bags = Vec::new();
        let mut key_bags = Vec::new();
        let mut other_bags = Vec::new();

        for (alias, entry) in self.keystore.entries() {
            match entry {
                KeyStoreEntry::Certificate(cert) => {
                    cert_bags.push(codec::certificate_to_safe_bag(cert, alias, None, true)?);
                }
                KeyStoreEntry::PrivateKeyChain(chain) => {
                    // the rest of the chain follows the leaf bag in stored order
                    for (i, cert) in chain.certs.iter().enumerate() {
                        let local_key_id = (i == 0).then(|| chain.local_key_id.as_ref());
                        cert_bags.push(codec::certificate_to_safe_bag(cert, &cert.subject, local_key_id, false)?);
                    }
                    key_bags.push(codec::sealed_key_to_safe_bag(
                        &chain.sealed_key,
                        alias,
                        chain.local_key_id.as_ref(),
                    )?);
                }
                KeyStoreEntry::Opaque(opaque) => {
                    other_bags.push(codec::unwrap_bag_value(SafeBag::from_der(&opaque.bag)?)?);
                }
            }
        }

        let mut safes = vec![codec::cert_bags_to_auth_safe(
            cert_bags,
            self.protection.encryption_algorithm,
            self.protection.encryption_iterations,
            self.password,
        )?];

        key_bags.extend(other_bags);
        if !key_bags.is_empty() {
            safes.push(codec::bags_to_auth_safe(key_bags)?);
        }

        let safe_bags = OctetString::new(safes.to_der()?)?;
        let auth_safe = ContentInfo {
            content_type: oid::CONTENT_TYPE_DATA_OID,
            content: Any::from_der(&safe_bags.to_der()?)?,
        };

        let mac_data = codec::compute_mac(
            auth_safe.content.value(),
            self.protection.mac_algorithm,
            self.protection.mac_iterations,
            self.password,
        )?;

        let pfx = Pfx {
            version: Version::V3,
            auth_safe,
            mac_data: Some(mac_data),
        };

        Ok(pfx.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateChain;

    const CERT_PEM: &[u8] = include_bytes!("../tests/assets/cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("../tests/assets/key.pem");

    fn fixtures() -> (CertificateChain, PrivateKey) {
        let objects = crate::pem::decode(CERT_PEM).unwrap();
        let chain = CertificateChain::new(crate::cert::certificates(&objects).unwrap()).unwrap();
        let keys = crate::key::private_keys(&crate::pem::decode(KEY_PEM).unwrap()).unwrap();
        (chain, keys[0].clone())
    }

    #[test]
    fn test_entry_accessors() {
        let (chain, key) = fixtures();
        let mut store = KeyStore::new();
        assert_eq!(store.entries().count(), 0);

        store.add_entry("ca", KeyStoreEntry::Certificate(chain[1].clone()));
        let sealed = PrivateKeyChain::seal(&key, "secret", &chain, &Protection::default()).unwrap();
        store.add_entry("server", KeyStoreEntry::PrivateKeyChain(sealed));
        assert_eq!(store.entries_len(), 2);

        assert_eq!(store.certificate("ca"), Some(&chain[1]));
        assert_eq!(store.certificate("server"), Some(chain.leaf()));
        assert_eq!(store.certificate_chain("server"), Some(&chain[..]));
        assert!(store.certificate_chain("ca").is_none());

        assert_eq!(store.key("server", "secret").unwrap(), Some(key));
        assert!(matches!(store.key("server", "wrong"), Err(Error::UnrecoverableKey)));
        assert!(store.key("ca", "secret").unwrap().is_none());
        assert!(store.key("missing", "secret").unwrap().is_none());

        assert!(store.delete_entry("ca").is_some());
        assert!(store.entry("ca").is_none());
        assert_eq!(store.entries_len(), 1);
    }

    #[test]
    fn test_empty_store_round_trip() {
        let data = KeyStore::new().writer("changeit").write().unwrap();
        let reloaded = KeyStore::from_pkcs12(&data, "changeit").unwrap();
        assert_eq!(reloaded.entries_len(), 0);
    }

    #[test]
    fn test_wrong_store_password() {
        let data = KeyStore::new().writer("changeit").write().unwrap();
        assert!(matches!(
            KeyStore::from_pkcs12(&data, "wrong"),
            Err(Error::KeystoreAuthError)
        ));
    }

    #[test]
    fn test_opaque_bag_survives_round_trip() {
        let mut attributes = cms::cert::x509::attr::Attributes::new();
        attributes
            .insert(codec::string_attribute(oid::FRIENDLY_NAME_OID, "secret").unwrap())
            .unwrap();
        let bag = SafeBag {
            bag_id: ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.5"),
            bag_value: OctetString::new(vec![1u8, 2, 3, 4]).unwrap().to_der().unwrap(),
            bag_attributes: Some(attributes),
        };
        let opaque = OpaqueEntry {
            bag: bag.to_der().unwrap(),
        };

        let mut store = KeyStore::new();
        store.add_entry("secret", KeyStoreEntry::Opaque(opaque.clone()));
        let data = store.writer("changeit").write().unwrap();

        let reloaded = KeyStore::from_pkcs12(&data, "changeit").unwrap();
        assert_eq!(reloaded.entry("secret"), Some(&KeyStoreEntry::Opaque(opaque)));
        assert!(reloaded.certificate("secret").is_none());
    }

    #[test]
    fn test_iterations_out_of_range() {
        let (chain, key) = fixtures();
        let too_many = (1u64 << 32) + 5;

        let mut store = KeyStore::new();
        store.add_entry("ca", KeyStoreEntry::Certificate(chain[1].clone()));

        for protection in [
            Protection {
                mac_iterations: too_many,
                ..Protection::default()
            },
            Protection {
                encryption_iterations: too_many,
                ..Protection::default()
            },
            Protection {
                mac_iterations: 0,
                ..Protection::default()
            },
        ] {
            assert!(matches!(
                store.writer("changeit").protection(protection).write(),
                Err(Error::InvalidParameters)
            ));
        }

        let protection = Protection {
            encryption_iterations: i32::MAX as u64 + 1,
            ..Protection::default()
        };
        assert!(matches!(
            PrivateKeyChain::seal(&key, "secret", &chain, &protection),
            Err(Error::InvalidParameters)
        ));
    }

    #[test]
    fn test_not_a_keystore() {
        assert!(matches!(
            KeyStore::from_pkcs12(CERT_PEM, "changeit"),
            Err(Error::UnsupportedFormat)
        ));
    }
}
