use pem_keystore::{
    Certificate, CryptoProvider, MatchVerifier, PrivateKey, Protection, RustCryptoProvider, certificates,
    error::Error, pem, private_keys,
};
use rsa::{RsaPrivateKey, RsaPublicKey};

const CERT_PEM: &[u8] = include_bytes!("../tests/assets/cert.pem");
const KEY_PEM: &[u8] = include_bytes!("../tests/assets/key.pem");
const OTHER_KEY_PEM: &[u8] = include_bytes!("../tests/assets/other-key.pem");

fn chain() -> Vec<Certificate> {
    certificates(&pem::decode(CERT_PEM).unwrap()).unwrap()
}

fn key(data: &[u8]) -> PrivateKey {
    private_keys(&pem::decode(data).unwrap()).unwrap().remove(0)
}

/// Always hands out the same nonce
struct FixedNonceProvider(RustCryptoProvider);

impl CryptoProvider for FixedNonceProvider {
    fn nonce(&self) -> String {
        "00000000-0000-4000-8000-000000000000".to_owned()
    }

    fn encrypt(&self, key: &RsaPublicKey, plaintext: &[u8]) -> pem_keystore::Result<Vec<u8>> {
        self.0.encrypt(key, plaintext)
    }

    fn decrypt(&self, key: &RsaPrivateKey, ciphertext: &[u8]) -> pem_keystore::Result<Vec<u8>> {
        self.0.decrypt(key, ciphertext)
    }

    fn protection(&self) -> Protection {
        self.0.protection()
    }
}

#[test]
fn test_matching_key() {
    let provider = RustCryptoProvider::new();
    let verifier = MatchVerifier::new(&provider);

    verifier.verify(&chain()[0], &key(KEY_PEM)).unwrap();
}

#[test]
fn test_unrelated_key() {
    let provider = RustCryptoProvider::new();
    let verifier = MatchVerifier::new(&provider);

    assert!(matches!(
        verifier.verify(&chain()[0], &key(OTHER_KEY_PEM)),
        Err(Error::KeyCertificateMismatch)
    ));
}

#[test]
fn test_key_against_issuer_certificate() {
    let provider = RustCryptoProvider::new();

    assert!(matches!(
        MatchVerifier::new(&provider).verify(&chain()[1], &key(KEY_PEM)),
        Err(Error::KeyCertificateMismatch)
    ));
}

#[test]
fn test_fixed_nonce_is_deterministic() {
    let provider = FixedNonceProvider(RustCryptoProvider::new());
    let verifier = MatchVerifier::new(&provider);

    for _ in 0..3 {
        verifier.verify(&chain()[0], &key(KEY_PEM)).unwrap();
    }
    assert!(verifier.verify(&chain()[0], &key(OTHER_KEY_PEM)).is_err());
}

#[test]
fn test_nonces_are_unique() {
    let provider = RustCryptoProvider::new();
    assert_ne!(provider.nonce(), provider.nonce());
    assert_eq!(provider.nonce().len(), 36);
}

#[test]
fn test_provider_as_trait_object() {
    let provider: Box<dyn CryptoProvider> = Box::new(RustCryptoProvider::new());
    MatchVerifier::new(provider.as_ref())
        .verify(&chain()[0], &key(KEY_PEM))
        .unwrap();
}
