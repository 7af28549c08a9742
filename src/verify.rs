use rsa::{RsaPublicKey, pkcs8::DecodePublicKey};

use crate::{Result, cert::Certificate, error::Error, key::PrivateKey, provider::CryptoProvider};

/// Proves that a private key belongs to a certificate by an encrypt/decrypt round trip
pub struct MatchVerifier<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: CryptoProvider + ?Sized> MatchVerifier<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Encrypts a fresh nonce under the certificate public key and expects `key` to decrypt it.
    ///
    /// Every failure, cryptographic or not, is reported as [Error::KeyCertificateMismatch].
    pub fn verify(&self, certificate: &Certificate, key: &PrivateKey) -> Result<()> {
        log::info!("Verifying certificate against key");

        let expected = self.provider.nonce();
        match self.round_trip(certificate, key, &expected) {
            Ok(actual) if actual == expected => Ok(()),
            Ok(_) => Err(Error::KeyCertificateMismatch),
            Err(e) => {
                log::debug!("Verification of {} failed: {e}", certificate.subject());
                Err(Error::KeyCertificateMismatch)
            }
        }
    }

    fn round_trip(&self, certificate: &Certificate, key: &PrivateKey, nonce: &str) -> Result<String> {
        let public_key = RsaPublicKey::from_public_key_der(certificate.public_key())
            .map_err(|e| Error::MalformedKey(e.to_string()))?;

        let ciphertext = self.provider.encrypt(&public_key, nonce.as_bytes())?;
        let plaintext = self.provider.decrypt(key.rsa(), &ciphertext)?;

        String::from_utf8(plaintext).map_err(|_| Error::KeyCertificateMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cert, key, keystore::Protection, pem, provider::RustCryptoProvider};

    const CERT_PEM: &[u8] = include_bytes!("../tests/assets/cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("../tests/assets/key.pem");

    /// Decrypts to a different plaintext than it was asked to encrypt
    struct TamperingProvider(RustCryptoProvider);

    impl CryptoProvider for TamperingProvider {
        fn nonce(&self) -> String {
            "fixed-nonce".to_owned()
        }

        fn encrypt(&self, key: &RsaPublicKey, _plaintext: &[u8]) -> Result<Vec<u8>> {
            self.0.encrypt(key, b"something else")
        }

        fn decrypt(&self, key: &rsa::RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
            self.0.decrypt(key, ciphertext)
        }

        fn protection(&self) -> Protection {
            self.0.protection()
        }
    }

    #[test]
    fn test_plaintext_must_round_trip() {
        let certs = cert::certificates(&pem::decode(CERT_PEM).unwrap()).unwrap();
        let keys = key::private_keys(&pem::decode(KEY_PEM).unwrap()).unwrap();

        let provider = RustCryptoProvider::new();
        MatchVerifier::new(&provider).verify(&certs[0], &keys[0]).unwrap();

        let tampering = TamperingProvider(provider);
        assert!(matches!(
            MatchVerifier::new(&tampering).verify(&certs[0], &keys[0]),
            Err(Error::KeyCertificateMismatch)
        ));
    }
}
