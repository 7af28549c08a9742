//!
//! Password-based encryption of keystore content: PBES2 for new stores, PKCS#12 PBE for legacy ones
//!
use cms::cert::x509::spki::AlgorithmIdentifierOwned;
use der::{Any, Decode, Encode};
use pkcs5::pbes2;
use rand::random;
#[cfg(feature = "pbes1")]
use {
    der::{
        Reader, SliceReader, SliceWriter,
        asn1::{OctetString, OctetStringRef},
    },
    legacy::Direction,
};

use crate::{Result, error::Error, keystore::EncryptionAlgorithm, oid};

/// Iteration counts end up as `i32` in the PKCS#12 KDF and in `MacData`
pub(crate) fn iteration_count(iterations: u64) -> Result<i32> {
    match i32::try_from(iterations) {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(Error::InvalidParameters),
    }
}

pub(crate) fn decrypt(alg: &AlgorithmIdentifierOwned, data: &[u8], password: &str) -> Result<Vec<u8>> {
    let params = alg.parameters.as_ref().ok_or(Error::InvalidParameters)?.to_der()?;

    match alg.oid {
        oid::PBES2_OID => {
            let params = pbes2::Parameters::from_der(&params)?;
            params
                .decrypt(password.as_bytes(), data)
                .map_err(|e| Error::Pkcs5Error(e.to_string()))
        }
        #[cfg(feature = "pbes1")]
        oid::PBE_WITH_SHA_AND_40BIT_RC2_CBC_OID | oid::PBE_WITH_SHA_AND3_KEY_TRIPLE_DES_CBC_OID => {
            let mut reader = SliceReader::new(&params)?;
            let (salt, iterations) = reader.sequence(|reader| {
                let salt = OctetString::decode(reader)?.into_bytes();
                let iterations: u64 = reader.decode()?;
                Ok::<_, der::Error>((salt, iterations))
            })?;
            legacy::apply(alg.oid, &salt, iteration_count(iterations)?, Direction::Decrypt, data, password)
        }
        _ => Err(Error::UnsupportedEncryptionScheme),
    }
}

pub(crate) fn encrypt(
    alg: EncryptionAlgorithm,
    iterations: u64,
    data: &[u8],
    password: &str,
) -> Result<(AlgorithmIdentifierOwned, Vec<u8>)> {
    let count = iteration_count(iterations)?;

    match alg {
        EncryptionAlgorithm::PbeWithHmacSha256AndAes256 => {
            let salt: [u8; 32] = random();
            let iv: [u8; 16] = random();
            let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(count.unsigned_abs(), &salt, &iv)
                .map_err(|e| Error::Pkcs5Error(e.to_string()))?;

            let encrypted = params
                .encrypt(password.as_bytes(), data)
                .map_err(|e| Error::Pkcs5Error(e.to_string()))?;

            let alg_id = AlgorithmIdentifierOwned {
                oid: alg.as_oid(),
                parameters: Some(Any::from_der(&params.to_der()?)?),
            };
            Ok((alg_id, encrypted))
        }
        #[cfg(feature = "pbes1")]
        EncryptionAlgorithm::PbeWithShaAnd40BitRc2Cbc | EncryptionAlgorithm::PbeWithShaAnd3KeyTripleDesCbc => {
            let salt: [u8; 20] = random();
            let encrypted = legacy::apply(alg.as_oid(), &salt, count, Direction::Encrypt, data, password)?;

            let salt = OctetStringRef::new(&salt)?;
            let mut buf = [0u8; 64];
            let mut writer = SliceWriter::new(&mut buf);
            writer.sequence((salt.encoded_len()? + iterations.encoded_len()?)?, |writer| {
                salt.encode(writer)?;
                iterations.encode(writer)
            })?;

            let alg_id = AlgorithmIdentifierOwned {
                oid: alg.as_oid(),
                parameters: Some(Any::from_der(writer.finish()?)?),
            };
            Ok((alg_id, encrypted))
        }
        #[cfg(not(feature = "pbes1"))]
        _ => Err(Error::UnsupportedEncryptionScheme),
    }
}

/// PKCS#12 appendix B key derivation feeding a CBC block cipher
#[cfg(feature = "pbes1")]
mod legacy {
    use cbc::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
    use der::oid::ObjectIdentifier;
    use des::TdesEde3;
    use pkcs12::kdf::{self, Pkcs12KeyType};
    use rc2::Rc2;
    use sha1::Sha1;

    use crate::{Result, error::Error, oid};

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Direction {
        Encrypt,
        Decrypt,
    }

    fn run<C>(key: &[u8], iv: &[u8], direction: Direction, data: &[u8]) -> Result<Vec<u8>>
    where
        C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit,
    {
        match direction {
            Direction::Encrypt => Ok(cbc::Encryptor::<C>::new_from_slices(key, iv)
                .map_err(|_| Error::InvalidLength)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            Direction::Decrypt => cbc::Decryptor::<C>::new_from_slices(key, iv)
                .map_err(|_| Error::InvalidLength)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(|_| Error::UnpadError),
        }
    }

    pub fn apply(
        alg: ObjectIdentifier,
        salt: &[u8],
        iterations: i32,
        direction: Direction,
        data: &[u8],
        password: &str,
    ) -> Result<Vec<u8>> {
        let key_len = match alg {
            oid::PBE_WITH_SHA_AND3_KEY_TRIPLE_DES_CBC_OID => 24,
            oid::PBE_WITH_SHA_AND_40BIT_RC2_CBC_OID => 5,
            _ => return Err(Error::UnsupportedEncryptionScheme),
        };

        let key = kdf::derive_key_utf8::<Sha1>(password, salt, Pkcs12KeyType::EncryptionKey, iterations, key_len)?;
        let iv = kdf::derive_key_utf8::<Sha1>(password, salt, Pkcs12KeyType::Iv, iterations, 8)?;

        if key_len == 24 {
            run::<TdesEde3>(&key, &iv, direction, data)
        } else {
            run::<Rc2>(&key, &iv, direction, data)
        }
    }
}
