use cms::{
    cert::x509::{
        attr::{Attribute, AttributeValue, Attributes},
        spki::AlgorithmIdentifierOwned,
    },
    content_info::{CmsVersion, ContentInfo},
    encrypted_data::EncryptedData,
    enveloped_data::EncryptedContentInfo,
};
use der::{
    Any, Decode, Encode,
    asn1::{BmpString, ContextSpecific, ObjectIdentifier, OctetString, OctetStringRef, SetOfVec},
};
use hmac::{Hmac, Mac};
use pkcs12::{
    cert_type::CertBag, digest_info::DigestInfo, kdf, mac_data::MacData,
    safe_bag::{SafeBag, SafeContents},
};
use rand::random;
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::{
    Result,
    cert::Certificate,
    error::Error,
    keystore::{EncryptionAlgorithm, MacAlgorithm},
    oid, pbe,
};

pub struct ParsedKey {
    pub friendly_name: Option<String>,
    pub local_key_id: Vec<u8>,
    pub sealed_key: Vec<u8>,
}

pub struct ParsedCertificate {
    pub friendly_name: Option<String>,
    pub local_key_id: Option<Vec<u8>>,
    pub trusted: bool,
    pub cert: Certificate,
}

pub struct ParsedOpaque {
    pub friendly_name: Option<String>,
    pub bag: Vec<u8>,
}

#[derive(Default)]
pub struct ParsedAuthSafe {
    pub keys: Vec<ParsedKey>,
    pub certs: Vec<ParsedCertificate>,
    pub opaque: Vec<ParsedOpaque>,
}

impl ParsedAuthSafe {
    pub fn extend(&mut self, other: ParsedAuthSafe) {
        self.keys.extend(other.keys);
        self.certs.extend(other.certs);
        self.opaque.extend(other.opaque);
    }
}

fn hmac_sha1(data: &[u8], salt: &[u8], iterations: i32, password: &str) -> Result<Hmac<Sha1>> {
    let key = kdf::derive_key_utf8::<Sha1>(
        password,
        salt,
        kdf::Pkcs12KeyType::Mac,
        iterations,
        Sha1::output_size(),
    )?;
    let mut hmac = Hmac::<Sha1>::new_from_slice(&key).map_err(|_| Error::InvalidLength)?;
    hmac.update(data);
    Ok(hmac)
}

fn hmac_sha256(data: &[u8], salt: &[u8], iterations: i32, password: &str) -> Result<Hmac<Sha256>> {
    let key = kdf::derive_key_utf8::<Sha256>(
        password,
        salt,
        kdf::Pkcs12KeyType::Mac,
        iterations,
        Sha256::output_size(),
    )?;
    let mut hmac = Hmac::<Sha256>::new_from_slice(&key).map_err(|_| Error::InvalidLength)?;
    hmac.update(data);
    Ok(hmac)
}

/// Checks the store password against the PFX integrity MAC
pub fn verify_mac(mac_data: &MacData, password: &str, data: &[u8]) -> Result<()> {
    let salt = mac_data.mac_salt.as_bytes();
    let iterations = mac_data.iterations;
    let expected = mac_data.mac.digest.as_bytes();

    let verified = match mac_data.mac.algorithm.oid {
        oid::SHA1_OID => hmac_sha1(data, salt, iterations, password)?.verify_slice(expected),
        oid::SHA256_OID => hmac_sha256(data, salt, iterations, password)?.verify_slice(expected),
        _ => return Err(Error::UnsupportedEncryptionScheme),
    };
    verified.map_err(|_| Error::KeystoreAuthError)
}

pub fn compute_mac(data: &[u8], algorithm: MacAlgorithm, iterations: u64, password: &str) -> Result<MacData> {
    let iterations = pbe::iteration_count(iterations)?;
    let (oid, salt, digest) = match algorithm {
        MacAlgorithm::HmacSha1 => {
            let salt: [u8; 20] = random();
            let hmac = hmac_sha1(data, &salt, iterations, password)?;
            (oid::SHA1_OID, salt.to_vec(), hmac.finalize().into_bytes().to_vec())
        }
        MacAlgorithm::HmacSha256 => {
            let salt: [u8; 32] = random();
            let hmac = hmac_sha256(data, &salt, iterations, password)?;
            (oid::SHA256_OID, salt.to_vec(), hmac.finalize().into_bytes().to_vec())
        }
    };

    Ok(MacData {
        mac: DigestInfo {
            algorithm: AlgorithmIdentifierOwned { oid, parameters: None },
            digest: OctetString::new(digest)?,
        },
        mac_salt: OctetString::new(salt)?,
        iterations,
    })
}

/// Decode one ContentInfo of the authenticated safe, decrypting it with the store password if needed
pub fn parse_auth_safe(safe: &ContentInfo, password: &str) -> Result<ParsedAuthSafe> {
    let data = match safe.content_type {
        oid::CONTENT_TYPE_DATA_OID => OctetString::from_der(&safe.content.to_der()?)?.into_bytes(),
        oid::CONTENT_TYPE_ENCRYPTED_DATA_OID => {
            let enc_data = EncryptedData::from_der(&safe.content.to_der()?)?;
            match enc_data.enc_content_info.encrypted_content.as_ref() {
                Some(data) => pbe::decrypt(&enc_data.enc_content_info.content_enc_alg, data.as_bytes(), password)
                    .map_err(|_| Error::KeystoreAuthError)?,
                None => Vec::new(),
            }
        }
        _ => return Err(Error::UnsupportedContentType),
    };

    if data.is_empty() {
        return Ok(ParsedAuthSafe::default());
    }
    parse_bags(SafeContents::from_der(&data)?)
}

fn get_bag_attribute(oid: &ObjectIdentifier, bag: &SafeBag) -> Option<Vec<u8>> {
    bag.bag_attributes.as_ref().and_then(|attrs| {
        attrs
            .iter()
            .find(|a| a.oid == *oid)
            .and_then(|a| a.values.iter().next())
            .and_then(|v| v.to_der().ok())
    })
}

/// Decoded bags carry the `[0]` wrapper in `bag_value` while encoding adds it again,
/// so a bag must be unwrapped before it can be written back.
pub fn unwrap_bag_value(bag: SafeBag) -> Result<SafeBag> {
    Ok(SafeBag {
        bag_value: Any::from_der(&bag.bag_value)?.value().to_vec(),
        ..bag
    })
}

fn parse_bags(bags: SafeContents) -> Result<ParsedAuthSafe> {
    let mut parsed = ParsedAuthSafe::default();

    for bag in bags {
        let local_key_id = get_bag_attribute(&oid::LOCAL_KEY_ID_OID, &bag)
            .and_then(|a| OctetString::from_der(&a).ok().map(OctetString::into_bytes));

        let friendly_name = get_bag_attribute(&oid::FRIENDLY_NAME_OID, &bag)
            .and_then(|n| BmpString::from_der(&n).ok().map(|a| a.to_string()));

        match bag.bag_id {
            oid::PKCS_12_CERT_BAG_OID => {
                let trusted = get_bag_attribute(&oid::ORACLE_TRUSTED_KEY_USAGE_OID, &bag)
                    .and_then(|n| ObjectIdentifier::from_der(&n).ok())
                    .is_some_and(|o| o == oid::ANY_EXTENDED_USAGE_OID);

                let cs: ContextSpecific<CertBag> = ContextSpecific::from_der(&bag.bag_value)?;
                if cs.value.cert_id != oid::CERT_TYPE_X509_CERTIFICATE_OID {
                    return Err(Error::UnsupportedCertificateType);
                }
                parsed.certs.push(ParsedCertificate {
                    friendly_name,
                    local_key_id,
                    trusted,
                    cert: Certificate::from_der(cs.value.cert_value.as_bytes())?,
                });
            }
            oid::PKCS_12_SHROUDED_KEY_BAG_OID => match local_key_id {
                Some(local_key_id) => parsed.keys.push(ParsedKey {
                    friendly_name,
                    local_key_id,
                    sealed_key: Any::from_der(&bag.bag_value)?.value().to_vec(),
                }),
                None => log::warn!("Skipping private key bag without a local key id"),
            },
            _ => parsed.opaque.push(ParsedOpaque {
                friendly_name,
                bag: unwrap_bag_value(bag)?.to_der()?,
            }),
        }
    }

    Ok(parsed)
}

pub(crate) fn string_attribute(oid: ObjectIdentifier, value: &str) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::<AttributeValue>::from_iter([Any::from_der(&BmpString::from_utf8(value)?.to_der()?)?])?,
    })
}

fn octets_attribute(oid: ObjectIdentifier, value: &[u8]) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::<AttributeValue>::from_iter([Any::from_der(&OctetStringRef::new(value)?.to_der()?)?])?,
    })
}

pub fn certificate_to_safe_bag(
    certificate: &Certificate,
    friendly_name: &str,
    local_key_id: Option<&[u8]>,
    trusted: bool,
) -> Result<SafeBag> {
    let mut bag_attributes = Attributes::new();

    bag_attributes.insert(string_attribute(oid::FRIENDLY_NAME_OID, friendly_name)?)?;

    if let Some(local_key_id) = local_key_id {
        bag_attributes.insert(octets_attribute(oid::LOCAL_KEY_ID_OID, local_key_id)?)?;
    }

    if trusted {
        bag_attributes.insert(Attribute {
            oid: oid::ORACLE_TRUSTED_KEY_USAGE_OID,
            values: SetOfVec::<AttributeValue>::from_iter([Any::from_der(&oid::ANY_EXTENDED_USAGE_OID.to_der()?)?])?,
        })?;
    }

    let cert_bag = CertBag {
        cert_id: oid::CERT_TYPE_X509_CERTIFICATE_OID,
        cert_value: OctetString::new(certificate.as_der())?,
    };
    Ok(SafeBag {
        bag_id: oid::PKCS_12_CERT_BAG_OID,
        bag_value: cert_bag.to_der()?,
        bag_attributes: Some(bag_attributes),
    })
}

/// Wrap an already encrypted PKCS#8 key into a shrouded key bag
pub fn sealed_key_to_safe_bag(sealed_key: &[u8], friendly_name: &str, local_key_id: &[u8]) -> Result<SafeBag> {
    let mut bag_attributes = Attributes::new();

    bag_attributes.insert(string_attribute(oid::FRIENDLY_NAME_OID, friendly_name)?)?;
    bag_attributes.insert(octets_attribute(oid::LOCAL_KEY_ID_OID, local_key_id)?)?;

    Ok(SafeBag {
        bag_id: oid::PKCS_12_SHROUDED_KEY_BAG_OID,
        bag_value: sealed_key.to_vec(),
        bag_attributes: Some(bag_attributes),
    })
}

pub fn cert_bags_to_auth_safe(
    bags: Vec<SafeBag>,
    algorithm: EncryptionAlgorithm,
    iterations: u64,
    password: &str,
) -> Result<ContentInfo> {
    let data = bags.to_der()?;
    let (alg_id, encrypted) = pbe::encrypt(algorithm, iterations, &data, password)?;

    let encrypted_data = EncryptedData {
        version: CmsVersion::V0,
        enc_content_info: EncryptedContentInfo {
            content_type: oid::CONTENT_TYPE_DATA_OID,
            content_enc_alg: alg_id,
            encrypted_content: Some(OctetString::new(encrypted)?),
        },
        unprotected_attrs: None,
    };

    Ok(ContentInfo {
        content_type: oid::CONTENT_TYPE_ENCRYPTED_DATA_OID,
        content: Any::from_der(&encrypted_data.to_der()?)?,
    })
}

pub fn bags_to_auth_safe(bags: Vec<SafeBag>) -> Result<ContentInfo> {
    Ok(ContentInfo {
        content_type: oid::CONTENT_TYPE_DATA_OID,
        content: Any::from_der(&OctetString::new(bags.to_der()?)?.to_der()?)?,
    })
}
