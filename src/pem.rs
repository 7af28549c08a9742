//!
//! Splitting PEM text into labelled DER payloads
//!
use std::{fmt, fs, path::Path};

use ::pem::PemError;

use crate::{Result, error::Error};

const BEGIN: &[u8] = b"-----BEGIN ";
const DASHES: &[u8] = b"-----";

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PKCS8_KEY_LABEL: &str = "PRIVATE KEY";
pub const RSA_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// One decoded `BEGIN`/`END` block
#[derive(Clone, PartialEq, Eq)]
pub struct PemObject {
    pub(crate) label: String,
    pub(crate) bytes: Vec<u8>,
}

impl PemObject {
    pub fn new<L: Into<String>>(label: L, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }

    /// Block label, the text following `BEGIN `
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Base64-decoded block body
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PemObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemObject")
            .field("label", &self.label)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl From<::pem::Pem> for PemObject {
    fn from(value: ::pem::Pem) -> Self {
        Self {
            label: value.tag().to_owned(),
            bytes: value.into_contents(),
        }
    }
}

/// Labels of all `BEGIN` lines, in file order
fn begin_labels(data: &[u8]) -> impl Iterator<Item = String> + '_ {
    data.windows(BEGIN.len())
        .enumerate()
        .filter(|(_, window)| *window == BEGIN)
        .map(move |(i, _)| {
            let rest = &data[i + BEGIN.len()..];
            let end = rest.windows(DASHES.len()).position(|w| w == DASHES).unwrap_or(rest.len());
            String::from_utf8_lossy(&rest[..end]).trim().to_owned()
        })
}

/// Decode every PEM block in `data`, in file order.
///
/// Labels are not filtered, text between blocks is ignored and a file without any block
/// decodes to an empty vector.
pub fn decode(data: &[u8]) -> Result<Vec<PemObject>> {
    let objects: Vec<PemObject> = ::pem::parse_many(data)
        .map_err(|e| match e {
            PemError::MismatchedTags(begin, _) => Error::UnterminatedPem(begin),
            e => Error::MalformedPem(e),
        })?
        .into_iter()
        .map(PemObject::from)
        .collect();

    // parse_many stops at the first block without an END line instead of failing
    match begin_labels(data).nth(objects.len()) {
        Some(label) => Err(Error::UnterminatedPem(label)),
        None => Ok(objects),
    }
}

/// Read a file and decode its PEM blocks
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<PemObject>> {
    let data = fs::read(path)?;
    decode(&data)
}
