use std::{path::PathBuf, process::exit};

use anyhow::Context;
use clap::{Parser, ValueEnum};

use pem_keystore::{
    EncryptionAlgorithm, MacAlgorithm, Protection, RustCryptoProvider,
    import::{self, ImportRequest},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Encryption {
    /// PBES2 with PBKDF2-HMAC-SHA256 and AES-256-CBC
    Aes256,
    /// PKCS#12 PBE with SHA-1 and 3-key triple DES (legacy)
    #[value(name = "3des")]
    TripleDes,
    /// PKCS#12 PBE with SHA-1 and 40-bit RC2 (legacy)
    #[value(name = "rc2-40")]
    Rc2_40,
}

impl From<Encryption> for EncryptionAlgorithm {
    fn from(value: Encryption) -> Self {
        match value {
            Encryption::Aes256 => EncryptionAlgorithm::PbeWithHmacSha256AndAes256,
            Encryption::TripleDes => EncryptionAlgorithm::PbeWithShaAnd3KeyTripleDesCbc,
            Encryption::Rc2_40 => EncryptionAlgorithm::PbeWithShaAnd40BitRc2Cbc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mac {
    Sha256,
    Sha1,
}

impl From<Mac> for MacAlgorithm {
    fn from(value: Mac) -> Self {
        match value {
            Mac::Sha256 => MacAlgorithm::HmacSha256,
            Mac::Sha1 => MacAlgorithm::HmacSha1,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pem-keystore",
    version,
    about = "Import PEM certificates and private keys into a PKCS#12 keystore"
)]
struct Cli {
    /// PEM file with the certificate chain, leaf certificate first
    #[arg(long, value_name = "PATH")]
    cert: PathBuf,

    /// PEM file with the private key; only the first key is used
    #[arg(long, value_name = "PATH")]
    key: Option<PathBuf>,

    /// Keystore file, created if it does not exist
    #[arg(long, value_name = "PATH")]
    store: PathBuf,

    /// Keystore password
    #[arg(long, env = "PEM_KEYSTORE_STOREPW", default_value = "", hide_env_values = true)]
    storepw: String,

    /// Entry alias
    #[arg(long, default_value = import::DEFAULT_ALIAS)]
    alias: String,

    /// Private key entry password
    #[arg(long, env = "PEM_KEYSTORE_ALIASPW", default_value = "", hide_env_values = true)]
    aliaspw: String,

    /// Encryption of newly written keys and certificates
    #[arg(long, value_enum, default_value_t = Encryption::Aes256)]
    encryption: Encryption,

    /// Iteration count for key derivation and the integrity MAC
    #[arg(long, default_value_t = 10000, value_parser = clap::value_parser!(u64).range(1..=i32::MAX as u64))]
    iterations: u64,

    /// Integrity MAC algorithm
    #[arg(long, value_enum, default_value_t = Mac::Sha256)]
    mac: Mac,
}

impl Cli {
    fn protection(&self) -> Protection {
        Protection {
            encryption_algorithm: self.encryption.into(),
            encryption_iterations: self.iterations,
            mac_algorithm: self.mac.into(),
            mac_iterations: self.iterations,
        }
    }

    fn request(&self) -> ImportRequest {
        let mut request = ImportRequest::new(&self.cert, &self.store)
            .store_password(&self.storepw)
            .alias(&self.alias)
            .alias_password(&self.aliaspw);
        if let Some(key) = &self.key {
            request = request.key_path(key);
        }
        request
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let provider = RustCryptoProvider::with_protection(cli.protection());
    let request = cli.request();

    import::run(&request, &provider)
        .with_context(|| format!("Cannot import {} into {}", request.cert_path.display(), request.store_path.display()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => println!("Done"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit(1);
        }
    }
}
