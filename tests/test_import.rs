use std::fs;

use pem_keystore::{
    KeyStore, KeyStoreEntry, Protection, RustCryptoProvider,
    error::Error,
    import::{self, ImportRequest},
};

const ASSETS: &str = "tests/assets";
const PASSWORD: &str = "changeit";

fn asset(name: &str) -> String {
    format!("{ASSETS}/{name}")
}

fn provider() -> RustCryptoProvider {
    RustCryptoProvider::with_protection(Protection {
        encryption_iterations: 1000,
        mac_iterations: 1000,
        ..Protection::default()
    })
}

#[test]
fn test_request_defaults() {
    let request = ImportRequest::new("cert.pem", "store.p12");

    assert_eq!(request.alias, "item");
    assert_eq!(request.store_password, "");
    assert_eq!(request.alias_password, "");
    assert!(request.key_path.is_none());
}

#[test]
fn test_import_key_and_chain() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");

    let request = ImportRequest::new(asset("cert.pem"), &store)
        .key_path(asset("key.pem"))
        .store_password(PASSWORD)
        .alias("server")
        .alias_password("keypass");
    import::run(&request, &provider()).unwrap();

    let keystore = KeyStore::from_pkcs12(&fs::read(&store).unwrap(), PASSWORD).unwrap();
    assert_eq!(keystore.certificate_chain("server").map(<[_]>::len), Some(2));
    assert!(keystore.key("server", "keypass").unwrap().is_some());
}

#[test]
fn test_import_certificate_only_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("truststore.p12");

    import::run(&ImportRequest::new(asset("cert.pem"), &store), &provider()).unwrap();

    let keystore = KeyStore::from_pkcs12(&fs::read(&store).unwrap(), "").unwrap();
    assert!(matches!(keystore.entry("item"), Some(KeyStoreEntry::Certificate(_))));
}

#[test]
fn test_import_first_of_many_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");

    let request = ImportRequest::new(asset("mixed.pem"), &store).key_path(asset("keys.pem"));
    import::run(&request, &provider()).unwrap();

    let keystore = KeyStore::from_pkcs12(&fs::read(&store).unwrap(), "").unwrap();
    assert_eq!(keystore.certificate_chain("item").map(<[_]>::len), Some(2));
}

#[test]
fn test_import_legacy_rsa_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");

    let request = ImportRequest::new(asset("cert.pem"), &store).key_path(asset("key-rsa.pem"));
    import::run(&request, &provider()).unwrap();

    let keystore = KeyStore::from_pkcs12(&fs::read(&store).unwrap(), "").unwrap();
    assert!(keystore.key("item", "").unwrap().is_some());
}

#[test]
fn test_mismatched_key_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");

    let request = ImportRequest::new(asset("cert.pem"), &store).key_path(asset("other-key.pem"));
    assert!(matches!(
        import::run(&request, &provider()),
        Err(Error::KeyCertificateMismatch)
    ));
    assert!(!store.exists());
}

#[test]
fn test_empty_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");

    let request = ImportRequest::new(asset("empty.pem"), &store);
    assert!(matches!(
        import::run(&request, &provider()),
        Err(Error::EmptyCertificateChain)
    ));

    let request = ImportRequest::new(asset("cert.pem"), &store).key_path(asset("empty.pem"));
    assert!(matches!(import::run(&request, &provider()), Err(Error::EmptyKeyFile)));

    let request = ImportRequest::new(asset("cert.pem"), &store).key_path(asset("cert.pem"));
    assert!(matches!(import::run(&request, &provider()), Err(Error::EmptyKeyFile)));

    assert!(!store.exists());
}

#[test]
fn test_malformed_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");

    let request = ImportRequest::new(asset("bad-base64.pem"), &store);
    assert!(matches!(
        import::run(&request, &provider()),
        Err(Error::MalformedPem(_))
    ));

    let request = ImportRequest::new(asset("missing.pem"), &store);
    assert!(matches!(import::run(&request, &provider()), Err(Error::IoError(_))));

    assert!(!store.exists());
}

#[test]
fn test_wrong_store_password() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("keystore.p12");
    let request = ImportRequest::new(asset("cert.pem"), &store).store_password(PASSWORD);
    import::run(&request, &provider()).unwrap();
    let before = fs::read(&store).unwrap();

    let request = request.store_password("wrong").alias("other");
    assert!(matches!(
        import::run(&request, &provider()),
        Err(Error::KeystoreAuthError)
    ));
    assert_eq!(fs::read(&store).unwrap(), before);
}
