use std::io::Write;

use mind_rpc::{ErrorCode, RpcError};
use mind_tls::RustlsConnector;
use tempfile::NamedTempFile;

const NOT_PEM: &str = "this file holds no PEM sections\n";

const CERT_ONLY: &str = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIUQ0VSVA==\n-----END CERTIFICATE-----\n";

fn file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

fn configuration_message(err: RpcError) -> String {
    assert_eq!(err.code(), ErrorCode::Configuration);
    match err {
        RpcError::Configuration(message) => message,
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn missing_certificate_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("client.pem");

    let err = RustlsConnector::from_pem_files(&missing, &missing).expect_err("should fail");
    assert!(configuration_message(err).contains("failed to read"));
}

#[test]
fn file_without_certificates_is_rejected() {
    let file = file_with(NOT_PEM);

    let err = RustlsConnector::from_pem_files(file.path(), file.path()).expect_err("should fail");
    assert!(configuration_message(err).contains("no certificates"));
}

#[test]
fn certificate_without_key_is_rejected() {
    let cert = file_with(CERT_ONLY);

    let err = RustlsConnector::from_pem_files(cert.path(), cert.path()).expect_err("should fail");
    assert!(configuration_message(err).contains("no private key"));
}
