mod util;

use std::collections::HashSet;
use std::fs;

use pfxkit::cert::params::{DistinguishedName, Validity};
use pfxkit::config::{DEFAULT_KEY_BITS, MAX_SERIAL};
use pfxkit::error::PfxKitError;
use pfxkit::issuance::IssuanceRequest;
use pfxkit::pkcs12::read_container;
use pfxkit::{
    extract_signing_certificate, issue_certificate, issue_certificate_with,
    verify_container_password,
};
use time::macros::datetime;

/// Issues `CN=test.local` for 2024 under `hunter2` and checks the password gate.
#[test]
fn issue_then_verify_password() {
    util::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "cert.pfx", "CN=test.local", "hunter2");

    let issued = issue_certificate(&request).unwrap();

    assert_eq!(issued.output_path, dir.path().join("cert.pfx"));
    assert_eq!(issued.alias, "CN=test.local");
    assert!(verify_container_password(dir.path().join("cert.pfx"), "hunter2"));
    assert!(!verify_container_password(dir.path().join("cert.pfx"), "wrong"));
    assert!(!verify_container_password(dir.path().join("cert.pfx"), ""));
}

#[test]
fn default_key_is_2048_bits() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "cert.pfx", "CN=test.local", "hunter2");
    issue_certificate(&request).unwrap();

    let contents = read_container(dir.path().join("cert.pfx"), "hunter2").unwrap();
    assert_eq!(contents.key.modulus_bits(), DEFAULT_KEY_BITS);
    assert_eq!(contents.key.modulus_bits(), 2048);
}

#[test]
fn stored_certificate_matches_request() {
    util::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let subject = "CN=Test User,OU=Dev,O=Acme Corp,L=Springfield,ST=IL,C=US,E=user@example.com";
    let issuer = "CN=Acme Root,O=Acme Corp,C=US";
    let request = IssuanceRequest::builder()
        .subject(subject)
        .issuer(issuer)
        .validity(util::year_2024())
        .password("pw")
        .output_path(dir.path().join("user.pfx"))
        .build();

    let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();
    let contents = read_container(&issued.output_path, "pw").unwrap();
    let cert = &contents.certificate;

    assert_eq!(cert, &issued.certificate);
    assert_eq!(
        cert.subject().components(),
        DistinguishedName::parse(subject).unwrap().components()
    );
    assert_eq!(
        cert.issuer().components(),
        DistinguishedName::parse(issuer).unwrap().components()
    );
    assert_eq!(cert.subject().to_string(), subject);
    assert_eq!(cert.issuer().to_string(), issuer);
    assert_eq!(contents.alias, subject);
    assert_eq!(cert.validity().unwrap(), util::year_2024());
    assert_eq!(&cert.rsa_public_key().unwrap(), contents.key.public_key());
    cert.verify_self_signed().unwrap();
}

#[test]
fn serials_are_in_range_and_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let mut serials = HashSet::new();
    for i in 0..4 {
        let request = util::request(dir.path(), &format!("{i}.pfx"), "CN=serial.test", "pw");
        let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();
        let serial = issued.certificate.serial_number().unwrap();
        assert!((1..=MAX_SERIAL).contains(&serial), "serial {serial} out of range");
        serials.insert(serial);
    }
    assert_eq!(serials.len(), 4);
}

#[test]
fn existing_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cert.pfx");
    fs::write(&path, vec![0xaa; 1 << 20]).unwrap();

    let request = util::request(dir.path(), "cert.pfx", "CN=test.local", "hunter2");
    issue_certificate_with(&request, &util::fast_config()).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert!(bytes.len() < 1 << 20);
    assert!(!bytes.ends_with(&[0xaa; 16]));
    assert!(verify_container_password(&path, "hunter2"));
}

#[test]
fn reissuing_changes_the_key() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "cert.pfx", "CN=test.local", "pw");
    let first = issue_certificate_with(&request, &util::fast_config()).unwrap();
    let second = issue_certificate_with(&request, &util::fast_config()).unwrap();

    assert_ne!(
        first.certificate.rsa_public_key().unwrap(),
        second.certificate.rsa_public_key().unwrap()
    );
    let stored = read_container(&request.output_path, "pw").unwrap();
    assert_eq!(stored.certificate, second.certificate);
}

#[test]
fn empty_names_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "anon.pfx", "", "pw");

    let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();

    assert!(issued.certificate.subject().is_empty());
    assert!(issued.certificate.issuer().is_empty());
    assert_eq!(issued.alias, "");
    assert!(verify_container_password(&issued.output_path, "pw"));
}

#[test]
fn multi_valued_subject_alias_follows_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "multi.pfx", "UID=42+CN=a,O=b", "pw");

    let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();

    assert_eq!(issued.alias, "CN=a+UID=42,O=b");
    let contents = read_container(&issued.output_path, "pw").unwrap();
    assert_eq!(contents.alias, issued.alias);
}

#[test]
fn inverted_validity_is_encoded_as_given() {
    let dir = tempfile::tempdir().unwrap();
    let inverted = Validity {
        not_before: datetime!(2025-01-01 0:00 UTC),
        not_after: datetime!(2024-01-01 0:00 UTC),
    };
    let request = IssuanceRequest::builder()
        .subject("CN=backwards")
        .issuer("CN=backwards")
        .validity(inverted.clone())
        .password("pw")
        .output_path(dir.path().join("backwards.pfx"))
        .build();

    let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();
    assert_eq!(issued.certificate.validity().unwrap(), inverted);
}

#[test]
fn late_dates_survive() {
    let dir = tempfile::tempdir().unwrap();
    let validity = Validity {
        not_before: datetime!(2049-12-31 23:59:59 UTC),
        not_after: datetime!(2099-06-30 12:00 UTC),
    };
    let request = IssuanceRequest::builder()
        .subject("CN=long.lived")
        .issuer("CN=long.lived")
        .validity(validity.clone())
        .password("pw")
        .output_path(dir.path().join("long.pfx"))
        .build();

    let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();
    assert_eq!(issued.certificate.validity().unwrap(), validity);
}

#[test]
fn pre_epoch_validity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = IssuanceRequest::builder()
        .subject("CN=old")
        .issuer("CN=old")
        .validity(Validity {
            not_before: datetime!(1969-01-01 0:00 UTC),
            not_after: datetime!(2024-01-01 0:00 UTC),
        })
        .password("pw")
        .output_path(dir.path().join("old.pfx"))
        .build();

    let err = issue_certificate_with(&request, &util::fast_config()).unwrap_err();
    assert!(matches!(err, PfxKitError::InputEncodingError(_)), "{err}");
    assert!(!request.output_path.exists());
}

#[test]
fn malformed_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "bad.pfx", "CN=ok,,O=x", "pw");
    let err = issue_certificate_with(&request, &util::fast_config()).unwrap_err();
    assert!(matches!(err, PfxKitError::InputEncodingError(_)), "{err}");
}

#[test]
fn unwritable_output_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(
        &dir.path().join("missing-dir"),
        "cert.pfx",
        "CN=test.local",
        "pw",
    );
    let err = issue_certificate_with(&request, &util::fast_config()).unwrap_err();
    assert!(matches!(err, PfxKitError::IoError(_)), "{err}");
}

#[test]
fn verify_rejects_non_containers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not.pfx");
    fs::write(&path, b"hello").unwrap();
    assert!(!verify_container_password(&path, "hello"));
    assert!(!verify_container_password(dir.path().join("absent.pfx"), "pw"));
}

#[test]
fn keystore_is_not_a_signed_file() {
    let dir = tempfile::tempdir().unwrap();
    let request = util::request(dir.path(), "cert.pfx", "CN=test.local", "pw");
    let issued = issue_certificate_with(&request, &util::fast_config()).unwrap();

    let err = extract_signing_certificate(&issued.output_path).unwrap_err();
    assert!(matches!(err, PfxKitError::SignatureNotFound(_)), "{err}");
}

#[test]
fn unsigned_pe_has_no_signer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unsigned.exe");
    fs::write(&path, util::pe32_with_signatures(&[])).unwrap();

    let err = extract_signing_certificate(&path).unwrap_err();
    assert!(matches!(err, PfxKitError::SignatureNotFound(_)), "{err}");
}

#[test]
fn missing_file_cannot_be_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract_signing_certificate(dir.path().join("nope.exe")).unwrap_err();
    assert!(matches!(err, PfxKitError::IoError(_)), "{err}");
}
