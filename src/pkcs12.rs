//! PKCS#12 (PFX) keystore packaging, decoding and password checks.
//!
//! Containers follow the profile OpenSSL 3 and the platform certificate
//! stores import without legacy algorithms: the key travels in a
//! `pkcs8ShroudedKeyBag` and the certificate in an encrypted `certBag`,
//! both under `pbeWithSHAAnd3-KeyTripleDES-CBC`, and the whole thing is
//! sealed with an HMAC-SHA1 integrity MAC. Both bags carry the alias as
//! their `friendlyName`.

use std::path::Path;

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use der::Decode;
use des::TdesEde3;
use p12::{
    AlgorithmIdentifier, CertBag, ContentInfo, EncryptedContentInfo, EncryptedData,
    EncryptedPrivateKeyInfo, MacData, PFX, PKCS12Attribute, Pkcs12PbeParams, SafeBag,
    SafeBagKind,
};
use pkcs12::kdf::{Pkcs12KeyType, derive_key_utf8};
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::cert::Certificate;
use crate::config::PBE_ITERATIONS;
use crate::error::{PfxKitError, Result};
use crate::key::KeyPair;
use crate::random::seeded_rng;

const PFX_VERSION: u8 = 3;
const SALT_LEN: usize = 8;
const TDES_KEY_LEN: usize = 24;
const TDES_IV_LEN: usize = 8;

/// The decoded contents of a keystore holding one key and its certificate.
#[derive(Debug, Clone)]
pub struct KeystoreContents {
    /// Alias of the entries: the rendered subject name of the certificate.
    pub alias: String,
    pub certificate: Certificate,
    pub key: KeyPair,
}

/// Bundles `cert` and `key` into a password-protected PFX and returns its DER bytes.
pub fn package_container(
    cert: &Certificate,
    key: &KeyPair,
    password: &str,
    alias: &str,
) -> Result<Vec<u8>> {
    let cert_der = cert.to_der()?;
    let key_der = key.to_pkcs8_der()?;
    let mut rng = seeded_rng()?;

    let attributes = vec![
        PKCS12Attribute::FriendlyName(alias.to_owned()),
        PKCS12Attribute::LocalKeyId(Sha1::digest(&cert_der).to_vec()),
    ];

    let (key_params, encrypted_key) = tdes_encrypt(&key_der, password, &mut rng)?;
    let key_bag = SafeBag {
        bag: SafeBagKind::Pkcs8ShroudedKeyBag(EncryptedPrivateKeyInfo {
            encryption_algorithm: AlgorithmIdentifier::PbeWithSHAAnd3KeyTripleDESCBC(key_params),
            encrypted_data: encrypted_key,
        }),
        attributes: attributes.clone(),
    };
    let cert_bag = SafeBag {
        bag: SafeBagKind::CertBag(CertBag::X509(cert_der)),
        attributes,
    };

    let (cert_params, encrypted_certs) =
        tdes_encrypt(&safe_contents(&[cert_bag]), password, &mut rng)?;
    let cert_safe = ContentInfo::EncryptedData(EncryptedData {
        encrypted_content_info: EncryptedContentInfo {
            content_encryption_algorithm: AlgorithmIdentifier::PbeWithSHAAnd3KeyTripleDESCBC(
                cert_params,
            ),
            encrypted_content: encrypted_certs,
        },
    });
    let key_safe = ContentInfo::Data(safe_contents(&[key_bag]));

    let auth_safe = yasna::construct_der(|w| {
        w.write_sequence_of(|w| {
            cert_safe.write(w.next());
            key_safe.write(w.next());
        })
    });
    let mac_data = MacData::new(&auth_safe, &bmp_password(password));

    let pfx = PFX {
        version: PFX_VERSION,
        auth_safe: ContentInfo::Data(auth_safe),
        mac_data: Some(mac_data),
    };
    Ok(pfx.to_der())
}

/// DER `SafeContents`: a SEQUENCE OF `SafeBag`.
fn safe_contents(bags: &[SafeBag]) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence_of(|w| {
            for bag in bags {
                bag.write(w.next());
            }
        })
    })
}

/// `pbeWithSHAAnd3-KeyTripleDES-CBC` under a fresh salt (RFC 7292 appendix B key derivation).
fn tdes_encrypt<R: RngCore>(
    plaintext: &[u8],
    password: &str,
    rng: &mut R,
) -> Result<(Pkcs12PbeParams, Vec<u8>)> {
    let mut salt = vec![0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let derive = |id: Pkcs12KeyType, len: usize| {
        derive_key_utf8::<Sha1>(password, &salt, id, PBE_ITERATIONS as i32, len)
            .map_err(|e| PfxKitError::ContainerError(format!("PBE key derivation: {e}")))
    };
    let key = derive(Pkcs12KeyType::EncryptionKey, TDES_KEY_LEN)?;
    let iv = derive(Pkcs12KeyType::Iv, TDES_IV_LEN)?;

    let cipher = cbc::Encryptor::<TdesEde3>::new_from_slices(&key, &iv)
        .map_err(|e| PfxKitError::ContainerError(format!("3DES key setup: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let params = Pkcs12PbeParams {
        salt,
        iterations: u64::from(PBE_ITERATIONS),
    };
    Ok((params, ciphertext))
}

/// The password as a NUL-terminated big-endian BMPString, as the MAC key derivation expects.
fn bmp_password(password: &str) -> Vec<u8> {
    password
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_be_bytes)
        .collect()
}

/// Opens a PFX held in memory and decodes its single key/certificate pair.
///
/// The MAC must verify under `password`, exactly one RSA key and at least
/// one certificate must be present, and the first certificate's public key
/// must match the private key.
pub fn open_container(bytes: &[u8], password: &str) -> Result<KeystoreContents> {
    let pfx = parse_verified(bytes, password)?;

    let mut keys = pfx
        .key_bags(password)
        .map_err(|e| PfxKitError::ContainerError(format!("key bags: {e}")))?;
    if keys.len() != 1 {
        return Err(PfxKitError::ContainerError(format!(
            "expected exactly one private key, found {}",
            keys.len()
        )));
    }
    let key = KeyPair::from_pkcs8_der(&keys.remove(0))?;

    let certs = pfx
        .cert_x509_bags(password)
        .map_err(|e| PfxKitError::ContainerError(format!("certificate bags: {e}")))?;
    let cert_der = certs
        .first()
        .ok_or_else(|| PfxKitError::ContainerError("no certificate in keystore".to_string()))?;
    let certificate = Certificate::from_der(cert_der)?;

    if &certificate.rsa_public_key()? != key.public_key() {
        return Err(PfxKitError::ContainerError(
            "private key does not match the certificate".to_string(),
        ));
    }

    let alias = certificate.subject().to_string();
    Ok(KeystoreContents {
        alias,
        certificate,
        key,
    })
}

/// Reads and opens the PFX file at `path`.
pub fn read_container(path: impl AsRef<Path>, password: &str) -> Result<KeystoreContents> {
    let bytes = std::fs::read(path.as_ref())?;
    open_container(&bytes, password)
}

/// Decodes a freshly built container and re-exports it under the same password.
///
/// This is the compatibility pass of the issuance pipeline: the bytes must
/// decode through the same path any consumer would use, and what is written
/// out is the re-encoded result rather than the first serialization.
pub fn normalize_container(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    let contents = open_container(bytes, password)?;
    package_container(
        &contents.certificate,
        &contents.key,
        password,
        &contents.alias,
    )
}

/// Returns `true` when the PFX at `path` opens with `password`.
///
/// Every failure collapses to `false`: missing file, unreadable file,
/// malformed container, wrong password or corrupt bags alike.
pub fn verify_container_password(path: impl AsRef<Path>, password: &str) -> bool {
    let path = path.as_ref();
    match check_password(path, password) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "keystore did not open");
            false
        }
    }
}

fn check_password(path: &Path, password: &str) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let pfx = parse_verified(&bytes, password)?;

    let keys = pfx
        .key_bags(password)
        .map_err(|e| PfxKitError::ContainerError(format!("key bags: {e}")))?;
    for key in &keys {
        pkcs8::PrivateKeyInfo::from_der(key)
            .map_err(|e| PfxKitError::ContainerError(format!("private key: {e}")))?;
    }

    let certs = pfx
        .cert_x509_bags(password)
        .map_err(|e| PfxKitError::ContainerError(format!("certificate bags: {e}")))?;
    for cert in &certs {
        x509_cert::Certificate::from_der(cert)
            .map_err(|e| PfxKitError::ContainerError(format!("certificate: {e}")))?;
    }

    if keys.is_empty() && certs.is_empty() {
        return Err(PfxKitError::ContainerError("keystore is empty".to_string()));
    }
    Ok(())
}

fn parse_verified(bytes: &[u8], password: &str) -> Result<PFX> {
    let pfx = PFX::parse(bytes)
        .map_err(|e| PfxKitError::ContainerError(format!("not a PKCS#12 container: {e}")))?;
    if !pfx.verify_mac(password) {
        return Err(PfxKitError::ContainerError(
            "MAC verification failed, wrong password".to_string(),
        ));
    }
    Ok(pfx)
}
