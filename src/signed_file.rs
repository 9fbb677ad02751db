//! Signer certificate extraction from signed files.
//!
//! Two carriers are understood:
//! - PE images, whose Authenticode signature is a PKCS#7 `SignedData`
//!   stored as a `WIN_CERTIFICATE` entry in the security data directory.
//! - Bare PKCS#7/CMS `SignedData` blobs, DER or PEM armored (`.p7s`).

use std::path::Path;

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use const_oid::ObjectIdentifier;
use der::{Decode, SliceReader};
use x509_cert::ext::pkix::SubjectKeyIdentifier;

use crate::cert::Certificate;
use crate::error::{PfxKitError, Result};
use crate::pem_utils;

// === PE File Constants ===

/// DOS header magic `MZ`.
const DOS_MAGIC: &[u8] = b"MZ";

/// Offset of `e_lfanew` in the DOS header.
const DOS_E_LFANEW_OFFSET: usize = 0x3c;

/// PE signature `PE\0\0`.
const PE_SIGNATURE: &[u8] = b"PE\0\0";

/// Size of the COFF file header following the PE signature.
const COFF_HEADER_SIZE: usize = 20;

/// Offset of `SizeOfOptionalHeader` within the COFF header.
const COFF_SIZE_OF_OPTIONAL_HEADER_OFFSET: usize = 16;

/// Optional header magic for PE32 images.
const PE32_MAGIC: u16 = 0x10b;

/// Optional header magic for PE32+ images.
const PE32_PLUS_MAGIC: u16 = 0x20b;

/// Index of `IMAGE_DIRECTORY_ENTRY_SECURITY` in the data directory table.
const SECURITY_DIRECTORY_INDEX: usize = 4;

/// Each data directory is a (`VirtualAddress`, `Size`) pair of u32.
const DATA_DIRECTORY_ENTRY_SIZE: usize = 8;

/// Size of the `WIN_CERTIFICATE` header (`dwLength`, `wRevision`, `wCertificateType`).
const WIN_CERTIFICATE_HEADER_SIZE: usize = 8;

/// `WIN_CERT_TYPE_PKCS_SIGNED_DATA`.
const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;

// === PKCS#7/CMS Constants ===

/// PKCS#7 `SignedData` content type (1.2.840.113549.1.7.2).
const PKCS7_SIGNED_DATA_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

/// PEM labels that may wrap a `SignedData` blob.
const PKCS7_PEM_LABELS: &[&str] = &["PKCS7", "CMS"];

/// Reads the file at `path` and returns the certificate of its signer.
///
/// Fails with [`PfxKitError::SignatureNotFound`] when the file carries no
/// signature and with [`PfxKitError::InvalidSignature`] when the signature
/// is present but unusable.
pub fn extract_signing_certificate(path: impl AsRef<Path>) -> Result<Certificate> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), size = bytes.len(), "extracting signer certificate");
    let cert = signing_certificate_from_bytes(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        subject = %cert.subject(),
        issuer = %cert.issuer(),
        "found signer certificate"
    );
    Ok(cert)
}

/// Same as [`extract_signing_certificate`] for a file already in memory.
pub fn signing_certificate_from_bytes(bytes: &[u8]) -> Result<Certificate> {
    if bytes.starts_with(DOS_MAGIC) {
        let signatures = authenticode_signatures(bytes)?;
        let first = signatures.first().ok_or_else(|| {
            PfxKitError::SignatureNotFound(
                "security directory holds no PKCS#7 signature".to_string(),
            )
        })?;
        return signer_from_pkcs7(first);
    }

    if pem_utils::is_pem(bytes) {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PfxKitError::InvalidSignature(format!("PEM is not UTF-8: {e}")))?;
        let der = pem_utils::pem_to_der(text, PKCS7_PEM_LABELS)
            .map_err(|e| PfxKitError::InvalidSignature(e.to_string()))?;
        return signer_from_pkcs7(&der);
    }

    if looks_like_signed_data(bytes) {
        return signer_from_pkcs7(bytes);
    }

    Err(PfxKitError::SignatureNotFound(
        "file is neither a signed PE image nor a PKCS#7 signature".to_string(),
    ))
}

/// Returns the `bCertificate` payloads of every PKCS#7 entry in the PE security directory.
fn authenticode_signatures(image: &[u8]) -> Result<Vec<&[u8]>> {
    let pe_offset = read_u32(image, DOS_E_LFANEW_OFFSET)? as usize;
    if image.get(pe_offset..pe_offset + PE_SIGNATURE.len()) != Some(PE_SIGNATURE) {
        return Err(PfxKitError::SignatureNotFound(
            "MZ header without a PE signature".to_string(),
        ));
    }

    let coff = pe_offset + PE_SIGNATURE.len();
    let optional_size = read_u16(image, coff + COFF_SIZE_OF_OPTIONAL_HEADER_OFFSET)? as usize;
    let optional = coff + COFF_HEADER_SIZE;

    let (rva_count_offset, directories_offset) = match read_u16(image, optional)? {
        PE32_MAGIC => (92, 96),
        PE32_PLUS_MAGIC => (108, 112),
        magic => {
            return Err(PfxKitError::InvalidSignature(format!(
                "unknown optional header magic {magic:#x}"
            )));
        }
    };

    let directory_count = read_u32(image, optional + rva_count_offset)? as usize;
    let entry_offset = directories_offset + SECURITY_DIRECTORY_INDEX * DATA_DIRECTORY_ENTRY_SIZE;
    if directory_count <= SECURITY_DIRECTORY_INDEX
        || entry_offset + DATA_DIRECTORY_ENTRY_SIZE > optional_size
    {
        return Err(PfxKitError::SignatureNotFound(
            "image has no security directory".to_string(),
        ));
    }

    // The security directory holds a file offset, not an RVA.
    let table_offset = read_u32(image, optional + entry_offset)? as usize;
    let table_size = read_u32(image, optional + entry_offset + 4)? as usize;
    if table_offset == 0 || table_size == 0 {
        return Err(PfxKitError::SignatureNotFound(
            "security directory is empty".to_string(),
        ));
    }
    let table = image
        .get(table_offset..table_offset.saturating_add(table_size))
        .ok_or_else(|| {
            PfxKitError::InvalidSignature("security directory runs past end of file".to_string())
        })?;

    let mut signatures = Vec::new();
    let mut cursor = 0;
    while cursor + WIN_CERTIFICATE_HEADER_SIZE <= table.len() {
        let length = read_u32(table, cursor)? as usize;
        let cert_type = read_u16(table, cursor + 6)?;
        if length < WIN_CERTIFICATE_HEADER_SIZE || cursor + length > table.len() {
            return Err(PfxKitError::InvalidSignature(format!(
                "WIN_CERTIFICATE entry at {cursor} has bad length {length}"
            )));
        }
        if cert_type == WIN_CERT_TYPE_PKCS_SIGNED_DATA {
            signatures.push(&table[cursor + WIN_CERTIFICATE_HEADER_SIZE..cursor + length]);
        }
        // Entries are quadword aligned.
        cursor += (length + 7) & !7;
    }
    Ok(signatures)
}

fn looks_like_signed_data(bytes: &[u8]) -> bool {
    let Ok(mut reader) = SliceReader::new(bytes) else {
        return false;
    };
    matches!(
        ContentInfo::decode(&mut reader),
        Ok(info) if info.content_type == PKCS7_SIGNED_DATA_OID
    )
}

/// Decodes a `ContentInfo { SignedData }` and picks the certificate named by the first signer.
///
/// Trailing bytes after the `ContentInfo` (alignment padding) are ignored.
fn signer_from_pkcs7(der: &[u8]) -> Result<Certificate> {
    let invalid = |what: &str, e: der::Error| PfxKitError::InvalidSignature(format!("{what}: {e}"));

    let mut reader = SliceReader::new(der).map_err(|e| invalid("PKCS#7 blob", e))?;
    let content_info = ContentInfo::decode(&mut reader).map_err(|e| invalid("ContentInfo", e))?;
    if content_info.content_type != PKCS7_SIGNED_DATA_OID {
        return Err(PfxKitError::InvalidSignature(format!(
            "content type {} is not SignedData",
            content_info.content_type
        )));
    }
    let signed_data: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| invalid("SignedData", e))?;

    let signer = signed_data.signer_infos.0.iter().next().ok_or_else(|| {
        PfxKitError::InvalidSignature("SignedData has no signer".to_string())
    })?;

    let certificates: Vec<&x509_cert::Certificate> = signed_data
        .certificates
        .as_ref()
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(cert) => Some(cert),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let found = certificates.into_iter().find(|cert| match &signer.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => {
            cert.tbs_certificate.issuer == id.issuer
                && cert.tbs_certificate.serial_number == id.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => subject_key_id(cert).as_ref() == Some(ski),
    });

    found
        .cloned()
        .map(Certificate::from_inner)
        .ok_or_else(|| {
            PfxKitError::InvalidSignature(
                "signer certificate is not embedded in the signature".to_string(),
            )
        })
}

fn subject_key_id(cert: &x509_cert::Certificate) -> Option<SubjectKeyIdentifier> {
    cert.tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER)
        .and_then(|ext| SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()).ok())
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated(offset))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| truncated(offset))
}

fn truncated(offset: usize) -> PfxKitError {
    PfxKitError::InvalidSignature(format!("PE image truncated at offset {offset:#x}"))
}
