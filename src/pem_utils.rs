use crate::error::{PfxKitError, Result};

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new())
}

/// Convert a PEM‑encoded string to DER‑encoded bytes, accepting only the given labels.
pub fn pem_to_der(pem_str: &str, labels: &[&str]) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)?;
    if !labels.contains(&pem.tag()) {
        return Err(PfxKitError::DecodingError(format!(
            "unexpected PEM label '{}', expected one of {labels:?}",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}

/// Returns `true` when `bytes` look like PEM armor rather than binary DER.
pub fn is_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_label_check() {
        let pem = der_to_pem(&[0x30, 0x00], "PKCS7");
        assert!(is_pem(pem.as_bytes()));
        assert_eq!(pem_to_der(&pem, &["PKCS7", "CMS"]).unwrap(), vec![0x30, 0x00]);
        assert!(pem_to_der(&pem, &["CERTIFICATE"]).is_err());
    }

    #[test]
    fn binary_is_not_pem() {
        assert!(!is_pem(&[0x30, 0x82, 0x01, 0x00]));
        assert!(!is_pem(b""));
    }
}
