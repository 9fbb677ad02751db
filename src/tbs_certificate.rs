use der::Encode;
use rsa::RsaPublicKey;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, SerialNumber, Validity};
use crate::error::{PfxKitError, Result};

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
pub struct TbsCertificate {
    pub serial_number: SerialNumber,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key: RsaPublicKey,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// The result is a v3 structure without extensions.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let subject_public_key_info =
            SubjectPublicKeyInfoOwned::from_key(self.subject_public_key.clone())?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: self.serial_number.to_x509()?,
            signature: self.signature_algorithm.algorithm_identifier()?,
            issuer: self.issuer.as_x509_name()?,
            validity: self.validity.to_x509()?,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        let signature_algorithm = SignatureAlgorithm::from_oid(&inner.signature.oid)?;

        let spki_der = inner.subject_public_key_info.to_der()?;
        let subject_public_key =
            <RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_der(&spki_der)
                .map_err(|e| PfxKitError::DecodingError(format!("subject public key: {e}")))?;

        Ok(Self {
            serial_number: SerialNumber::from_der_bytes(inner.serial_number.as_bytes())?,
            signature_algorithm,
            issuer: DistinguishedName::from_x509_name(&inner.issuer),
            validity: Validity::from_x509(&inner.validity)?,
            subject: DistinguishedName::from_x509_name(&inner.subject),
            subject_public_key,
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.to_tbs_certificate_inner()?
            .to_der()
            .map_err(|e| PfxKitError::EncodingError(e.to_string()))
    }
}
