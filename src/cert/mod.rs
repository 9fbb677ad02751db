pub mod params;

use const_oid::db::rfc5912;
use der::asn1::Any;
use der::{Decode, Encode, Tag};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{PfxKitError, Result};
use crate::pem_utils;
use params::{DistinguishedName, Validity};

/// Represents the supported signature algorithms for certificates.
///
/// All variants are RSASSA-PKCS1-v1_5; they differ only in the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-384 with RSA encryption.
    Sha384WithRSA,
    /// SHA-512 with RSA encryption.
    Sha512WithRSA,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
        }
    }

    pub fn from_oid(oid: &const_oid::ObjectIdentifier) -> Result<Self> {
        [
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithRSA,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
        .ok_or_else(|| PfxKitError::DecodingError(format!("Unsupported signature algorithm {oid}")))
    }

    /// Converts into an `AlgorithmIdentifierOwned` with explicit NULL parameters (RFC 4055).
    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters: Some(Any::new(Tag::Null, Vec::<u8>::new())?),
        })
    }

    /// Checks an RSASSA-PKCS1-v1_5 signature over `message`.
    pub fn verify(&self, key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::try_from(signature)
            .map_err(|e| PfxKitError::CryptoOperationError(e.to_string()))?;
        match self {
            SignatureAlgorithm::Sha256WithRSA => {
                VerifyingKey::<Sha256>::new(key.clone()).verify(message, &signature)?
            }
            SignatureAlgorithm::Sha384WithRSA => {
                VerifyingKey::<Sha384>::new(key.clone()).verify(message, &signature)?
            }
            SignatureAlgorithm::Sha512WithRSA => {
                VerifyingKey::<Sha512>::new(key.clone()).verify(message, &signature)?
            }
        }
        Ok(())
    }
}

/// Represents an X.509 certificate.
///
/// Once signed a certificate is never mutated; every accessor hands out
/// decoded copies or borrowed views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    inner: CertificateInner,
}

impl Certificate {
    pub(crate) fn from_inner(inner: CertificateInner) -> Self {
        Self { inner }
    }

    /// Decodes a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Decodes a PEM `CERTIFICATE` block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = pem_utils::pem_to_der(pem, &["CERTIFICATE"])?;
        Self::from_der(&der)
    }

    /// The underlying `x509-cert` structure.
    pub fn as_x509(&self) -> &CertificateInner {
        &self.inner
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PfxKitError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, "CERTIFICATE"))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn validity(&self) -> Result<Validity> {
        Validity::from_x509(&self.inner.tbs_certificate.validity)
    }

    /// Big-endian serial bytes as encoded (may carry a leading zero).
    pub fn serial_number_bytes(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    /// The serial as an integer, if it fits in 64 bits.
    pub fn serial_number(&self) -> Option<u64> {
        let bytes = self.serial_number_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[first..];
        if significant.len() > 8 {
            return None;
        }
        Some(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.signature_algorithm.oid)
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    /// The subject public key, when it is an RSA key.
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey> {
        let spki_der = self.public_key_info().to_der()?;
        RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| PfxKitError::DecodingError(format!("subject public key: {e}")))
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &RsaPublicKey) -> Result<()> {
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PfxKitError::DecodingError("signature BIT STRING has unused bits".to_string())
        })?;
        self.signature_algorithm()?
            .verify(issuer_key, &tbs, signature)
    }

    /// Checks the signature against the certificate's own public key.
    pub fn verify_self_signed(&self) -> Result<()> {
        self.verify_signature(&self.rsa_public_key()?)
    }

    /// Uppercase hex SHA-1 over the DER encoding, as shown by certificate stores.
    pub fn thumbprint_sha1(&self) -> Result<String> {
        Ok(hex_upper(&Sha1::digest(self.to_der()?)))
    }

    pub fn thumbprint_sha256(&self) -> Result<String> {
        Ok(hex_upper(&Sha256::digest(self.to_der()?)))
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
