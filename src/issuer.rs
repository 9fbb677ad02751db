use der::Encode;
use rsa::pkcs1v15::SigningKey;
use rsa::rand_core::CryptoRngCore;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::certificate::CertificateInner;

use crate::cert::params::{CertificateParams, DistinguishedName};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{PfxKitError, Result};
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This is the seam behind which the signing algorithm lives: the
/// issuance pipeline only ever calls [`Issuer::issue`].
pub trait Issuer {
    /// The name written into the issuer field of issued certificates.
    fn issuer_name(&self) -> &DistinguishedName;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the algorithm used to sign.
    fn signature_algorithm(&self) -> SignatureAlgorithm;

    /// Builds the TBS certificate for `params` and signs it.
    ///
    /// `params.issuer` is ignored in favour of [`Issuer::issuer_name`].
    /// The certificate carries `subject_public_key` as its key.
    fn issue<R: CryptoRngCore>(
        &self,
        params: &CertificateParams,
        subject_public_key: &rsa::RsaPublicKey,
        rng: &mut R,
    ) -> Result<Certificate> {
        let signature_algorithm = self.signature_algorithm();

        let tbs_cert = TbsCertificate {
            serial_number: params.serial_number,
            signature_algorithm,
            issuer: self.issuer_name().clone(),
            validity: params.validity.clone(),
            subject: params.subject.clone(),
            subject_public_key: subject_public_key.clone(),
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| PfxKitError::EncodingError(e.to_string()))?;

        let signature = sign_data(self.signing_key(), signature_algorithm, &tbs_der, rng)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.algorithm_identifier()?,
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| PfxKitError::EncodingError(e.to_string()))?,
        };

        Ok(Certificate::from_inner(cert_inner))
    }
}

/// Signs `data` with RSASSA-PKCS1-v1_5, blinding the private-key operation with `rng`.
pub fn sign_data<R: CryptoRngCore>(
    key: &KeyPair,
    algorithm: SignatureAlgorithm,
    data: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let private = key.private_key().clone();
    let signature = match algorithm {
        SignatureAlgorithm::Sha256WithRSA => SigningKey::<Sha256>::new(private)
            .try_sign_with_rng(rng, data)?
            .to_vec(),
        SignatureAlgorithm::Sha384WithRSA => SigningKey::<Sha384>::new(private)
            .try_sign_with_rng(rng, data)?
            .to_vec(),
        SignatureAlgorithm::Sha512WithRSA => SigningKey::<Sha512>::new(private)
            .try_sign_with_rng(rng, data)?
            .to_vec(),
    };
    Ok(signature)
}

/// An issuer that signs with the subject's own key.
///
/// The issuer name is independent of the subject name, so a self-signed
/// certificate may still name a different issuer.
pub struct SelfSigned<'a> {
    pub name: DistinguishedName,
    pub key: &'a KeyPair,
    pub algorithm: SignatureAlgorithm,
}

impl Issuer for SelfSigned<'_> {
    fn issuer_name(&self) -> &DistinguishedName {
        &self.name
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }
}

/// Issues a self-signed certificate for `params`, naming `params.issuer` as issuer.
pub fn build_and_sign<R: CryptoRngCore>(
    params: &CertificateParams,
    key: &KeyPair,
    algorithm: SignatureAlgorithm,
    rng: &mut R,
) -> Result<Certificate> {
    let issuer = SelfSigned {
        name: params.issuer.clone(),
        key,
        algorithm,
    };
    issuer.issue(params, key.public_key(), rng)
}
