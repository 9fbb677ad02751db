//! The issuance pipeline: key, certificate and keystore in one call.

use std::fmt;
use std::path::PathBuf;

use bon::Builder;

use crate::cert::Certificate;
use crate::cert::params::{CertificateParams, DistinguishedName, SerialNumber, Validity};
use crate::config::IssuerConfig;
use crate::error::Result;
use crate::issuer::build_and_sign;
use crate::key::KeyPair;
use crate::pkcs12::{normalize_container, package_container};
use crate::random::seeded_rng;

/// Everything needed to issue a self-signed certificate into a keystore file.
///
/// # Example
/// ```no_run
/// use pfxkit::cert::params::Validity;
/// use pfxkit::issuance::{IssuanceRequest, issue_certificate};
///
/// # fn main() -> pfxkit::error::Result<()> {
/// let request = IssuanceRequest::builder()
///     .subject("CN=test.local")
///     .issuer("CN=test.local")
///     .validity(Validity::for_days(365))
///     .password("hunter2")
///     .output_path("cert.pfx")
///     .build();
/// let issued = issue_certificate(&request)?;
/// println!("{}", issued.certificate.thumbprint_sha256()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Builder)]
pub struct IssuanceRequest {
    /// Subject name, e.g. `CN=test.local,O=Acme`.
    #[builder(into)]
    pub subject: String,
    /// Issuer name, parsed independently of the subject.
    #[builder(into)]
    pub issuer: String,
    pub validity: Validity,
    /// Protects both the key bag and the integrity MAC.
    #[builder(into)]
    pub password: String,
    /// Overwritten if it already exists.
    #[builder(into)]
    pub output_path: PathBuf,
}

impl fmt::Debug for IssuanceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuanceRequest")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("validity", &self.validity)
            .field("password", &"<redacted>")
            .field("output_path", &self.output_path)
            .finish()
    }
}

/// The result of a successful issuance.
#[derive(Clone, Debug)]
pub struct IssuedCertificate {
    pub certificate: Certificate,
    /// Friendly name carried by both keystore entries.
    pub alias: String,
    pub output_path: PathBuf,
}

/// Issues a certificate with the default [`IssuerConfig`].
pub fn issue_certificate(request: &IssuanceRequest) -> Result<IssuedCertificate> {
    issue_certificate_with(request, &IssuerConfig::default())
}

/// Generates a key, self-signs a certificate for it and writes both into a
/// PFX at `request.output_path`.
///
/// The randomness source is created for this call and dropped with it.
/// A failure while writing may leave a partial file behind.
pub fn issue_certificate_with(
    request: &IssuanceRequest,
    config: &IssuerConfig,
) -> Result<IssuedCertificate> {
    let mut rng = seeded_rng()?;

    let serial_number = SerialNumber::random(&mut rng);
    let subject = DistinguishedName::parse(&request.subject)?;
    let issuer = DistinguishedName::parse(&request.issuer)?;
    tracing::debug!(
        %serial_number,
        %subject,
        %issuer,
        not_before = %request.validity.not_before,
        not_after = %request.validity.not_after,
        "prepared certificate fields"
    );

    let key = KeyPair::generate_rsa(&mut rng, config.key_bits)?;
    tracing::debug!(key_bits = key.modulus_bits(), "generated RSA key");

    let params = CertificateParams::builder()
        .serial_number(serial_number)
        .subject(subject)
        .issuer(issuer)
        .validity(request.validity.clone())
        .build();
    let certificate = build_and_sign(&params, &key, config.signature_algorithm, &mut rng)?;
    tracing::debug!(algorithm = ?config.signature_algorithm, "signed certificate");

    let alias = certificate.subject().to_string();
    let packaged = package_container(&certificate, &key, &request.password, &alias)?;
    let normalized = normalize_container(&packaged, &request.password)?;
    tracing::debug!(size = normalized.len(), "packaged keystore");

    std::fs::write(&request.output_path, &normalized)?;
    tracing::info!(
        path = %request.output_path.display(),
        thumbprint = %certificate.thumbprint_sha256()?,
        %serial_number,
        "issued certificate"
    );

    Ok(IssuedCertificate {
        certificate,
        alias,
        output_path: request.output_path.clone(),
    })
}
