//! Issuance defaults.
//!
//! The algorithm choices of the issuance pipeline live here as named
//! constants so that tests (and callers) can swap them without touching the
//! pipeline itself.

use bon::Builder;

use crate::cert::SignatureAlgorithm;

/// RSA modulus length used when nothing else is configured.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Largest serial number handed out, `2^63 - 1`.
pub const MAX_SERIAL: u64 = i64::MAX as u64;

/// Iteration count for the keystore bag encryption and integrity MAC.
pub const PBE_ITERATIONS: u32 = 2048;

/// Signature algorithm used when nothing else is configured.
pub const DEFAULT_SIGNATURE_ALGORITHM: SignatureAlgorithm = SignatureAlgorithm::Sha256WithRSA;

/// Knobs for the key generator and certificate signer.
///
/// # Example
/// ```
/// use pfxkit::config::IssuerConfig;
///
/// let config = IssuerConfig::builder().key_bits(1024).build();
/// assert_eq!(config.key_bits, 1024);
/// assert_eq!(config.signature_algorithm, pfxkit::cert::SignatureAlgorithm::Sha256WithRSA);
/// ```
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct IssuerConfig {
    /// RSA modulus length in bits.
    #[builder(default = DEFAULT_KEY_BITS)]
    pub key_bits: usize,
    /// Algorithm used for the self-signature.
    #[builder(default = DEFAULT_SIGNATURE_ALGORITHM)]
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            signature_algorithm: DEFAULT_SIGNATURE_ALGORITHM,
        }
    }
}
