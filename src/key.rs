use std::fmt;

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::rand_core::CryptoRngCore;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{PfxKitError, Result};

/// An RSA key pair owned by a single issuance.
///
/// `Debug` output never includes private key material.
#[derive(Clone)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa<R: CryptoRngCore + ?Sized>(rng: &mut R, bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(rng, bits)
            .map_err(|e| PfxKitError::CryptoOperationError(format!("RSA key generation: {e}")))?;
        Ok(Self::from_private(private))
    }

    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    /// Decodes an unencrypted PKCS#8 `PrivateKeyInfo` holding an RSA key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| PfxKitError::DecodingError(format!("PKCS#8 RSA key: {e}")))?;
        Ok(Self::from_private(private))
    }

    /// Encodes the private key as unencrypted PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        Ok(self.private.to_pkcs8_der()?.as_bytes().to_vec())
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Length of the RSA modulus in bits.
    pub fn modulus_bits(&self) -> usize {
        self.public.n().bits()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &"RSA")
            .field("modulus_bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}
