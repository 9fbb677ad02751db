//! use pfxkit::error::PfxKitError;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PfxKitError>;

/// Represents errors that can occur in the PfxKit library.
///
/// Issuance and extraction propagate every variant to the caller. Password
/// verification is the only operation that folds them into `false`.
#[derive(Debug, Error, Clone)]
pub enum PfxKitError {
    /// A caller-supplied value (DN string, timestamp) could not be encoded.
    #[error("Invalid input: {0}")]
    InputEncodingError(String),

    /// Entropy, key generation or signing failure.
    #[error("Cryptographic operation failed: {0}")]
    CryptoOperationError(String),

    /// The PKCS#12 container could not be built or opened.
    #[error("Keystore container error: {0}")]
    ContainerError(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// The file carries no signature.
    #[error("No signature found: {0}")]
    SignatureNotFound(String),

    /// The embedded signature could not be used.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

impl From<der::Error> for PfxKitError {
    /// Converts a `der::Error` into a `PfxKitError`.
    fn from(err: der::Error) -> Self {
        PfxKitError::DecodingError(err.to_string())
    }
}

impl From<spki::Error> for PfxKitError {
    fn from(err: spki::Error) -> Self {
        PfxKitError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for PfxKitError {
    fn from(err: rsa::Error) -> Self {
        PfxKitError::CryptoOperationError(err.to_string())
    }
}

impl From<rsa::signature::Error> for PfxKitError {
    fn from(err: rsa::signature::Error) -> Self {
        PfxKitError::CryptoOperationError(err.to_string())
    }
}

impl From<rsa::pkcs8::Error> for PfxKitError {
    fn from(err: rsa::pkcs8::Error) -> Self {
        PfxKitError::EncodingError(err.to_string())
    }
}

impl From<pem::PemError> for PfxKitError {
    fn from(err: pem::PemError) -> Self {
        PfxKitError::DecodingError(err.to_string())
    }
}

impl From<std::io::Error> for PfxKitError {
    fn from(err: std::io::Error) -> Self {
        PfxKitError::IoError(err.to_string())
    }
}
