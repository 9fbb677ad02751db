//! # PfxKit - Self-Signed Certificates in PKCS#12 Keystores
//!
//! PfxKit issues self-signed X.509 certificates over fresh RSA keys and
//! stores them, key included, in password-protected PKCS#12 (PFX) files.
//! It is built on the RustCrypto libraries and needs no OpenSSL at runtime
//! (OpenSSL is only used by the test suite to cross-check the output).
//!
//! ## Operations
//!
//! - [`issue_certificate`]: generate an RSA-2048 key, self-sign a v3
//!   certificate with SHA-256, and write key and certificate to a PFX.
//! - [`verify_container_password`]: `true` if a PFX opens with a password.
//! - [`extract_signing_certificate`]: pull the signer certificate out of an
//!   Authenticode-signed PE image or a detached PKCS#7 signature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pfxkit::cert::params::Validity;
//! use pfxkit::issuance::IssuanceRequest;
//! use time::macros::datetime;
//!
//! # fn main() -> pfxkit::error::Result<()> {
//! let request = IssuanceRequest::builder()
//!     .subject("CN=test.local,O=Example Corp")
//!     .issuer("CN=test.local,O=Example Corp")
//!     .validity(Validity {
//!         not_before: datetime!(2024-01-01 0:00 UTC),
//!         not_after: datetime!(2025-01-01 0:00 UTC),
//!     })
//!     .password("hunter2")
//!     .output_path("cert.pfx")
//!     .build();
//!
//! let issued = pfxkit::issue_certificate(&request)?;
//! println!("wrote {} ({})", issued.output_path.display(), issued.alias);
//!
//! assert!(pfxkit::verify_container_password("cert.pfx", "hunter2"));
//! assert!(!pfxkit::verify_container_password("cert.pfx", "wrong"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a Signer Certificate
//!
//! ```rust,no_run
//! use pfxkit::error::PfxKitError;
//!
//! match pfxkit::extract_signing_certificate("setup.exe") {
//!     Ok(cert) => println!("signed by {}", cert.subject()),
//!     Err(PfxKitError::SignatureNotFound(_)) => println!("not signed"),
//!     Err(e) => println!("unreadable signature: {e}"),
//! }
//! ```
//!
//! ## Logging
//!
//! Pipeline steps are reported through [`tracing`]. Install a subscriber
//! to see them; the library never installs one itself.
//!
//! ## Module Organization
//!
//! - [`issuance`]: The end-to-end issuance pipeline
//! - [`pkcs12`]: Keystore packaging, decoding and password checks
//! - [`signed_file`]: Signer certificate extraction
//! - [`cert`]: Certificate decoding, encoding, thumbprints and signature checks
//! - [`issuer`]: Certificate signing
//! - [`key`]: RSA key generation and PKCS#8 import/export
//! - [`tbs_certificate`]: Low-level certificate structure manipulation
//! - [`config`]: Algorithm defaults
//! - [`error`]: Error types

pub mod cert;
pub mod config;
pub mod error;
pub mod issuance;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod pkcs12;
pub mod random;
pub mod signed_file;
pub mod tbs_certificate;

pub use issuance::{issue_certificate, issue_certificate_with};
pub use pkcs12::verify_container_password;
pub use signed_file::extract_signing_certificate;
