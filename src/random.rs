use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{PfxKitError, Result};

/// Builds a CSPRNG freshly seeded from the operating system.
///
/// Each issuance owns exactly one of these; it is never stored or shared
/// across calls.
pub fn seeded_rng() -> Result<StdRng> {
    StdRng::from_rng(rand_core::OsRng)
        .map_err(|e| PfxKitError::CryptoOperationError(format!("OS entropy unavailable: {e}")))
}
