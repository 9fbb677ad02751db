#![allow(dead_code)]

use std::path::Path;

use pfxkit::cert::params::Validity;
use pfxkit::config::IssuerConfig;
use pfxkit::issuance::IssuanceRequest;
use time::macros::datetime;

/// Routes pipeline logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Small keys keep the suite fast where the modulus length is not under test.
pub fn fast_config() -> IssuerConfig {
    IssuerConfig::builder().key_bits(1024).build()
}

pub fn year_2024() -> Validity {
    Validity {
        not_before: datetime!(2024-01-01 0:00 UTC),
        not_after: datetime!(2025-01-01 0:00 UTC),
    }
}

pub fn request(dir: &Path, file: &str, name: &str, password: &str) -> IssuanceRequest {
    IssuanceRequest::builder()
        .subject(name)
        .issuer(name)
        .validity(year_2024())
        .password(password)
        .output_path(dir.join(file))
        .build()
}

/// Wraps `signatures` into a bare PE32 image whose security directory holds
/// one `WIN_CERTIFICATE` entry per signature.
pub fn pe32_with_signatures(signatures: &[&[u8]]) -> Vec<u8> {
    const PE_OFFSET: usize = 0x80;
    const OPTIONAL: usize = PE_OFFSET + 4 + 20;
    const OPTIONAL_SIZE: usize = 96 + 16 * 8;

    let mut image = vec![0u8; OPTIONAL + OPTIONAL_SIZE];
    image[..2].copy_from_slice(b"MZ");
    image[0x3c..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());
    image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
    // Machine: i386, one section.
    image[PE_OFFSET + 4..PE_OFFSET + 6].copy_from_slice(&0x014cu16.to_le_bytes());
    image[PE_OFFSET + 6..PE_OFFSET + 8].copy_from_slice(&1u16.to_le_bytes());
    image[PE_OFFSET + 20..PE_OFFSET + 22].copy_from_slice(&(OPTIONAL_SIZE as u16).to_le_bytes());
    image[OPTIONAL..OPTIONAL + 2].copy_from_slice(&0x10bu16.to_le_bytes());
    image[OPTIONAL + 92..OPTIONAL + 96].copy_from_slice(&16u32.to_le_bytes());

    // Stand-in for section data.
    image.extend_from_slice(&[0xcc; 0x200]);

    if signatures.is_empty() {
        return image;
    }

    let table_offset = image.len();
    for signature in signatures {
        let length = 8 + signature.len();
        image.extend_from_slice(&(length as u32).to_le_bytes());
        image.extend_from_slice(&0x0200u16.to_le_bytes());
        image.extend_from_slice(&0x0002u16.to_le_bytes());
        image.extend_from_slice(signature);
        while image.len() % 8 != 0 {
            image.push(0);
        }
    }
    let table_size = image.len() - table_offset;

    let security = OPTIONAL + 96 + 4 * 8;
    image[security..security + 4].copy_from_slice(&(table_offset as u32).to_le_bytes());
    image[security + 4..security + 8].copy_from_slice(&(table_size as u32).to_le_bytes());
    image
}
