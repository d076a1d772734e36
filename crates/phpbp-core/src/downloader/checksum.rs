//! Digest verification for downloaded tarballs.
//!
//! Catalog checksums are opaque change markers. They are only verified
//! against the tarball when they look like a hex digest we can compute.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::Result;

/// Supported checksum types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumType {
    /// Detect checksum type from a hex string, `None` for opaque values
    pub fn detect(checksum: &str) -> Option<Self> {
        if !checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        match checksum.len() {
            32 => Some(ChecksumType::Md5),
            40 => Some(ChecksumType::Sha1),
            64 => Some(ChecksumType::Sha256),
            128 => Some(ChecksumType::Sha512),
            _ => None,
        }
    }
}

/// Compute the hex digest of a file
pub fn compute_checksum(path: &Path, checksum_type: ChecksumType) -> Result<String> {
    let reader = BufReader::new(File::open(path)?);

    Ok(match checksum_type {
        ChecksumType::Md5 => digest_reader::<Md5, _>(reader)?,
        ChecksumType::Sha1 => digest_reader::<Sha1, _>(reader)?,
        ChecksumType::Sha256 => digest_reader::<Sha256, _>(reader)?,
        ChecksumType::Sha512 => digest_reader::<Sha512, _>(reader)?,
    })
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Verify a file against `expected`.
///
/// Returns `Ok(None)` when the checksum is opaque and was not checked,
/// otherwise the actual digest and whether it matched.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<Option<(String, bool)>> {
    let Some(checksum_type) = ChecksumType::detect(expected) else {
        return Ok(None);
    };

    let actual = compute_checksum(path, checksum_type)?;
    let matched = actual.eq_ignore_ascii_case(expected);
    Ok(Some((actual, matched)))
}
