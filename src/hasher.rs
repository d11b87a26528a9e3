//! Streaming content hashing.
//!
//! Content checksums drive storage placement, so the default algorithm is
//! blake3: content identity here is about naming bytes, not security, and
//! files regularly exceed 1GB. SHA-256/SHA-512 are kept for verifying
//! checksums supplied by download descriptors.
//!
//! Multiple algorithms can be computed in a single pass over the input, so
//! the bottleneck is the slowest requested hash rather than repeated reads.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256, Sha512};

/// Read size for streaming file hashing.
const CHUNK_SIZE: usize = 1 << 16;

/// Supported content-hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Blake3,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => anyhow::bail!("Unsupported hash algorithm: '{}'", other),
        }
    }
}

enum Hasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Hasher::Blake3(h) => {
                h.update(chunk);
            }
            Hasher::Sha256(h) => h.update(chunk),
            Hasher::Sha512(h) => h.update(chunk),
        }
    }

    fn finalize(self) -> String {
        match self {
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Compute the requested hashes over a reader in one streaming pass.
///
/// Returns lowercase hex digests keyed by algorithm.
pub fn hash_reader<R: Read>(
    mut reader: R,
    algorithms: &[HashAlgorithm],
) -> Result<HashMap<HashAlgorithm, String>> {
    let mut hashers: Vec<(HashAlgorithm, Hasher)> = algorithms
        .iter()
        .map(|&algorithm| (algorithm, Hasher::new(algorithm)))
        .collect();

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        for (_, hasher) in &mut hashers {
            hasher.update(&buf[..read]);
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(algorithm, hasher)| (algorithm, hasher.finalize()))
        .collect())
}

/// Compute the requested hashes over a file in one streaming pass.
pub fn hash_file(
    path: &Path,
    algorithms: &[HashAlgorithm],
) -> Result<HashMap<HashAlgorithm, String>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    hash_reader(file, algorithms)
}

/// Compute the content checksum used for storage placement.
pub fn content_checksum(path: &Path) -> Result<String> {
    let mut hashes = hash_file(path, &[HashAlgorithm::Blake3])?;
    // hash_file always returns one entry per requested algorithm
    hashes
        .remove(&HashAlgorithm::Blake3)
        .context("blake3 digest missing from hash result")
}
