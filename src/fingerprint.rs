//! URL fingerprinting.
//!
//! A fingerprint is the SHA-256 hex digest of a normalized URL and is the
//! dedup identity key for artifacts: two URLs that normalize identically are
//! the same logical item. Fingerprinting is pure — no I/O, no clocks — and
//! must produce identical output across platforms and repeated calls.
//!
//! Distinct from the content *checksum* computed during placement
//! (see [`crate::hasher`]): the fingerprint identifies the source URL, the
//! checksum identifies the downloaded bytes.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the fingerprint for a URL.
pub fn fingerprint(url: &str) -> String {
    let normalized = normalize_url(url);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonicalize a URL so that trivially-equivalent spellings collide.
///
/// Rules:
/// - scheme and host are lowercased, default ports dropped, and
///   percent-encoding canonicalized (all via the `url` parser)
/// - the fragment is dropped
/// - a single trailing slash is stripped from non-root paths
/// - query pairs are sorted by key, then value
///
/// Input that does not parse as an absolute URL is returned trimmed, so the
/// fingerprint is still deterministic for malformed candidates.
pub fn normalize_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url.trim()) else {
        return url.trim().to_string();
    };

    parsed.set_fragment(None);

    if parsed.path().ends_with('/') && parsed.path() != "/" {
        let trimmed = parsed.path().trim_end_matches('/').to_string();
        parsed.set_path(&trimmed);
    }

    if parsed.query().is_some() {
        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            // A bare "?" carries no pairs; treat it the same as no query.
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    parsed.to_string()
}
