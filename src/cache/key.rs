//! Deterministic cache keys derived from request parameters

use std::fmt;

use sha2::{Digest, Sha256};

/// Fingerprint of a request, used to address its cache entry
///
/// The fingerprint is the request kind followed by its parameters sorted by
/// name, with names and values trimmed. Two requests with the same
/// parameters therefore share a key no matter what order the parameters
/// were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: String,
    fingerprint: String,
    digest: String,
}

impl CacheKey {
    /// Compute the key for a request of the given kind
    ///
    /// # Arguments
    /// * `kind` - Request category, e.g. "data" or "metadata"; becomes the
    ///   file name prefix
    /// * `params` - Request parameters as name/value pairs
    pub fn new(kind: &str, params: &[(&str, String)]) -> Self {
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(name, value)| (escape(name.trim()), escape(value.trim())))
            .collect();
        pairs.sort();

        let query = pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        let fingerprint = format!("{}?{}", kind, query);

        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Self {
            kind: kind.to_string(),
            fingerprint,
            digest,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The canonical string the digest is computed from
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Hex-encoded SHA-256 digest of the fingerprint
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Name of the file holding this key's entry
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.kind, self.digest)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint)
    }
}

/// Escapes the separators used in fingerprints so distinct parameter lists
/// cannot produce the same string
fn escape(s: &str) -> String {
    s.replace('%', "%25").replace('&', "%26").replace('=', "%3D")
}
