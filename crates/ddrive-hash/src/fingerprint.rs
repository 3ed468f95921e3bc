//! SHA-256 fingerprinting for byte slices and files

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// SHA-256 of the empty byte sequence.
pub const EMPTY_FINGERPRINT: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const FINGERPRINT_LEN: usize = 64;

/// Fingerprint a byte slice in memory.
///
/// Empty input returns [`EMPTY_FINGERPRINT`] without running the digest.
pub fn fingerprint(data: &[u8]) -> String {
    if data.is_empty() {
        return EMPTY_FINGERPRINT.to_string();
    }
    format!("{:x}", Sha256::digest(data))
}

/// Fingerprint a file from disk using the streaming interface.
///
/// Produces the same digest as [`fingerprint`] over the file's full contents.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)
        .with_context(|| format!("opening file for fingerprint: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
    let mut total = 0u64;

    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading for fingerprint: {}", path.display()))?;
        if n == 0 {
            break;
        }
        total += n as u64;
        hasher.update(&buf[..n]);
    }

    if total == 0 {
        return Ok(EMPTY_FINGERPRINT.to_string());
    }
    tracing::debug!(path = %path.display(), bytes = total, "fingerprinted file");
    Ok(format!("{:x}", hasher.finalize()))
}

/// True if `s` has the shape of a fingerprint (64 lowercase hex chars).
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN
        && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
