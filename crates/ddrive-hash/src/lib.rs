//! ddrive-hash: content fingerprints for deduplicated uploads
//!
//! The remote store keys blobs by the SHA-256 of their bytes, so every
//! upload carries the fingerprint computed here. Identical content always
//! yields the identical 64-char lowercase hex digest.

pub mod fingerprint;

pub use fingerprint::{fingerprint, fingerprint_file, is_fingerprint, EMPTY_FINGERPRINT};
