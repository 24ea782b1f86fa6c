//! Content-addressed fingerprinting
//!
//! The fingerprint (lowercase hex SHA-256 of the raw payload) is the
//! idempotency key for everything downstream: identical bytes always produce
//! the same fingerprint, so re-submitting a file never re-runs the pipeline.

use sha2::{Digest, Sha256};
use sonic_common::{Error, Result};

/// Compute the audio fingerprint for a payload.
///
/// Hashing is CPU-bound, so larger payloads are pushed onto the blocking pool.
pub async fn fingerprint(bytes: &[u8]) -> Result<String> {
    // Small payloads are not worth a blocking-pool round trip
    if bytes.len() < 256 * 1024 {
        return Ok(fingerprint_sync(bytes));
    }

    let owned = bytes.to_vec();
    tokio::task::spawn_blocking(move || fingerprint_sync(&owned))
        .await
        .map_err(|e| Error::Internal(format!("Fingerprint task failed: {}", e)))
}

/// Synchronous fingerprint; used directly by tests and small payloads
pub fn fingerprint_sync(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Whether the payload looks like audio.
///
/// Accepts a declared `audio/*` content type, and additionally sniffs the
/// payload magic bytes so a mislabeled audio file still ingests.
pub fn is_audio_payload(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if content_type.is_some_and(|ct| ct.starts_with("audio/")) {
        return true;
    }
    infer::get(bytes).is_some_and(|kind| kind.mime_type().starts_with("audio/"))
}
