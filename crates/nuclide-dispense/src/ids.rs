//! Deterministic identifiers for minted vials and waste records.
//!
//! Ids are derived from the record's content with BLAKE3 so that the pure
//! allocation functions stay reproducible for a given input.

use chrono::{DateTime, Utc};
use nuclide_core::types::Vial;

/// `prefix-` followed by 16 hex chars of BLAKE3 over `parts`.
pub fn derive_id(prefix: &str, parts: &[&[u8]]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix.as_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let digest = hasher.finalize();
    format!("{prefix}-{}", hex::encode(&digest.as_bytes()[..8]))
}

/// Id for a waste record produced from `origin` at `at`.
pub fn waste_id(origin: &str, tag: &str, at: DateTime<Utc>) -> String {
    derive_id(
        "wst",
        &[
            origin.as_bytes(),
            tag.as_bytes(),
            &at.timestamp_millis().to_le_bytes(),
        ],
    )
}

/// Id for a vial minted at `at`, avoiding every id already in `taken`.
pub fn vial_id(prefix: &str, at: DateTime<Utc>, amount: f64, volume_ml: f64, taken: &[Vial]) -> String {
    let mut nonce: u64 = 0;
    loop {
        let candidate = derive_id(
            prefix,
            &[
                &at.timestamp_millis().to_le_bytes(),
                &amount.to_le_bytes(),
                &volume_ml.to_le_bytes(),
                &nonce.to_le_bytes(),
            ],
        );
        if !taken.iter().any(|v| v.id == candidate) {
            return candidate;
        }
        nonce += 1;
    }
}
