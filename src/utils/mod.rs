//! Utility functions and helpers.

pub mod http;
pub mod time;

use sha2::{Digest, Sha256};

/// Short fingerprint of a query string, used in artifact file names so that
/// runs with different keyword sets never collide on the same path.
pub fn query_fingerprint(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    hex::encode(&digest[..4])
}
