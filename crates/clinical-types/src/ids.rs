//! Deterministic record identifiers and content hashes.
//!
//! The record id is derived from the source path alone, so re-ingesting a
//! file always targets the same store point (upsert, never append). The
//! content hash is derived from the file bytes and detects changed content
//! under an unchanged path.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive the stable record id for a source path.
///
/// The store requires UUID point ids, so the id is a UUID built from the
/// leading bytes of SHA-256(path). Same path, same id, always.
pub fn record_id_for_source(source_path: &str) -> String {
    let digest = Sha256::digest(source_path.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// SHA-256 of raw file bytes, hex-encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_deterministic() {
        let a = record_id_for_source("/data/P001/report.pdf");
        let b = record_id_for_source("/data/P001/report.pdf");
        assert_eq!(a, b);
    }

    #[test]
    fn test_record_id_differs_per_path() {
        let a = record_id_for_source("/data/P001/report.pdf");
        let b = record_id_for_source("/data/P002/report.pdf");
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_id_is_valid_uuid() {
        let id = record_id_for_source("/data/scan.png");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_content_hash_tracks_bytes() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }
}
