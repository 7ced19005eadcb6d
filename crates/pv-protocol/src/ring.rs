//! Consistent-hash ring placement helpers.
//!
//! The peerview organizes rendezvous peers on a 256-bit hash ring divided
//! into equal clusters. A peer's position (`target_hash`) is the SHA-256
//! digest of its id; its coverage (`target_hash_radius`) is half a cluster
//! width. Positions travel on the wire as uppercase hex strings with
//! leading zeros stripped, a big-number text form.

use sha2::{Digest, Sha256};

use crate::PeerId;

/// Ring position for a peer: uppercase hex of SHA-256(id).
pub fn target_hash(peer_id: &PeerId) -> String {
    let digest = Sha256::digest(peer_id.to_string().as_bytes());
    to_bignum_hex(&digest)
}

/// Coverage radius for a ring divided into `clusters` clusters: half a
/// cluster width, i.e. 2^256 / (2 * clusters).
pub fn hash_radius(clusters: u32) -> String {
    let divisor = u64::from(clusters.max(1)) * 2;
    to_bignum_hex(&div_pow2_256(divisor))
}

/// Which cluster a ring position falls in.
///
/// Malformed hash strings map to cluster 0.
pub fn cluster_for_hash(hash: &str, clusters: u32) -> u32 {
    let clusters = clusters.max(1);
    // Scale by the leading 64 bits of the position.
    let mut prefix = [0u8; 8];
    let bytes = match from_bignum_hex(hash) {
        Some(b) => b,
        None => return 0,
    };
    prefix.copy_from_slice(&bytes[..8]);
    let lead = u64::from_be_bytes(prefix);
    ((u128::from(lead) * u128::from(clusters)) >> 64) as u32
}

/// 2^256 / divisor as a 32-byte big-endian value. Requires divisor >= 2.
fn div_pow2_256(divisor: u64) -> [u8; 32] {
    let mut quotient = [0u8; 32];
    let mut remainder: u128 = 1; // the leading 2^256 bit
    for q in quotient.iter_mut() {
        let acc = remainder << 8;
        *q = (acc / u128::from(divisor)) as u8;
        remainder = acc % u128::from(divisor);
    }
    quotient
}

fn to_bignum_hex(bytes: &[u8]) -> String {
    let full = hex::encode_upper(bytes);
    let trimmed = full.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decode a big-number hex string back to 32 bytes, left-padded.
fn from_bignum_hex(hash: &str) -> Option<[u8; 32]> {
    let hash = hash.trim();
    if hash.is_empty() || hash.len() > 64 {
        return None;
    }
    let padded = format!("{:0>64}", hash);
    let decoded = hex::decode(&padded).ok()?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&decoded);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_hash_deterministic() {
        let id = PeerId::new_unique();
        assert_eq!(target_hash(&id), target_hash(&id));
        assert_ne!(target_hash(&id), target_hash(&PeerId::new_unique()));
    }

    #[test]
    fn test_radius_single_cluster_is_half_space() {
        // 2^256 / 2 = 0x8000...0 (63 zeros).
        let radius = hash_radius(1);
        assert_eq!(radius.len(), 64);
        assert!(radius.starts_with('8'));
        assert!(radius[1..].chars().all(|c| c == '0'));
    }

    #[test]
    fn test_cluster_for_hash_bounds() {
        assert_eq!(cluster_for_hash("0", 4), 0);
        let top = "F".repeat(64);
        assert_eq!(cluster_for_hash(&top, 4), 3);
        assert_eq!(cluster_for_hash("not-hex", 4), 0);
    }

    #[test]
    fn test_cluster_spread() {
        let clusters = 4;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let hash = target_hash(&PeerId::new_unique());
            let c = cluster_for_hash(&hash, clusters);
            assert!(c < clusters);
            seen.insert(c);
        }
        assert!(seen.len() > 1);
    }
}
