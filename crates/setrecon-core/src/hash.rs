//! Domain-separated Blake3 hashing into integer ranges.

use num::BigUint;

/// Domain prefix for mapping elements into the CPISync hash domain.
pub const ELEMENT_DOMAIN: &[u8] = b"setrecon-element-v0:";

/// Domain prefix for partitioning elements across tree nodes.
pub const PARTITION_DOMAIN: &[u8] = b"setrecon-partition-v0:";

/// Domain prefix for IBLT bucket selection.
pub const BUCKET_DOMAIN: &[u8] = b"setrecon-iblt-bucket-v0:";

/// Domain prefix for IBLT key checksums.
pub const CHECK_DOMAIN: &[u8] = b"setrecon-iblt-check-v0:";

/// Hash `data` to a uniform integer in `[0, 2^bits)`.
pub fn hash_to_bits(domain: &[u8], data: &[u8], bits: u32) -> BigUint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(data);

    let len = (bits as usize + 7) / 8;
    let mut out = vec![0u8; len];
    hasher.finalize_xof().fill(&mut out);

    // Clear the excess high bits of the leading byte.
    let excess = len * 8 - bits as usize;
    if let Some(first) = out.first_mut() {
        *first &= 0xFFu8.checked_shr(excess as u32).unwrap_or(0);
    }
    BigUint::from_bytes_be(&out)
}

/// Hash `data` under a numbered seed to a `u64`.
pub fn hash_u64(domain: &[u8], seed: u64, data: &[u8]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&seed.to_be_bytes());
    hasher.update(data);
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_be_bytes(word)
}
