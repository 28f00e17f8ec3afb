//! Content Hashing
//!
//! FNV-1a helpers shared by the resource map, shader source deduplication
//! and content-derived UUIDs. Content hashes are rendered as 16 lowercase
//! hex digits so they fit the registry UUID format.

pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Folds `bytes` into an FNV-1a accumulator.
#[must_use]
pub fn fnv1a_bytes(bytes: &[u8], mut hash: u64) -> u64 {
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash of a standalone byte buffer.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    fnv1a_bytes(bytes, FNV_OFFSET_BASIS)
}

/// Hash of a standalone string.
#[must_use]
pub fn fnv1a_str(s: &str) -> u64 {
    fnv1a(s.as_bytes())
}

/// Formats a hash as the 16-hex-digit form used for content UUIDs and
/// shader source hashes.
#[must_use]
pub fn hex16(hash: u64) -> String {
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        // Standard FNV-1a test vectors.
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn hex16_is_16_lowercase_digits() {
        let s = hex16(fnv1a_str("hello"));
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn accumulation_differs_from_concat_with_separator() {
        let mut h = FNV_OFFSET_BASIS;
        h = fnv1a_bytes(b"ab", h);
        h = fnv1a_bytes(b"::", h);
        h = fnv1a_bytes(b"cd", h);
        assert_eq!(h, fnv1a(b"ab::cd"));
        assert_ne!(h, fnv1a(b"abcd"));
    }
}
