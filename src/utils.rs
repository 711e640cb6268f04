pub trait MyHash {
    /// Hash used for bucket selection in [`StateStorage`][crate::storage::StateStorage].
    fn hash(&self) -> u64;
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// [FNV-1a][fnv] over a byte slice, followed by a murmur3 finalizer so that
/// the high bits (used for stripe selection) are well mixed.
///
/// [fnv]: https://en.wikipedia.org/wiki/Fowler%E2%80%93Noll%E2%80%93Vo_hash_function
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

impl MyHash for [u8] {
    fn hash(&self) -> u64 {
        hash_bytes(self)
    }
}

/// Joins names sorted alphabetically with `", "`.
pub fn join_sorted<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut names: Vec<&str> = names.into_iter().collect();
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(b"state"), hash_bytes(b"state"));
        assert_ne!(hash_bytes(&[0, 1]), hash_bytes(&[1, 0]));
        assert_ne!(hash_bytes(&[]), hash_bytes(&[0]));
        assert_eq!(MyHash::hash(&b"abc"[..]), hash_bytes(b"abc"));
    }

    #[test]
    fn test_join_sorted() {
        assert_eq!(join_sorted(["F2", "F1", "F3"]), "F1, F2, F3");
        assert_eq!(join_sorted(Vec::<&str>::new()), "");
    }
}
