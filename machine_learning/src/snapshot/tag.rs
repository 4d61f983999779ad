const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

/// The 64 bit FNV-1a hash of a field name, used as its record tag.
pub const fn tag(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash = OFFSET_BASIS;
    let mut i = 0;

    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(PRIME);
        i += 1;
    }

    hash
}
