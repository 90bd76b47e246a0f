pub fn u8s_from_str(input: &str) -> [u8; 32] {
    blake3::hash(input.as_bytes()).into()
}

/// Derives an independent seed for a named stream from a base seed.
pub fn derive_seed(seed: &[u8; 32], stream: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_keyed(seed);
    hasher.update(stream.as_bytes());
    hasher.finalize().into()
}
