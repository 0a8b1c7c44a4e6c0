//! Big-endian two's complement samples, 1 to 4 bytes wide.

/// Sign-extend the big-endian integer in `bytes`.
///
pub fn decode_be(bytes: &[u8]) -> i32 {
    let n = bytes.len();
    assert!((1..=4).contains(&n), "sample width in 1..=4 bytes");

    let raw = bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

    // Park the sign bit at bit 31, then shift back arithmetically.
    let shift = 32 - 8 * n as u32;
    ((raw << shift) as i32) >> shift
}

/// Write the low `out.len()` bytes of `value`, big-endian.
pub fn encode_be(value: i32, out: &mut [u8]) {
    let n = out.len();
    assert!((1..=4).contains(&n), "sample width in 1..=4 bytes");

    let bytes = value.to_be_bytes();
    out.copy_from_slice(&bytes[4 - n..]);
}

/// Largest magnitude a sample `nbytes` wide can take.
pub fn full_scale(nbytes: usize) -> f64 {
    (1u64 << (8 * nbytes - 1)) as f64
}

/// Peak level relative to full scale. Silence is negative infinity.
pub fn dbfs(peak: u32, nbytes: usize) -> f64 {
    if peak == 0 {
        return f64::NEG_INFINITY;
    }
    20.0 * (f64::from(peak) / full_scale(nbytes)).log10()
}
