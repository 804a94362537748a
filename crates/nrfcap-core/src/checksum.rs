//! Rolling adler32 checksum used for synthesized device identifiers.
//!
//! This is the rsync-style variant (no mod-65521 reduction) that the
//! capture orchestration host uses for its spoofed-but-stable UUIDs. It is
//! not the zlib Adler-32 and the two produce different values; interop with
//! the host requires this exact formulation.

/// Compute the rolling adler32 checksum of a byte slice.
///
/// Processes four bytes per step with weighted sums, then folds the
/// remainder bytewise, returning `(s1 & 0xffff) + (s2 << 16)` wrapped to
/// 32 bits.
///
/// # Example
///
/// ```
/// use nrfcap_core::adler32_rolling;
///
/// assert_eq!(adler32_rolling(b"kismet_cap_nrf_mousejack"), 0x7C0A09E6);
/// assert_eq!(adler32_rolling(b""), 0);
/// ```
pub fn adler32_rolling(buf: &[u8]) -> u32 {
    let mut s1: u32 = 0;
    let mut s2: u32 = 0;

    let mut chunks = buf.chunks_exact(4);
    for c in &mut chunks {
        let (b0, b1, b2, b3) = (c[0] as u32, c[1] as u32, c[2] as u32, c[3] as u32);
        s2 = s2.wrapping_add(
            (4u32.wrapping_mul(s1.wrapping_add(b0)))
                .wrapping_add(3 * b1)
                .wrapping_add(2 * b2)
                .wrapping_add(b3),
        );
        s1 = s1.wrapping_add(b0 + b1 + b2 + b3);
    }
    for &b in chunks.remainder() {
        s1 = s1.wrapping_add(b as u32);
        s2 = s2.wrapping_add(s1);
    }

    (s1 & 0xffff).wrapping_add(s2.wrapping_shl(16))
}
