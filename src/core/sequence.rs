//! Wrapping arithmetic for ARQ sequence numbers, ticks and ring positions.
//!
//! Sequence numbers live in a 16-bit space and wrap naturally. Ring positions
//! wrap at the ring length, which is unrelated to the sequence modulus, so the
//! two are never mixed in a single expression.

/// ARQ sequence number. Arithmetic is modulo 2^16.
pub type ArqSequence = u16;

/// Bitmap over the 16 sequences following a base sequence.
pub type ArqMask = u16;

/// Monotonic time supplied by the caller (MAC layer). Wraps at 2^32.
pub type Tick = u32;

/// Number of steps from `from` forward to `to` in sequence space.
#[inline]
pub fn sequence_offset(from: ArqSequence, to: ArqSequence) -> u16 {
    to.wrapping_sub(from)
}

/// Ticks elapsed since `then`, tolerating clock wraparound.
#[inline]
pub fn ticks_since(now: Tick, then: Tick) -> u32 {
    now.wrapping_sub(then)
}

/// Ring position `steps` ahead of `idx`.
#[inline]
pub(crate) fn ring_add(idx: usize, steps: usize, len: usize) -> usize {
    (idx + steps % len) % len
}

/// Number of steps from ring position `from` forward to `to`.
#[inline]
pub(crate) fn ring_distance(from: usize, to: usize, len: usize) -> usize {
    (to + len - from % len) % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_offset_wraps() {
        assert_eq!(sequence_offset(5, 9), 4);
        assert_eq!(sequence_offset(65534, 2), 4);
        assert_eq!(sequence_offset(9, 5), 65532);
    }

    #[test]
    fn test_ticks_since_wraps() {
        assert_eq!(ticks_since(1500, 500), 1000);
        assert_eq!(ticks_since(10, u32::MAX - 9), 20);
    }

    #[test]
    fn test_ring_arithmetic() {
        assert_eq!(ring_add(6, 3, 8), 1);
        assert_eq!(ring_add(0, 16, 8), 0);
        assert_eq!(ring_distance(6, 1, 8), 3);
        assert_eq!(ring_distance(1, 6, 8), 5);
        assert_eq!(ring_distance(4, 4, 8), 0);
    }
}
