//! Quaternary digit extraction
//!
//! Splits a 64-bit value into base-4 digits, most significant bit pair
//! first. A 64-bit value holds at most 32 such digits.

/// Maximum number of quaternary digits a `u64` can supply.
pub const MAX_LEVELS: usize = 32;

/// Iterator over the base-4 digits of a value, top bit pair first.
#[derive(Debug, Clone)]
pub struct DigitSequence {
    value: u64,
    next: usize,
    levels: usize,
}

impl DigitSequence {
    /// Yield up to `max_levels` digits of `value` (capped at [`MAX_LEVELS`]).
    pub fn new(value: u64, max_levels: usize) -> Self {
        DigitSequence {
            value,
            next: 0,
            levels: max_levels.min(MAX_LEVELS),
        }
    }
}

impl Iterator for DigitSequence {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        if self.next >= self.levels {
            return None;
        }
        let shift = 62 - 2 * self.next;
        self.next += 1;
        Some(((self.value >> shift) & 0b11) as u8)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.levels - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DigitSequence {}

/// Collect up to `max_levels` quaternary digits of `value`.
pub fn digits(value: u64, max_levels: usize) -> Vec<u8> {
    DigitSequence::new(value, max_levels).collect()
}
