//! Topic path <-> cell token codec
//!
//! Topic paths are `/`-separated digit segments used as pub/sub routing
//! keys. The first digit after the separators are stripped is a face digit
//! (0-5), every later digit is a quaternary digit (0-3).
//!
//! Cell tokens use the hierarchical spherical-cell id bit layout:
//!
//! ```text
//!  63   61 60 59 58 57        ...
//! [ face ][ d0  ][ d1  ] ... [ 1 ][ 0 ... 0 ]
//!                             ^ sentinel marks the subdivision depth
//! ```
//!
//! Digits map straight onto bit pairs in input order. No curve-order
//! transform is applied.

use std::fmt;

use super::digits::DigitSequence;

/// Bits occupied by the face id at the top of a cell id.
const FACE_BITS: u32 = 3;

/// Number of hex nibbles in a rendered 64-bit cell id.
const MAX_TOKEN_NIBBLES: usize = 16;

/// Error returned when a topic path cannot be turned into a cell token.
///
/// Every variant carries the offending topic for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid topic name, need a face digit and at least one more digit (topic: {topic:?})")]
    Malformed { topic: String },

    #[error("invalid face digit {digit:?}, expected 0-5 (topic: {topic:?})")]
    InvalidFace { topic: String, digit: char },

    #[error("invalid digit {digit:?} at position {position}, expected 0-3 (topic: {topic:?})")]
    InvalidDigit {
        topic: String,
        digit: char,
        position: usize,
    },
}

impl CodecError {
    /// The topic string that failed to decode.
    pub fn topic(&self) -> &str {
        match self {
            CodecError::Malformed { topic }
            | CodecError::InvalidFace { topic, .. }
            | CodecError::InvalidDigit { topic, .. } => topic,
        }
    }
}

/// Truncated lowercase hex rendering of a hierarchical cell id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellToken {
    token: String,
    id: u64,
}

impl CellToken {
    fn from_id(id: u64, nibbles: usize) -> Self {
        let nibbles = nibbles.clamp(1, MAX_TOKEN_NIBBLES);
        let mut token = format!("{:016x}", id);
        token.truncate(nibbles);

        let dropped_bits = 4 * (MAX_TOKEN_NIBBLES - nibbles) as u32;
        let id = id
            .checked_shr(dropped_bits)
            .and_then(|v| v.checked_shl(dropped_bits))
            .unwrap_or(0);

        CellToken { token, id }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Number of hex nibbles in the token.
    pub fn len(&self) -> usize {
        self.token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// The 64-bit id the token renders, with elided nibbles as zero.
    pub fn cell_id(&self) -> u64 {
        self.id
    }

    /// Face partition (0-5) this cell belongs to.
    pub fn face(&self) -> u8 {
        (self.id >> (64 - FACE_BITS)) as u8
    }

    /// Whether `other` lies inside this cell.
    ///
    /// The lowest set bit of the id marks the level; every id within
    /// `lsb - 1` of it on either side is a descendant (or the cell itself).
    pub fn contains(&self, other: &CellToken) -> bool {
        if self.id == 0 {
            return false;
        }
        let lsb = self.id & self.id.wrapping_neg();
        let lo = self.id - (lsb - 1);
        let hi = self.id.saturating_add(lsb - 1);
        (lo..=hi).contains(&other.id)
    }
}

impl fmt::Display for CellToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl AsRef<str> for CellToken {
    fn as_ref(&self) -> &str {
        &self.token
    }
}

/// Number of path segments a `/`-led prefix already contributes.
pub fn prefix_depth(prefix: &str) -> usize {
    prefix.matches('/').count()
}

/// Append `level - prefix_depth(prefix)` digits of `value` to `prefix`.
///
/// Digits always come from the top bits of `value`, whatever the prefix
/// already represents. Callers pick values whose top bits are the ones
/// meant to vary under the prefix.
pub fn build_topic(prefix: &str, value: u64, level: usize) -> String {
    let remaining = level.saturating_sub(prefix_depth(prefix));
    let digits = DigitSequence::new(value, remaining);

    let mut topic = String::with_capacity(prefix.len() + 2 * digits.len());
    topic.push_str(prefix);
    for digit in digits {
        topic.push('/');
        topic.push(char::from(b'0' + digit));
    }
    topic
}

/// Places `bits` so its lowest bit lands on `low` (which may be negative).
#[inline]
fn place(bits: u64, low: i32) -> u64 {
    if low >= 0 {
        bits << low
    } else {
        bits.checked_shr(low.unsigned_abs()).unwrap_or(0)
    }
}

/// Decode a topic path into its cell token.
pub fn decode_topic(topic: &str) -> Result<CellToken, CodecError> {
    let mut chars = topic.chars().filter(|&c| c != '/');

    let face = match chars.next() {
        Some(c @ '0'..='5') => u64::from(c as u8 - b'0'),
        Some(c) => {
            // A lone character is too short regardless of its value.
            if chars.clone().next().is_none() {
                return Err(CodecError::Malformed {
                    topic: topic.to_string(),
                });
            }
            return Err(CodecError::InvalidFace {
                topic: topic.to_string(),
                digit: c,
            });
        }
        None => {
            return Err(CodecError::Malformed {
                topic: topic.to_string(),
            })
        }
    };

    let mut id = face << (64 - FACE_BITS);
    let mut consumed = 0usize;
    for (position, c) in chars.enumerate() {
        let digit = match c {
            '0'..='3' => u64::from(c as u8 - b'0'),
            _ => {
                return Err(CodecError::InvalidDigit {
                    topic: topic.to_string(),
                    digit: c,
                    position: position + 1,
                })
            }
        };
        // slot n covers bits 60-2n and 59-2n
        id |= place(digit, 59 - 2 * position as i32);
        consumed += 1;
    }

    if consumed == 0 {
        return Err(CodecError::Malformed {
            topic: topic.to_string(),
        });
    }

    id |= place(1, 60 - 2 * consumed as i32);

    Ok(CellToken::from_id(id, 1 + consumed.div_ceil(2)))
}
