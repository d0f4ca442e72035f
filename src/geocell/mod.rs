//! Geocell Topic Codec
//!
//! Turns timestamps (or any 64-bit value) into hierarchical topic paths and
//! topic paths back into cell tokens:
//!
//! ```text
//! u64 --digits--> /prefix/d/d/d... --decode_topic--> "1740"
//! ```
//!
//! Topic paths route plain pub/sub traffic; cell tokens route
//! location-aware traffic.

mod digits;
mod topic;

pub use digits::{digits, DigitSequence, MAX_LEVELS};
pub use topic::{build_topic, decode_topic, prefix_depth, CellToken, CodecError};
