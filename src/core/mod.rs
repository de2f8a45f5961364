//! Skylink ARQ - Core types
//!
//! Protocol constants, error types and the wrapping arithmetic used for
//! sequence numbers and ticks. Nothing in here performs I/O.

mod constants;
mod error;
mod sequence;

pub use constants::*;
pub use error::*;
pub use sequence::*;
