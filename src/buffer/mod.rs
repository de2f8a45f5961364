//! Skylink ARQ - Element buffer
//!
//! Fixed-capacity storage for variable-length payloads. The pool is allocated
//! once; payloads are stored as index-linked chains of equal-size slots and
//! addressed by the index of the chain head.

mod element;

pub use element::*;
