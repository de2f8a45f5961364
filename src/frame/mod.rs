//! Skylink ARQ - Frame contents
//!
//! The decoded view of a frame that virtual channels fill and process: the
//! ARQ-on flag, typed ARQ extensions (at most one of each) and a payload
//! sharing the frame's space. Byte-level encoding, authentication and the
//! other frame fields belong to the framing layer.

mod content;
mod extension;

pub use content::*;
pub use extension::*;
