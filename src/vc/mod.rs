//! Skylink ARQ - Virtual channels
//!
//! Implements:
//! - Channel configuration with validated ring geometry and ARQ timing
//! - ARQ session state machine (off, handshaking, on) with identifier races
//! - Frame filling by priority and in-order frame processing
//! - Session timeout, diagnostics and status snapshots
//! - Multi-channel link with round-robin scheduling (feature `link`)

mod channel;
mod config;
mod diag;
#[cfg(feature = "link")]
mod link;
mod state;

pub use channel::*;
pub use config::*;
pub use diag::*;
#[cfg(feature = "link")]
#[cfg_attr(docsrs, doc(cfg(feature = "link")))]
pub use link::*;
pub use state::{ArqState, SessionIdentifier};
