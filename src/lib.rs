//! # Skylink ARQ
//!
//! Reliable virtual channels for a half-duplex radio link.
//!
//! Each virtual channel turns a lossy, reordering frame stream into an
//! in-order, at-most-once payload stream using selective-repeat ARQ:
//!
//! - **Bounded memory**: payloads live in a fixed slot pool sized at
//!   construction; nothing allocates per payload
//! - **Selective repeat**: receivers buffer out-of-order arrivals inside a
//!   horizon and request exactly the missing sequences
//! - **Self-healing sessions**: a handshake with session identifiers starts
//!   reliable mode; stalled sessions time out and renegotiate
//! - **Caller-driven time**: every time-dependent call takes `now` in ticks
//!
//! ## Feature Flags
//!
//! - `link` (default): [`Link`], several channels with round-robin scheduling
//! - `serde`: `Serialize`/`Deserialize` for the configuration types
//!
//! ## Modules
//!
//! - [`core`](crate::core): Constants, sequence arithmetic and error types
//! - [`buffer`]: Element buffer (fixed slot pool, chained payloads)
//! - [`ring`]: Send and receive sequence rings
//! - [`frame`]: Frame contents and ARQ extensions
//! - [`vc`]: Virtual channel state machine, configuration and diagnostics
//!
//! ## Example Usage
//!
//! ```rust
//! use skylink_arq::prelude::*;
//!
//! let mut diag = VcDiagnostics::default();
//! let mut ground = VirtualChannel::new(VcConfig::default())?;
//! let mut satellite = VirtualChannel::new(VcConfig::default())?;
//!
//! ground.begin_handshake(0);
//! ground.push_to_send(b"telecommand")?;
//!
//! // Ground proposes a session.
//! let mut frame = Frame::new();
//! ground.fill_frame(&mut frame, 1, 0, &mut diag)?;
//! satellite.process_frame(&frame, 1, &mut diag)?;
//!
//! // Satellite confirms it.
//! frame.clear();
//! satellite.fill_frame(&mut frame, 2, 0, &mut diag)?;
//! ground.process_frame(&frame, 2, &mut diag)?;
//! assert_eq!(ground.arq_state(), ArqState::On);
//!
//! // The queued payload now goes out with a sequence number.
//! frame.clear();
//! ground.fill_frame(&mut frame, 3, 0, &mut diag)?;
//! satellite.process_frame(&frame, 3, &mut diag)?;
//!
//! let mut buf = [0u8; MAX_PAYLOAD_LEN];
//! let n = satellite.read_received(&mut buf)?;
//! assert_eq!(&buf[..n], b"telecommand");
//! # Ok::<(), skylink_arq::SkylinkError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Storage and sequencing
pub mod buffer;
pub mod ring;

// Frame contents consumed and produced by channels
pub mod frame;

// Virtual channels (link container is feature-gated inside)
pub mod vc;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::buffer::*;
    pub use crate::core::*;
    pub use crate::frame::*;
    pub use crate::ring::*;
    pub use crate::vc::*;
}

// Re-export commonly used items at crate root
pub use crate::core::{SkylinkError, VcError};
pub use crate::frame::Frame;
pub use crate::vc::{ArqConfig, ArqState, VcConfig, VcDiagnostics, VcStatus, VirtualChannel};

#[cfg(feature = "link")]
pub use crate::vc::Link;
