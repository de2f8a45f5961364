//! Skylink ARQ - Sequence rings
//!
//! Implements:
//! - Send ring with transmit cursor, acknowledgement tail and resend schedule
//! - Receive ring with bounded out-of-order horizon and in-order delivery
//! - Horizon bitmaps and sequence sync status for the control exchange
//!
//! Rings hold only `(element index, sequence)` pairs. Payload bytes live in the
//! channel's [`ElementBuffer`](crate::buffer::ElementBuffer), which is passed
//! into every operation that stores, reads or frees a payload.

mod item;
mod receive;
mod send;

pub use item::*;
pub use receive::*;
pub use send::*;
