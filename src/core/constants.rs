//! Protocol constants for Skylink virtual channels.
//!
//! Values marked as wire-level are fixed by the protocol and MUST match the
//! peer. The `DEFAULT_*` values are only starting points for [`VcConfig`] and
//! [`ArqConfig`].
//!
//! [`VcConfig`]: crate::vc::VcConfig
//! [`ArqConfig`]: crate::vc::ArqConfig

// =============================================================================
// FRAME LIMITS (wire-level)
// =============================================================================

/// The maximum payload size that fits a worst case frame with all extensions.
pub const MAX_PAYLOAD_LEN: usize = 177;

/// Size of the extension header byte (type nibble + length nibble).
pub const EXTENSION_HEADER_SIZE: usize = 1;

/// Encoded size of the ARQ sequence extension.
pub const EXT_ARQ_SEQUENCE_SIZE: usize = EXTENSION_HEADER_SIZE + 2;

/// Encoded size of the ARQ retransmit request extension.
pub const EXT_ARQ_REQUEST_SIZE: usize = EXTENSION_HEADER_SIZE + 2 + 2;

/// Encoded size of the ARQ control extension.
pub const EXT_ARQ_CONTROL_SIZE: usize = EXTENSION_HEADER_SIZE + 2 + 2;

/// Encoded size of the ARQ handshake extension.
pub const EXT_ARQ_HANDSHAKE_SIZE: usize = EXTENSION_HEADER_SIZE + 1 + 4;

/// Bytes available for extensions and payload in one frame.
pub const FRAME_BODY_LEN: usize = MAX_PAYLOAD_LEN
    + EXT_ARQ_SEQUENCE_SIZE
    + EXT_ARQ_REQUEST_SIZE
    + EXT_ARQ_CONTROL_SIZE
    + EXT_ARQ_HANDSHAKE_SIZE;

// =============================================================================
// ELEMENT BUFFER
// =============================================================================

/// Largest number of slots an element buffer can hold.
///
/// The two largest index values are reserved as link sentinels.
pub const ELEMENT_MAX_COUNT: usize = 65530;

/// Bytes used in the head slot of a chain to record the payload length.
pub const ELEMENT_LENGTH_PREFIX: usize = 2;

// =============================================================================
// SEQUENCE RINGS
// =============================================================================

/// Depth of the resend schedule. Overflow drops the oldest entry.
pub const ARQ_RESEND_SCHEDULE_DEPTH: usize = 16;

/// Upper bound for the receive ring horizon.
///
/// Also the largest lag between the peer's transmit head and our receive head
/// that is still considered recoverable by retransmission.
pub const ARQ_MAXIMUM_HORIZON: u16 = 64;

/// Width of the resend request bitmap in bits.
pub const ARQ_MASK_BITS: u16 = 16;

/// Minimum send ring length accepted by [`SendRing::new`](crate::ring::SendRing::new).
pub const SEND_RING_MIN_LEN: usize = 4;

/// Minimum receive ring length accepted by [`RcvRing::new`](crate::ring::RcvRing::new).
pub const RCV_RING_MIN_LEN: usize = 3;

// =============================================================================
// VIRTUAL CHANNEL CONFIGURATION BOUNDS
// =============================================================================

/// Shortest configurable ring.
pub const VC_RING_LEN_MIN: usize = 6;

/// Longest configurable ring.
pub const VC_RING_LEN_MAX: usize = 250;

/// Smallest configurable element payload size.
pub const VC_ELEMENT_SIZE_MIN: usize = 12;

/// Largest configurable element payload size.
pub const VC_ELEMENT_SIZE_MAX: usize = 500;

/// Default ring length for both rings.
pub const DEFAULT_RING_LEN: usize = 32;

/// Default receive horizon width.
pub const DEFAULT_HORIZON_WIDTH: u16 = 16;

/// Default element payload size.
pub const DEFAULT_ELEMENT_SIZE: usize = 32;

// =============================================================================
// ARQ TIMING (ticks)
// =============================================================================

/// Default session timeout. No progress for this long drops ARQ to off.
pub const DEFAULT_ARQ_TIMEOUT_TICKS: u32 = 10_000;

/// Valid range for the session timeout.
pub const ARQ_TIMEOUT_TICKS_RANGE: (u32, u32) = (1_000, 30_000);

/// Default idle time after which a control extension is sent unprompted.
pub const DEFAULT_IDLE_FRAME_THRESHOLD_TICKS: u32 = 1_000;

/// Valid range for the idle frame threshold.
pub const IDLE_FRAME_THRESHOLD_TICKS_RANGE: (u32, u32) = (100, 10_000);

/// Default number of frames without fresh payload a channel may emit per window.
pub const DEFAULT_IDLE_FRAMES_PER_WINDOW: u16 = 1;

/// Valid range for the idle frame budget.
pub const IDLE_FRAMES_PER_WINDOW_RANGE: (u16, u16) = (1, 4);
