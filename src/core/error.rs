//! Error types for Skylink virtual channels.
//!
//! Every error here is recoverable. Capacity errors clear up on their own once
//! the peer acknowledges or the application reads; validity errors point at a
//! caller or protocol mismatch. Session-level divergence is not an error at
//! all: it is healed by the ARQ timeout and a fresh handshake.

use thiserror::Error;

use super::sequence::ArqSequence;

/// Errors from the element buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Not enough free slots for the payload.
    #[error("element buffer has no space for {required} slots ({free} free)")]
    NoSpace {
        /// Slots the payload needs.
        required: usize,
        /// Slots currently free.
        free: usize,
    },

    /// Index is not the head of a stored chain.
    #[error("index {0} is not a chain head")]
    InvalidIndex(usize),

    /// Stored payload does not fit the target buffer.
    #[error("stored payload of {length} bytes exceeds target of {max} bytes")]
    TooLong {
        /// Stored payload length.
        length: usize,
        /// Capacity of the target.
        max: usize,
    },

    /// Payload length cannot be represented in the chain header.
    #[error("payload of {0} bytes cannot be stored")]
    PayloadTooLong(usize),

    /// A chain walk hit a free slot or broken back-link.
    #[error("element chain corrupted at index {0}")]
    ChainCorrupted(usize),
}

/// Errors from the send and receive rings.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Send ring has no free slot (`head + 1 == tail`).
    #[error("ring full")]
    RingFull,

    /// Nothing to read or transmit.
    #[error("ring empty")]
    Empty,

    /// Received sequence is outside `[head, head + horizon]`.
    #[error("sequence {sequence} outside receive window starting at {head}")]
    OutOfWindow {
        /// Rejected sequence.
        sequence: ArqSequence,
        /// Receive head sequence at the time.
        head: ArqSequence,
    },

    /// Sequence is not transmitted-but-unacknowledged, so cannot be resent.
    #[error("sequence {0} cannot be recalled")]
    NotRecallable(ArqSequence),

    /// Acknowledgement for a sequence outside `[tail, tx]`.
    #[error("acknowledge of {sequence} outside [{tail}, {tx}]")]
    InvalidAcknowledge {
        /// Acknowledged sequence.
        sequence: ArqSequence,
        /// Oldest retained sequence.
        tail: ArqSequence,
        /// First untransmitted sequence.
        tx: ArqSequence,
    },

    /// Underlying element buffer error.
    #[error("element buffer: {0}")]
    Buffer(#[from] BufferError),
}

impl RingError {
    /// Capacity errors clear once the peer acknowledges or the application reads.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            RingError::RingFull
                | RingError::Empty
                | RingError::Buffer(BufferError::NoSpace { .. })
        )
    }

    /// Validity errors indicate a caller or protocol mismatch.
    pub fn is_validity(&self) -> bool {
        !self.is_capacity()
    }
}

/// Errors from building a frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The extension type is already present in this frame.
    #[error("duplicate extension")]
    DuplicateExtension,

    /// Not enough room left in the frame.
    #[error("frame has {available} bytes left, {required} required")]
    NoSpace {
        /// Bytes required.
        required: usize,
        /// Bytes left.
        available: usize,
    },
}

/// Errors from validating a channel configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Ring length outside the supported range.
    #[error("{ring} ring length {len} outside {min}..={max}")]
    RingLength {
        /// Which ring.
        ring: &'static str,
        /// Configured length.
        len: usize,
        /// Minimum length.
        min: usize,
        /// Maximum length.
        max: usize,
    },

    /// Horizon too wide for the receive ring.
    #[error("horizon width {horizon} exceeds limit {max}")]
    HorizonWidth {
        /// Configured horizon.
        horizon: u16,
        /// Largest allowed horizon.
        max: u16,
    },

    /// Element size outside the supported range.
    #[error("element size {size} outside {min}..={max}")]
    ElementSize {
        /// Configured size.
        size: usize,
        /// Minimum size.
        min: usize,
        /// Maximum size.
        max: usize,
    },

    /// Element buffer would need more slots than it can index.
    #[error("element buffer would need {0} slots")]
    ElementCount(usize),

    /// ARQ timing parameter outside its range.
    #[error("ARQ parameter {name} = {value} outside {min}..={max}")]
    ArqParameter {
        /// Parameter name.
        name: &'static str,
        /// Configured value.
        value: u32,
        /// Minimum value.
        min: u32,
        /// Maximum value.
        max: u32,
    },
}

/// Errors from a virtual channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VcError {
    /// Ring-level error.
    #[error("ring error: {0}")]
    Ring(#[from] RingError),

    /// Frame construction error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Payload larger than a frame can carry.
    #[error("payload of {length} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload length.
        length: usize,
        /// Largest allowed payload.
        max: usize,
    },

    /// Payload received while ARQ is on but without a sequence extension.
    #[error("payload without ARQ sequence while ARQ is on")]
    MissingSequence,

    /// Session identifier zero is reserved for "no session".
    #[error("session identifier 0 is reserved for no session")]
    ReservedSessionIdentifier,
}

impl From<BufferError> for VcError {
    fn from(err: BufferError) -> Self {
        VcError::Ring(RingError::Buffer(err))
    }
}

/// Top-level Skylink errors.
#[derive(Debug, Error)]
pub enum SkylinkError {
    /// Virtual channel error.
    #[error("virtual channel error: {0}")]
    Vc(#[from] VcError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No virtual channel with this index.
    #[error("no virtual channel {0}")]
    InvalidChannel(usize),
}

/// Result type for ring operations.
pub type RingResult<T> = Result<T, RingError>;

/// Result type for virtual channel operations.
pub type VcResult<T> = Result<T, VcError>;
