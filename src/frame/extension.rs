//! ARQ extensions carried in a frame header.
//!
//! Wire sizes (header byte included):
//! ```text
//! ArqSequence   1 + 2        sequence (LE16)
//! ArqRequest    1 + 2 + 2    sequence (LE16), mask (LE16)
//! ArqControl    1 + 2 + 2    tx sequence (LE16), rx sequence (LE16)
//! ArqHandshake  1 + 1 + 4    peer state (u8), identifier (LE32)
//! ```

use crate::core::{
    ArqMask, ArqSequence, EXT_ARQ_CONTROL_SIZE, EXT_ARQ_HANDSHAKE_SIZE, EXT_ARQ_REQUEST_SIZE,
    EXT_ARQ_SEQUENCE_SIZE,
};
use crate::vc::{ArqState, SessionIdentifier};

/// Sequence number of the payload in this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArqSequenceExt {
    /// Payload sequence.
    pub sequence: ArqSequence,
}

/// Retransmission request: `sequence` and every `sequence + 1 + i` with mask bit `i` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArqRequest {
    /// First missing sequence (the sender's receive head).
    pub sequence: ArqSequence,
    /// Further missing sequences.
    pub mask: ArqMask,
}

/// Sequence heads exchanged to acknowledge and detect loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArqControl {
    /// Sender's first untransmitted sequence.
    pub tx_sequence: ArqSequence,
    /// Sender's receive head (acknowledges everything before it).
    pub rx_sequence: ArqSequence,
}

/// Session negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArqHandshake {
    /// ARQ state of the sender.
    pub peer_state: ArqState,
    /// Session identifier the sender proposes or uses.
    pub identifier: SessionIdentifier,
}

/// Any ARQ extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// See [`ArqSequenceExt`].
    Sequence(ArqSequenceExt),
    /// See [`ArqRequest`].
    Request(ArqRequest),
    /// See [`ArqControl`].
    Control(ArqControl),
    /// See [`ArqHandshake`].
    Handshake(ArqHandshake),
}

impl Extension {
    /// Encoded size including the extension header byte.
    pub fn wire_size(&self) -> usize {
        match self {
            Extension::Sequence(_) => EXT_ARQ_SEQUENCE_SIZE,
            Extension::Request(_) => EXT_ARQ_REQUEST_SIZE,
            Extension::Control(_) => EXT_ARQ_CONTROL_SIZE,
            Extension::Handshake(_) => EXT_ARQ_HANDSHAKE_SIZE,
        }
    }
}

impl From<ArqSequenceExt> for Extension {
    fn from(ext: ArqSequenceExt) -> Self {
        Extension::Sequence(ext)
    }
}

impl From<ArqRequest> for Extension {
    fn from(ext: ArqRequest) -> Self {
        Extension::Request(ext)
    }
}

impl From<ArqControl> for Extension {
    fn from(ext: ArqControl) -> Self {
        Extension::Control(ext)
    }
}

impl From<ArqHandshake> for Extension {
    fn from(ext: ArqHandshake) -> Self {
        Extension::Handshake(ext)
    }
}
