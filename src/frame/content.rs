//! Decoded frame contents as seen by a virtual channel.

use super::extension::{ArqControl, ArqHandshake, ArqRequest, ArqSequenceExt, Extension};
use crate::core::{ArqSequence, FRAME_BODY_LEN, FrameError};

/// Extensions and payload of one frame on one virtual channel.
///
/// Holds at most one extension of each type. Extensions and payload share
/// [`FRAME_BODY_LEN`] bytes; every addition is checked against what is left.
#[derive(Debug, Clone)]
pub struct Frame {
    arq_on: bool,
    sequence: Option<ArqSequenceExt>,
    request: Option<ArqRequest>,
    control: Option<ArqControl>,
    handshake: Option<ArqHandshake>,
    payload: [u8; FRAME_BODY_LEN],
    payload_len: usize,
    has_payload: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Self {
            arq_on: false,
            sequence: None,
            request: None,
            control: None,
            handshake: None,
            payload: [0u8; FRAME_BODY_LEN],
            payload_len: 0,
            has_payload: false,
        }
    }

    /// Remove all extensions, the payload and the ARQ flag.
    pub fn clear(&mut self) {
        self.arq_on = false;
        self.sequence = None;
        self.request = None;
        self.control = None;
        self.handshake = None;
        self.payload_len = 0;
        self.has_payload = false;
    }

    /// Whether the sender had ARQ on for this channel.
    pub fn arq_on(&self) -> bool {
        self.arq_on
    }

    /// Set the ARQ-on header flag.
    pub fn set_arq_on(&mut self, on: bool) {
        self.arq_on = on;
    }

    /// Bytes taken by extensions.
    pub fn extension_bytes(&self) -> usize {
        self.extensions().map(|ext| ext.wire_size()).sum()
    }

    /// Bytes left for further extensions or payload.
    pub fn space_left(&self) -> usize {
        FRAME_BODY_LEN - self.extension_bytes() - self.payload_len
    }

    /// Add an extension. Each extension type may appear once.
    pub fn add_extension(&mut self, ext: impl Into<Extension>) -> Result<(), FrameError> {
        let ext = ext.into();
        let occupied = match ext {
            Extension::Sequence(_) => self.sequence.is_some(),
            Extension::Request(_) => self.request.is_some(),
            Extension::Control(_) => self.control.is_some(),
            Extension::Handshake(_) => self.handshake.is_some(),
        };
        if occupied {
            return Err(FrameError::DuplicateExtension);
        }

        let required = ext.wire_size();
        let available = self.space_left();
        if required > available {
            return Err(FrameError::NoSpace {
                required,
                available,
            });
        }

        match ext {
            Extension::Sequence(e) => self.sequence = Some(e),
            Extension::Request(e) => self.request = Some(e),
            Extension::Control(e) => self.control = Some(e),
            Extension::Handshake(e) => self.handshake = Some(e),
        }
        Ok(())
    }

    /// Extensions present, in processing order.
    pub fn extensions(&self) -> impl Iterator<Item = Extension> + '_ {
        self.handshake
            .map(Extension::from)
            .into_iter()
            .chain(self.control.map(Extension::from))
            .chain(self.request.map(Extension::from))
            .chain(self.sequence.map(Extension::from))
    }

    /// Sequence extension, if present.
    pub fn sequence(&self) -> Option<ArqSequence> {
        self.sequence.map(|e| e.sequence)
    }

    /// Retransmit request extension, if present.
    pub fn request(&self) -> Option<ArqRequest> {
        self.request
    }

    /// Control extension, if present.
    pub fn control(&self) -> Option<ArqControl> {
        self.control
    }

    /// Handshake extension, if present.
    pub fn handshake(&self) -> Option<ArqHandshake> {
        self.handshake
    }

    /// The payload, if the frame carries one (possibly empty).
    pub fn payload(&self) -> Option<&[u8]> {
        self.has_payload.then(|| &self.payload[..self.payload_len])
    }

    /// Copy `data` in as the payload, replacing any previous one.
    pub fn set_payload(&mut self, data: &[u8]) -> Result<(), FrameError> {
        let spare = self.spare_payload_mut();
        if data.len() > spare.len() {
            return Err(FrameError::NoSpace {
                required: data.len(),
                available: spare.len(),
            });
        }
        spare[..data.len()].copy_from_slice(data);
        self.commit_payload(data.len())
    }

    /// Payload area available after the current extensions, for writing in
    /// place. Follow with [`commit_payload`](Self::commit_payload).
    pub fn spare_payload_mut(&mut self) -> &mut [u8] {
        let capacity = FRAME_BODY_LEN - self.extension_bytes();
        self.payload_len = 0;
        self.has_payload = false;
        &mut self.payload[..capacity]
    }

    /// Mark the first `length` bytes of the payload area as the payload.
    pub fn commit_payload(&mut self, length: usize) -> Result<(), FrameError> {
        let available = FRAME_BODY_LEN - self.extension_bytes();
        if length > available {
            return Err(FrameError::NoSpace {
                required: length,
                available,
            });
        }
        self.payload_len = length;
        self.has_payload = true;
        Ok(())
    }
}
