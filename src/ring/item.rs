//! Ring slot shared by the send and receive rings.

use crate::buffer::{ElementBuffer, ElementIndex};
use crate::core::ArqSequence;

/// One ring slot: the stored payload (if any) and its sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingItem {
    /// Head of the payload chain in the element buffer.
    pub element: Option<ElementIndex>,
    /// Sequence the payload was sent or received with.
    pub sequence: ArqSequence,
}

impl RingItem {
    /// An empty slot.
    pub const EMPTY: Self = Self {
        element: None,
        sequence: 0,
    };

    /// Whether the slot holds a payload.
    pub fn is_occupied(&self) -> bool {
        self.element.is_some()
    }

    /// Free the stored payload (if any) and empty the slot.
    pub(crate) fn release(&mut self, buffer: &mut ElementBuffer) {
        if let Some(idx) = self.element.take() {
            if let Err(e) = buffer.delete(idx) {
                tracing::warn!(element = idx, error = %e, "ring slot pointed at a missing payload");
            }
        }
        self.sequence = 0;
    }
}

/// Empty every slot, freeing payloads from `buffer`.
pub(crate) fn release_all(items: &mut [RingItem], buffer: &mut ElementBuffer) {
    for item in items {
        item.release(buffer);
    }
}
