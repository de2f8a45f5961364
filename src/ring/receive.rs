//! Receive ring
//!
//! ```text
//!   tail          head        head + horizon
//!    |              |               |
//!    v              v               v
//! [ readable ... | missing | out-of-order window | unused ]
//! ```
//!
//! `head` is the next sequence needed for contiguous delivery, `tail` the next
//! sequence handed to the application. Arrivals up to `horizon_width` ahead of
//! `head` are buffered and exposed through [`RcvRing::horizon_bitmap`].

use super::item::{RingItem, release_all};
use crate::buffer::ElementBuffer;
use crate::core::{
    ARQ_MASK_BITS, ARQ_MAXIMUM_HORIZON, ArqMask, ArqSequence, ConfigError, RCV_RING_MIN_LEN,
    RingError, RingResult, ring_add, ring_distance, sequence_offset,
};

/// How the peer's transmit head relates to our receive head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Everything the peer has sent was received in order.
    InSync,
    /// Some sequences are missing but can still be requested.
    Behind {
        /// Number of sequences between our head and the peer's transmit head.
        missing: u16,
    },
    /// The sequence spaces have detached; only a new session recovers.
    Diverged,
}

/// Ring of received payloads, reordered for in-order delivery.
#[derive(Debug, Clone)]
pub struct RcvRing {
    items: Vec<RingItem>,
    horizon_width: u16,

    head: usize,
    tail: usize,
    head_sequence: ArqSequence,
    tail_sequence: ArqSequence,
}

impl RcvRing {
    /// Create an empty ring of `length` slots expecting `initial_sequence` first.
    ///
    /// The ring must be at least three slots longer than the horizon.
    pub fn new(
        length: usize,
        horizon_width: u16,
        initial_sequence: ArqSequence,
    ) -> Result<Self, ConfigError> {
        let max = usize::from(u16::MAX);
        if !(RCV_RING_MIN_LEN..=max).contains(&length) {
            return Err(ConfigError::RingLength {
                ring: "receive",
                len: length,
                min: RCV_RING_MIN_LEN,
                max,
            });
        }

        let horizon_limit = ((length - 3).min(usize::from(ARQ_MAXIMUM_HORIZON))) as u16;
        if horizon_width > horizon_limit {
            return Err(ConfigError::HorizonWidth {
                horizon: horizon_width,
                max: horizon_limit,
            });
        }

        Ok(Self {
            items: vec![RingItem::EMPTY; length],
            horizon_width,
            head: 0,
            tail: 0,
            head_sequence: initial_sequence,
            tail_sequence: initial_sequence,
        })
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false: a ring has at least [`RCV_RING_MIN_LEN`] slots.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How far past the head an arrival may be buffered.
    pub fn horizon_width(&self) -> u16 {
        self.horizon_width
    }

    /// Next sequence needed for contiguous delivery.
    pub fn head_sequence(&self) -> ArqSequence {
        self.head_sequence
    }

    /// Next sequence handed to the application.
    pub fn tail_sequence(&self) -> ArqSequence {
        self.tail_sequence
    }

    /// Payloads ready for `read_next`.
    pub fn count_readable(&self) -> usize {
        ring_distance(self.tail, self.head, self.len())
    }

    /// Free every payload and expect `initial_sequence` next.
    pub fn wipe(&mut self, buffer: &mut ElementBuffer, initial_sequence: ArqSequence) {
        release_all(&mut self.items, buffer);
        self.head = 0;
        self.tail = 0;
        self.head_sequence = initial_sequence;
        self.tail_sequence = initial_sequence;
    }

    /// Store a payload received with `sequence`.
    ///
    /// Returns how many steps the head advanced. A duplicate of a buffered
    /// payload is accepted and advances nothing.
    pub fn push(
        &mut self,
        buffer: &mut ElementBuffer,
        payload: &[u8],
        sequence: ArqSequence,
    ) -> RingResult<usize> {
        let offset = sequence_offset(self.head_sequence, sequence);
        if offset > self.horizon_width {
            return Err(RingError::OutOfWindow {
                sequence,
                head: self.head_sequence,
            });
        }

        let position = ring_add(self.head, usize::from(offset), self.len());
        if self.items[position].is_occupied() {
            tracing::trace!(sequence, "duplicate payload ignored");
            return Ok(0);
        }

        let element = buffer.store(payload)?;
        self.items[position] = RingItem {
            element: Some(element),
            sequence,
        };

        let advanced = self.advance_head();
        tracing::trace!(sequence, advanced, head = self.head_sequence, "received payload");
        Ok(advanced)
    }

    /// Store an unsequenced payload at the head and return the sequence it got.
    ///
    /// Used while ARQ is off. Fails with [`RingError::RingFull`] once the head
    /// is choked and its slot already holds an unread payload.
    pub fn push_at_head(
        &mut self,
        buffer: &mut ElementBuffer,
        payload: &[u8],
    ) -> RingResult<ArqSequence> {
        if self.items[self.head].is_occupied() {
            tracing::trace!(head = self.head_sequence, "receive ring full");
            return Err(RingError::RingFull);
        }
        let sequence = self.head_sequence;
        self.push(buffer, payload, sequence)?;
        Ok(sequence)
    }

    /// Move the head over every contiguous buffered payload.
    ///
    /// The head stops where the horizon would run into the tail; it is moved
    /// again once the application reads.
    fn advance_head(&mut self) -> usize {
        let choke_distance = usize::from(self.horizon_width) + 1;
        let mut advanced = 0;
        while self.items[self.head].is_occupied() {
            if ring_add(self.head, choke_distance, self.len()) == self.tail {
                tracing::trace!(head = self.head_sequence, "receive head choked");
                break;
            }
            self.head = ring_add(self.head, 1, self.len());
            self.head_sequence = self.head_sequence.wrapping_add(1);
            advanced += 1;
        }
        advanced
    }

    /// Copy the next in-order payload into `target` and free it.
    ///
    /// A payload longer than `target` is dropped and reported as
    /// [`BufferError::TooLong`](crate::core::BufferError::TooLong).
    pub fn read_next(
        &mut self,
        buffer: &mut ElementBuffer,
        target: &mut [u8],
    ) -> RingResult<usize> {
        if self.count_readable() == 0 {
            return Err(RingError::Empty);
        }

        let item = &mut self.items[self.tail];
        let result = match item.element {
            Some(element) => buffer.read(element, target).map_err(RingError::from),
            None => Err(RingError::Empty),
        };
        item.release(buffer);

        self.tail = ring_add(self.tail, 1, self.len());
        self.tail_sequence = self.tail_sequence.wrapping_add(1);
        self.advance_head();

        if let Err(e) = &result {
            tracing::warn!(
                sequence = self.tail_sequence.wrapping_sub(1),
                error = %e,
                "dropped received payload"
            );
        }
        result
    }

    /// Bit `i` is set if sequence `head + 1 + i` has been received.
    pub fn horizon_bitmap(&self) -> ArqMask {
        let scan = self.horizon_width.min(ARQ_MASK_BITS);
        (0..scan)
            .filter(|&i| {
                let position = ring_add(self.head, usize::from(i) + 1, self.len());
                self.items[position].is_occupied()
            })
            .fold(0, |map, i| map | (1 << i))
    }

    /// Bit `i` is set if sequence `head + 1 + i` is missing while some later
    /// sequence in the bitmap window has arrived.
    pub fn missing_mask(&self) -> ArqMask {
        let received = self.horizon_bitmap();
        if received == 0 {
            return 0;
        }
        let highest = ARQ_MASK_BITS - 1 - received.leading_zeros() as u16;
        let below_highest = (1u16 << highest) - 1;
        !received & below_highest
    }

    /// Compare the peer's reported transmit head with our receive head.
    pub fn sync_status(&self, peer_tx_sequence: ArqSequence) -> SyncStatus {
        let missing = sequence_offset(self.head_sequence, peer_tx_sequence);
        match missing {
            0 => SyncStatus::InSync,
            m if m <= ARQ_MAXIMUM_HORIZON => SyncStatus::Behind { missing: m },
            _ => SyncStatus::Diverged,
        }
    }
}
