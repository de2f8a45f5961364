//! Send ring
//!
//! ```text
//!   tail            tx_head                 head
//!    |                 |                     |
//!    v                 v                     v
//! [ acked-pending ... | untransmitted ...   | free ... ]
//!    <-- recallable -->
//! ```
//!
//! Payloads between `tail` and `tx_head` were transmitted but not yet
//! acknowledged and may be scheduled for retransmission. Payloads between
//! `tx_head` and `head` have not been transmitted yet.

use std::collections::VecDeque;

use super::item::{RingItem, release_all};
use crate::buffer::{ElementBuffer, ElementIndex};
use crate::core::{
    ARQ_MASK_BITS, ARQ_RESEND_SCHEDULE_DEPTH, ArqMask, ArqSequence, BufferError, ConfigError,
    RingError, RingResult, SEND_RING_MIN_LEN, ring_add, ring_distance, sequence_offset,
};

/// Description of a payload picked for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPayload {
    /// Payload length in bytes.
    pub length: usize,
    /// Sequence the payload is sent with.
    pub sequence: ArqSequence,
    /// Whether this is a retransmission from the resend schedule.
    pub resend: bool,
}

/// Ring of outgoing payloads awaiting transmission or acknowledgement.
#[derive(Debug, Clone)]
pub struct SendRing {
    items: Vec<RingItem>,

    /// Next free slot.
    head: usize,
    /// First untransmitted slot.
    tx_head: usize,
    /// Oldest unacknowledged slot.
    tail: usize,

    head_sequence: ArqSequence,
    tx_sequence: ArqSequence,
    tail_sequence: ArqSequence,

    /// Sequences scheduled for retransmission, oldest first.
    resend_list: VecDeque<ArqSequence>,
}

impl SendRing {
    /// Create an empty ring of `length` slots starting at `initial_sequence`.
    pub fn new(length: usize, initial_sequence: ArqSequence) -> Result<Self, ConfigError> {
        let max = usize::from(u16::MAX);
        if !(SEND_RING_MIN_LEN..=max).contains(&length) {
            return Err(ConfigError::RingLength {
                ring: "send",
                len: length,
                min: SEND_RING_MIN_LEN,
                max,
            });
        }

        Ok(Self {
            items: vec![RingItem::EMPTY; length],
            head: 0,
            tx_head: 0,
            tail: 0,
            head_sequence: initial_sequence,
            tx_sequence: initial_sequence,
            tail_sequence: initial_sequence,
            resend_list: VecDeque::with_capacity(ARQ_RESEND_SCHEDULE_DEPTH),
        })
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false: a ring has at least [`SEND_RING_MIN_LEN`] slots.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sequence the next pushed payload will get.
    pub fn head_sequence(&self) -> ArqSequence {
        self.head_sequence
    }

    /// Sequence of the first untransmitted payload.
    pub fn tx_sequence(&self) -> ArqSequence {
        self.tx_sequence
    }

    /// Sequence of the oldest unacknowledged payload.
    pub fn tail_sequence(&self) -> ArqSequence {
        self.tail_sequence
    }

    /// Number of sequences in the resend schedule.
    pub fn resend_count(&self) -> usize {
        self.resend_list.len()
    }

    /// Free every payload and restart sequencing at `initial_sequence`.
    pub fn wipe(&mut self, buffer: &mut ElementBuffer, initial_sequence: ArqSequence) {
        release_all(&mut self.items, buffer);
        self.resend_list.clear();
        self.head = 0;
        self.tx_head = 0;
        self.tail = 0;
        self.head_sequence = initial_sequence;
        self.tx_sequence = initial_sequence;
        self.tail_sequence = initial_sequence;
    }

    /// `push` will fail with [`RingError::RingFull`].
    pub fn is_full(&self) -> bool {
        ring_add(self.head, 1, self.len()) == self.tail
    }

    /// Slots available to `push`.
    pub fn count_free_slots(&self) -> usize {
        ring_distance(ring_add(self.head, 1, self.len()), self.tail, self.len())
    }

    /// Payloads waiting for their first transmission, plus scheduled resends
    /// if `include_resends`.
    pub fn count_pending(&self, include_resends: bool) -> usize {
        let fresh = ring_distance(self.tx_head, self.head, self.len());
        if include_resends {
            fresh + self.resend_list.len()
        } else {
            fresh
        }
    }

    /// Whether `sequence` was transmitted and is not yet acknowledged.
    pub fn can_recall(&self, sequence: ArqSequence) -> bool {
        let ahead_of_tail = usize::from(sequence_offset(self.tail_sequence, sequence));
        ahead_of_tail < ring_distance(self.tail, self.tx_head, self.len())
    }

    /// Ring position of a recallable sequence.
    fn recall_position(&self, sequence: ArqSequence) -> Option<usize> {
        self.can_recall(sequence).then(|| {
            let ahead_of_tail = usize::from(sequence_offset(self.tail_sequence, sequence));
            ring_add(self.tail, ahead_of_tail, self.len())
        })
    }

    fn element_at(&self, position: usize) -> RingResult<ElementIndex> {
        self.items[position]
            .element
            .ok_or(RingError::Buffer(BufferError::InvalidIndex(position)))
    }

    /// Store `payload` at the head and return the sequence assigned to it.
    pub fn push(&mut self, buffer: &mut ElementBuffer, payload: &[u8]) -> RingResult<ArqSequence> {
        if self.is_full() {
            return Err(RingError::RingFull);
        }

        let element = buffer.store(payload)?;
        let sequence = self.head_sequence;
        self.items[self.head] = RingItem {
            element: Some(element),
            sequence,
        };
        self.head = ring_add(self.head, 1, self.len());
        self.head_sequence = self.head_sequence.wrapping_add(1);

        tracing::trace!(sequence, length = payload.len(), "queued payload for send");
        Ok(sequence)
    }

    /// Schedule a transmitted, unacknowledged sequence for retransmission.
    ///
    /// Already scheduled sequences are not duplicated. When the schedule is
    /// full the oldest entry is dropped.
    pub fn schedule_resend(&mut self, sequence: ArqSequence) -> RingResult<()> {
        if !self.can_recall(sequence) {
            return Err(RingError::NotRecallable(sequence));
        }
        if self.resend_list.contains(&sequence) {
            return Ok(());
        }
        if self.resend_list.len() >= ARQ_RESEND_SCHEDULE_DEPTH {
            if let Some(dropped) = self.resend_list.pop_front() {
                tracing::debug!(dropped, sequence, "resend schedule full, dropped oldest");
            }
        }
        self.resend_list.push_back(sequence);
        Ok(())
    }

    /// Schedule `base` and every `base + 1 + i` whose mask bit `i` is set.
    ///
    /// Sequences that cannot be recalled are skipped. Returns how many were
    /// scheduled.
    pub fn schedule_resends_by_mask(&mut self, base: ArqSequence, mask: ArqMask) -> usize {
        let requested = std::iter::once(base).chain(
            (0..ARQ_MASK_BITS)
                .filter(|bit| mask & (1 << bit) != 0)
                .map(|bit| base.wrapping_add(1 + bit)),
        );

        let mut scheduled = 0;
        for sequence in requested {
            match self.schedule_resend(sequence) {
                Ok(()) => scheduled += 1,
                Err(e) => tracing::trace!(sequence, error = %e, "skipped resend request"),
            }
        }
        if scheduled > 0 {
            tracing::debug!(base, mask, scheduled, "scheduled resends");
        }
        scheduled
    }

    /// Describe the payload `read_for_tx` would return, without consuming it.
    pub fn peek_next_tx(
        &self,
        buffer: &ElementBuffer,
        include_resends: bool,
    ) -> RingResult<TxPayload> {
        if include_resends {
            let recall = self
                .resend_list
                .iter()
                .find_map(|&seq| self.recall_position(seq).map(|pos| (seq, pos)));
            if let Some((sequence, position)) = recall {
                let length = buffer.data_length(self.element_at(position)?)?;
                return Ok(TxPayload {
                    length,
                    sequence,
                    resend: true,
                });
            }
        }

        if self.tx_head == self.head {
            return Err(RingError::Empty);
        }
        let length = buffer.data_length(self.element_at(self.tx_head)?)?;
        Ok(TxPayload {
            length,
            sequence: self.tx_sequence,
            resend: false,
        })
    }

    /// Copy the next payload to transmit into `target`.
    ///
    /// Scheduled resends go first if `include_resends`; stale entries that are
    /// no longer recallable are discarded on the way. Otherwise the payload at
    /// the transmit head is read and the transmit head advances.
    pub fn read_for_tx(
        &mut self,
        buffer: &ElementBuffer,
        target: &mut [u8],
        include_resends: bool,
    ) -> RingResult<TxPayload> {
        if include_resends {
            while let Some(sequence) = self.resend_list.pop_front() {
                let Some(position) = self.recall_position(sequence) else {
                    tracing::trace!(sequence, "dropped stale resend");
                    continue;
                };
                let element = self.element_at(position)?;
                return match buffer.read(element, target) {
                    Ok(length) => Ok(TxPayload {
                        length,
                        sequence,
                        resend: true,
                    }),
                    Err(e) => {
                        self.resend_list.push_front(sequence);
                        Err(e.into())
                    }
                };
            }
        }

        if self.tx_head == self.head {
            return Err(RingError::Empty);
        }
        let length = buffer.read(self.element_at(self.tx_head)?, target)?;
        let sequence = self.tx_sequence;
        self.advance_tx_head();
        Ok(TxPayload {
            length,
            sequence,
            resend: false,
        })
    }

    /// Consume the next payload to transmit without reading it.
    ///
    /// A resend is just removed from the schedule; a fresh payload counts as
    /// transmitted.
    pub fn discard_next_tx(&mut self, include_resends: bool) -> RingResult<ArqSequence> {
        if include_resends {
            while let Some(sequence) = self.resend_list.pop_front() {
                if self.can_recall(sequence) {
                    return Ok(sequence);
                }
            }
        }

        if self.tx_head == self.head {
            return Err(RingError::Empty);
        }
        let sequence = self.tx_sequence;
        self.advance_tx_head();
        Ok(sequence)
    }

    fn advance_tx_head(&mut self) {
        self.tx_head = ring_add(self.tx_head, 1, self.len());
        self.tx_sequence = self.tx_sequence.wrapping_add(1);
    }

    /// Free every payload before `new_tail_sequence` (the peer's receive head).
    ///
    /// Fails if the sequence lies beyond the transmit head. Returns how many
    /// payloads were freed.
    pub fn clean_tail_up_to(
        &mut self,
        buffer: &mut ElementBuffer,
        new_tail_sequence: ArqSequence,
    ) -> RingResult<usize> {
        let tx_ahead = sequence_offset(self.tail_sequence, self.tx_sequence);
        let new_ahead = sequence_offset(self.tail_sequence, new_tail_sequence);
        if new_ahead > tx_ahead {
            return Err(RingError::InvalidAcknowledge {
                sequence: new_tail_sequence,
                tail: self.tail_sequence,
                tx: self.tx_sequence,
            });
        }

        let mut cleared = 0;
        while self.tail_sequence != new_tail_sequence {
            self.items[self.tail].release(buffer);
            self.tail = ring_add(self.tail, 1, self.len());
            self.tail_sequence = self.tail_sequence.wrapping_add(1);
            cleared += 1;
        }

        if cleared > 0 {
            let recallable = ring_distance(self.tail, self.tx_head, self.len());
            let tail_sequence = self.tail_sequence;
            self.resend_list
                .retain(|&seq| usize::from(sequence_offset(tail_sequence, seq)) < recallable);
            tracing::trace!(cleared, tail = self.tail_sequence, "acknowledged payloads freed");
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(len: usize) -> (SendRing, ElementBuffer) {
        (SendRing::new(len, 0).unwrap(), ElementBuffer::new(16, 256).unwrap())
    }

    fn transmit(ring: &mut SendRing, buffer: &ElementBuffer, n: usize) -> Vec<ArqSequence> {
        let mut out = [0u8; 256];
        (0..n)
            .map(|_| ring.read_for_tx(buffer, &mut out, false).unwrap().sequence)
            .collect()
    }

    #[test]
    fn test_new_rejects_short_ring() {
        assert!(SendRing::new(3, 0).is_err());
        assert!(SendRing::new(4, 0).is_ok());
    }

    #[test]
    fn test_push_until_full() {
        let (mut ring, mut buffer) = setup(8);
        assert_eq!(ring.count_free_slots(), 7);

        for expected in 0..7 {
            assert_eq!(ring.push(&mut buffer, b"data").unwrap(), expected);
        }
        assert!(ring.is_full());
        assert_eq!(ring.count_free_slots(), 0);
        assert_eq!(ring.push(&mut buffer, b"data"), Err(RingError::RingFull));
        assert_eq!(ring.count_pending(false), 7);
    }

    #[test]
    fn test_read_for_tx_in_order() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, b"first").unwrap();
        ring.push(&mut buffer, b"second").unwrap();

        let mut out = [0u8; 64];
        let tx = ring.read_for_tx(&buffer, &mut out, true).unwrap();
        assert_eq!((tx.length, tx.sequence, tx.resend), (5, 0, false));
        assert_eq!(&out[..5], b"first");

        let tx = ring.read_for_tx(&buffer, &mut out, true).unwrap();
        assert_eq!(&out[..tx.length], b"second");
        assert_eq!(ring.tx_sequence(), 2);

        assert_eq!(ring.read_for_tx(&buffer, &mut out, true), Err(RingError::Empty));
    }

    #[test]
    fn test_read_for_tx_too_small_target() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, &[1u8; 40]).unwrap();

        let mut out = [0u8; 10];
        assert!(ring.read_for_tx(&buffer, &mut out, false).is_err());
        // Nothing consumed.
        assert_eq!(ring.tx_sequence(), 0);
        assert_eq!(ring.count_pending(false), 1);
    }

    #[test]
    fn test_acknowledge_frees_capacity() {
        let (mut ring, mut buffer) = setup(8);
        let free_before = buffer.free_elements();
        for _ in 0..7 {
            ring.push(&mut buffer, &[7u8; 20]).unwrap();
        }
        transmit(&mut ring, &buffer, 4);

        assert_eq!(ring.clean_tail_up_to(&mut buffer, 3).unwrap(), 3);
        assert_eq!(ring.tail_sequence(), 3);
        assert_eq!(ring.count_free_slots(), 3);

        // Acknowledging the untransmitted part is a protocol error.
        assert_eq!(
            ring.clean_tail_up_to(&mut buffer, 6),
            Err(RingError::InvalidAcknowledge { sequence: 6, tail: 3, tx: 4 })
        );

        assert_eq!(ring.clean_tail_up_to(&mut buffer, 4).unwrap(), 1);
        ring.wipe(&mut buffer, 0);
        assert_eq!(buffer.free_elements(), free_before);
    }

    #[test]
    fn test_clean_tail_is_idempotent() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, b"x").unwrap();
        transmit(&mut ring, &buffer, 1);

        assert_eq!(ring.clean_tail_up_to(&mut buffer, 1).unwrap(), 1);
        assert_eq!(ring.clean_tail_up_to(&mut buffer, 1).unwrap(), 0);
    }

    #[test]
    fn test_schedule_resend_requires_transmitted() {
        let (mut ring, mut buffer) = setup(8);
        for _ in 0..3 {
            ring.push(&mut buffer, b"abc").unwrap();
        }
        assert_eq!(ring.schedule_resend(0), Err(RingError::NotRecallable(0)));

        transmit(&mut ring, &buffer, 2);
        assert!(ring.schedule_resend(1).is_ok());
        assert!(ring.schedule_resend(1).is_ok());
        assert_eq!(ring.resend_count(), 1);
        assert_eq!(ring.schedule_resend(2), Err(RingError::NotRecallable(2)));
        assert_eq!(ring.count_pending(true), 2);
    }

    #[test]
    fn test_resend_goes_first() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, b"zero").unwrap();
        ring.push(&mut buffer, b"one").unwrap();
        ring.push(&mut buffer, b"two").unwrap();
        transmit(&mut ring, &buffer, 2);
        ring.schedule_resend(0).unwrap();

        let peek = ring.peek_next_tx(&buffer, true).unwrap();
        assert_eq!(peek, TxPayload { length: 4, sequence: 0, resend: true });

        let mut out = [0u8; 16];
        let tx = ring.read_for_tx(&buffer, &mut out, true).unwrap();
        assert_eq!(tx, peek);
        assert_eq!(&out[..4], b"zero");

        let tx = ring.read_for_tx(&buffer, &mut out, true).unwrap();
        assert_eq!((tx.sequence, tx.resend), (2, false));
    }

    #[test]
    fn test_resends_ignored_when_excluded() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, b"zero").unwrap();
        ring.push(&mut buffer, b"one").unwrap();
        transmit(&mut ring, &buffer, 1);
        ring.schedule_resend(0).unwrap();

        let peek = ring.peek_next_tx(&buffer, false).unwrap();
        assert_eq!((peek.sequence, peek.resend), (1, false));
    }

    #[test]
    fn test_acknowledged_resend_is_dropped() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, b"zero").unwrap();
        ring.push(&mut buffer, b"one").unwrap();
        transmit(&mut ring, &buffer, 2);
        ring.schedule_resend(0).unwrap();
        ring.schedule_resend(1).unwrap();

        ring.clean_tail_up_to(&mut buffer, 1).unwrap();
        assert_eq!(ring.resend_count(), 1);

        let mut out = [0u8; 16];
        let tx = ring.read_for_tx(&buffer, &mut out, true).unwrap();
        assert_eq!((tx.sequence, tx.resend), (1, true));
    }

    #[test]
    fn test_resend_schedule_overflow_drops_oldest() {
        let (mut ring, mut buffer) = setup(32);
        for _ in 0..20 {
            ring.push(&mut buffer, b"p").unwrap();
        }
        transmit(&mut ring, &buffer, 20);

        for seq in 0..20 {
            ring.schedule_resend(seq).unwrap();
        }
        assert_eq!(ring.resend_count(), ARQ_RESEND_SCHEDULE_DEPTH);

        let peek = ring.peek_next_tx(&buffer, true).unwrap();
        assert_eq!(peek.sequence, 4);
    }

    #[test]
    fn test_schedule_resends_by_mask() {
        let (mut ring, mut buffer) = setup(16);
        for _ in 0..10 {
            ring.push(&mut buffer, b"p").unwrap();
        }
        transmit(&mut ring, &buffer, 8);

        // base 2, bits 0 and 2 -> sequences 2, 3, 5. Bit 9 -> 12 is not recallable.
        let scheduled = ring.schedule_resends_by_mask(2, 0b10_0000_0101);
        assert_eq!(scheduled, 3);

        let mut out = [0u8; 16];
        let order: Vec<_> = (0..3)
            .map(|_| ring.read_for_tx(&buffer, &mut out, true).unwrap().sequence)
            .collect();
        assert_eq!(order, vec![2, 3, 5]);
    }

    #[test]
    fn test_discard_next_tx() {
        let (mut ring, mut buffer) = setup(8);
        ring.push(&mut buffer, b"big").unwrap();
        ring.push(&mut buffer, b"next").unwrap();

        assert_eq!(ring.discard_next_tx(true).unwrap(), 0);
        assert_eq!(ring.tx_sequence(), 1);
        assert!(ring.can_recall(0));
    }

    #[test]
    fn test_sequence_wraparound() {
        let mut ring = SendRing::new(8, u16::MAX - 1).unwrap();
        let mut buffer = ElementBuffer::new(16, 64).unwrap();

        let seqs: Vec<_> = (0..4).map(|_| ring.push(&mut buffer, b"w").unwrap()).collect();
        assert_eq!(seqs, vec![u16::MAX - 1, u16::MAX, 0, 1]);

        transmit(&mut ring, &buffer, 4);
        assert!(ring.can_recall(u16::MAX));
        assert!(ring.can_recall(1));
        assert!(!ring.can_recall(2));

        assert_eq!(ring.clean_tail_up_to(&mut buffer, 1).unwrap(), 3);
        assert_eq!(ring.tail_sequence(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Push(usize),
            Transmit,
            Ack(u8),
            Resend(u8),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..60).prop_map(Op::Push),
                Just(Op::Transmit),
                any::<u8>().prop_map(Op::Ack),
                any::<u8>().prop_map(Op::Resend),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn cursors_stay_ordered(ops in proptest::collection::vec(op(), 1..120)) {
                let mut ring = SendRing::new(10, 65530).unwrap();
                let mut buffer = ElementBuffer::new(16, 64).unwrap();
                let mut out = [0u8; 64];

                for op in ops {
                    match op {
                        Op::Push(len) => {
                            let _ = ring.push(&mut buffer, &vec![1u8; len]);
                        }
                        Op::Transmit => {
                            let _ = ring.read_for_tx(&buffer, &mut out, true);
                        }
                        Op::Ack(step) => {
                            let in_flight =
                                sequence_offset(ring.tail_sequence(), ring.tx_sequence());
                            let step = u16::from(step) % (in_flight + 1);
                            let target = ring.tail_sequence().wrapping_add(step);
                            prop_assert_eq!(
                                ring.clean_tail_up_to(&mut buffer, target).unwrap(),
                                usize::from(step)
                            );
                        }
                        Op::Resend(step) => {
                            let seq = ring.tail_sequence().wrapping_add(u16::from(step % 12));
                            let _ = ring.schedule_resend(seq);
                        }
                    }

                    let tx_ahead = sequence_offset(ring.tail_sequence(), ring.tx_sequence());
                    let head_ahead = sequence_offset(ring.tail_sequence(), ring.head_sequence());
                    prop_assert!(tx_ahead <= head_ahead);
                    prop_assert_eq!(
                        usize::from(head_ahead) + ring.count_free_slots() + 1,
                        ring.len()
                    );
                    prop_assert!(buffer.is_consistent());
                }
            }
        }
    }
}
