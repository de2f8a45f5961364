//! Tests for the send/receive ring pair: round trip, boundaries, horizon and acknowledgement.

use proptest::prelude::*;
use skylink_arq::buffer::ElementBuffer;
use skylink_arq::core::{BufferError, MAX_PAYLOAD_LEN, RingError, sequence_offset};
use skylink_arq::ring::{RcvRing, SendRing};

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

// ---------------------------------------------------------------------------
// Basic round trip
// ---------------------------------------------------------------------------

#[test]
fn round_trip_through_ring_pair() {
    let mut tx_buffer = ElementBuffer::new(32, 64).unwrap();
    let mut rx_buffer = ElementBuffer::new(32, 64).unwrap();
    let mut send = SendRing::new(8, 0).unwrap();
    let mut rcv = RcvRing::new(8, 4, 0).unwrap();

    let payloads = [pattern(10, 1), Vec::new(), pattern(173, 9)];
    for p in &payloads {
        send.push(&mut tx_buffer, p).unwrap();
    }

    let mut wire = [0u8; MAX_PAYLOAD_LEN];
    for (i, p) in payloads.iter().enumerate() {
        let tx = send.read_for_tx(&tx_buffer, &mut wire, true).unwrap();
        assert_eq!(tx.sequence, i as u16);
        assert!(!tx.resend);
        assert_eq!(&wire[..tx.length], &p[..]);

        rcv.push(&mut rx_buffer, &wire[..tx.length], tx.sequence)
            .unwrap();
        assert_eq!(rcv.horizon_bitmap(), 0);
    }
    assert_eq!(rcv.count_readable(), 3);

    let mut out = [0u8; MAX_PAYLOAD_LEN];
    for p in &payloads {
        let n = rcv.read_next(&mut rx_buffer, &mut out).unwrap();
        assert_eq!(&out[..n], &p[..]);
        assert_eq!(rcv.horizon_bitmap(), 0);
    }

    assert_eq!(rcv.read_next(&mut rx_buffer, &mut out), Err(RingError::Empty));
    assert_eq!(rx_buffer.free_elements(), rx_buffer.element_count());
}

// ---------------------------------------------------------------------------
// Full / empty boundaries
// ---------------------------------------------------------------------------

#[test]
fn full_send_ring_is_untouched_by_push() {
    let mut buffer = ElementBuffer::new(16, 64).unwrap();
    let mut send = SendRing::new(8, 0).unwrap();
    for _ in 0..7 {
        send.push(&mut buffer, b"payload").unwrap();
    }

    let before = (
        send.head_sequence(),
        send.tx_sequence(),
        send.tail_sequence(),
        send.count_free_slots(),
        buffer.free_elements(),
    );
    assert_eq!(send.push(&mut buffer, b"one too many"), Err(RingError::RingFull));
    let after = (
        send.head_sequence(),
        send.tx_sequence(),
        send.tail_sequence(),
        send.count_free_slots(),
        buffer.free_elements(),
    );
    assert_eq!(before, after);
}

#[test]
fn send_ring_reports_buffer_exhaustion() {
    let mut buffer = ElementBuffer::new(16, 4).unwrap();
    let mut send = SendRing::new(8, 0).unwrap();
    send.push(&mut buffer, &[0u8; 40]).unwrap();

    let err = send.push(&mut buffer, &[0u8; 40]).unwrap_err();
    assert_eq!(err, RingError::Buffer(BufferError::NoSpace { required: 3, free: 1 }));
    assert!(err.is_capacity());
    assert_eq!(send.head_sequence(), 1);
}

#[test]
fn empty_receive_ring_is_untouched_by_read() {
    let mut buffer = ElementBuffer::new(16, 16).unwrap();
    let mut rcv = RcvRing::new(8, 4, 300).unwrap();

    let mut out = [0u8; 16];
    assert_eq!(rcv.read_next(&mut buffer, &mut out), Err(RingError::Empty));
    assert_eq!(rcv.head_sequence(), 300);
    assert_eq!(rcv.tail_sequence(), 300);
    assert_eq!(rcv.count_readable(), 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn horizon_rejection(
        horizon in 0u16..12,
        extra_len in 0usize..12,
        start in any::<u16>(),
        in_order in 0u16..6,
        arrival in any::<u16>(),
    ) {
        let len = usize::from(horizon) + 3 + extra_len;
        let mut buffer = ElementBuffer::new(12, 64).unwrap();
        let mut rcv = RcvRing::new(len, horizon, start).unwrap();
        let mut out = [0u8; 16];

        for i in 0..in_order {
            rcv.push(&mut buffer, b"x", start.wrapping_add(i)).unwrap();
            rcv.read_next(&mut buffer, &mut out).unwrap();
        }

        let head = rcv.head_sequence();
        let tail = rcv.tail_sequence();
        let free = buffer.free_elements();
        let result = rcv.push(&mut buffer, b"late", arrival);

        if sequence_offset(head, arrival) <= horizon {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result, Err(RingError::OutOfWindow { sequence: arrival, head }));
            prop_assert_eq!(rcv.head_sequence(), head);
            prop_assert_eq!(rcv.tail_sequence(), tail);
            prop_assert_eq!(buffer.free_elements(), free);
        }
    }

    #[test]
    fn acknowledgement_frees_capacity(
        lengths in proptest::collection::vec(0usize..100, 1..12),
        transmit in 0usize..12,
        ack in any::<u16>(),
    ) {
        let mut buffer = ElementBuffer::new(16, 128).unwrap();
        let mut send = SendRing::new(16, 65_530).unwrap();
        let mut wire = [0u8; 128];

        for len in &lengths {
            send.push(&mut buffer, &vec![3u8; *len]).unwrap();
        }
        let transmitted = transmit.min(lengths.len());
        for _ in 0..transmitted {
            send.read_for_tx(&buffer, &mut wire, false).unwrap();
        }

        let tail = send.tail_sequence();
        let free = buffer.free_elements();
        let slots_before = send.count_free_slots();
        let acked = usize::from(sequence_offset(tail, ack));

        match send.clean_tail_up_to(&mut buffer, ack) {
            Ok(cleared) => {
                prop_assert!(acked <= transmitted);
                prop_assert_eq!(cleared, acked);
                let freed: usize = lengths[..acked]
                    .iter()
                    .map(|len| buffer.requirement_for(*len))
                    .sum();
                prop_assert_eq!(buffer.free_elements(), free + freed);
                prop_assert_eq!(send.count_free_slots(), slots_before + acked);
            }
            Err(e) => {
                prop_assert!(acked > transmitted);
                prop_assert!(
                    matches!(e, RingError::InvalidAcknowledge { .. }),
                    "unexpected error {}",
                    e
                );
                prop_assert_eq!(send.tail_sequence(), tail);
                prop_assert_eq!(buffer.free_elements(), free);
            }
        }
    }

    #[test]
    fn at_most_once_across_ring_pair(
        lengths in proptest::collection::vec(0usize..60, 1..14),
        deliveries in proptest::collection::vec(any::<usize>(), 0..40),
    ) {
        let mut tx_buffer = ElementBuffer::new(16, 128).unwrap();
        let mut rx_buffer = ElementBuffer::new(16, 128).unwrap();
        let mut send = SendRing::new(16, 0).unwrap();
        let mut rcv = RcvRing::new(16, 8, 0).unwrap();

        let payloads: Vec<Vec<u8>> = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| pattern(*len, i as u8))
            .collect();
        for p in &payloads {
            send.push(&mut tx_buffer, p).unwrap();
        }

        let mut wire = [0u8; 64];
        let mut sent = Vec::new();
        while let Ok(tx) = send.read_for_tx(&tx_buffer, &mut wire, false) {
            sent.push((tx.sequence, wire[..tx.length].to_vec()));
        }
        prop_assert_eq!(sent.len(), payloads.len());

        let mut delivered = Vec::new();
        let mut out = [0u8; 64];
        let mut drain =
            |rcv: &mut RcvRing, rx_buffer: &mut ElementBuffer, delivered: &mut Vec<Vec<u8>>| {
                while let Ok(n) = rcv.read_next(rx_buffer, &mut out) {
                    delivered.push(out[..n].to_vec());
                }
            };

        // Reordered and duplicated arrivals, then a retransmission of everything.
        let order = deliveries
            .iter()
            .map(|d| d % sent.len())
            .chain(0..sent.len());
        for idx in order {
            let (sequence, bytes) = &sent[idx];
            match rcv.push(&mut rx_buffer, bytes, *sequence) {
                Ok(_) | Err(RingError::OutOfWindow { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
            drain(&mut rcv, &mut rx_buffer, &mut delivered);
        }

        prop_assert_eq!(delivered, payloads);
        prop_assert_eq!(rx_buffer.free_elements(), rx_buffer.element_count());
    }
}
