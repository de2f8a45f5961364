//! Reliable virtual channel
//!
//! Owns an element buffer, a send ring and a receive ring, and runs the ARQ
//! session state machine on top of them:
//!
//! ```text
//!            begin_handshake             handshake (own id / larger id)
//!   +-----+ ----------------> +---------+ ---------------------------> +----+
//!   | Off |                   | InInit  |                              | On |
//!   +-----+ <---------------- +---------+ <---- timeout / reset ------ +----+
//!      |        timeout / reset                                          ^
//!      +------------------------- any handshake -------------------------+
//! ```
//!
//! Nothing here keeps time or counts frames: the caller passes `now` and the
//! number of frames this channel already sent in the current window.

use rand::Rng;

use super::config::VcConfig;
use super::diag::{VcDiagnostics, VcStatus};
use super::state::{ArqState, HandshakeOutcome, SessionIdentifier, resolve_handshake};
use crate::buffer::ElementBuffer;
use crate::core::{
    ArqSequence, ConfigError, EXT_ARQ_SEQUENCE_SIZE, MAX_PAYLOAD_LEN, RingError, Tick, VcError,
    VcResult, ticks_since,
};
use crate::frame::{ArqControl, ArqHandshake, ArqRequest, ArqSequenceExt, Frame};
use crate::ring::{RcvRing, SendRing, SyncStatus, TxPayload};

/// One reliable virtual channel.
#[derive(Debug, Clone)]
pub struct VirtualChannel {
    config: VcConfig,

    buffer: ElementBuffer,
    send_ring: SendRing,
    rcv_ring: RcvRing,

    state: ArqState,
    session_identifier: SessionIdentifier,

    /// We owe the peer a handshake extension.
    handshake_pending: bool,
    /// The peer's control extension showed we are missing sequences.
    need_recall: bool,

    /// Last tx progress (acknowledgement from the peer).
    last_tx_tick: Tick,
    /// Last rx progress (in-order arrival or in-sync control).
    last_rx_tick: Tick,
    /// Last control extension sent.
    last_ctrl_tick: Tick,

    /// Payloads received since our last control extension.
    unconfirmed_payloads: u16,
}

impl VirtualChannel {
    /// Build a channel in the off state.
    pub fn new(config: VcConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            buffer: ElementBuffer::new(config.element_size, config.element_count())?,
            send_ring: SendRing::new(config.send_ring_len, 0)?,
            rcv_ring: RcvRing::new(config.rcv_ring_len, config.horizon_width, 0)?,
            config,
            state: ArqState::Off,
            session_identifier: 0,
            handshake_pending: false,
            need_recall: false,
            last_tx_tick: 0,
            last_rx_tick: 0,
            last_ctrl_tick: 0,
            unconfirmed_payloads: 0,
        })
    }

    /// Configuration the channel was built with.
    pub fn config(&self) -> &VcConfig {
        &self.config
    }

    /// Current ARQ state.
    pub fn arq_state(&self) -> ArqState {
        self.state
    }

    /// Current session identifier, zero when off.
    pub fn session_identifier(&self) -> SessionIdentifier {
        self.session_identifier
    }

    /// A handshake extension goes out with the next frame.
    pub fn handshake_pending(&self) -> bool {
        self.handshake_pending
    }

    /// A retransmit request goes out with the next frame the budget allows.
    pub fn need_recall(&self) -> bool {
        self.need_recall
    }

    /// The send ring.
    pub fn send_ring(&self) -> &SendRing {
        &self.send_ring
    }

    /// The receive ring.
    pub fn rcv_ring(&self) -> &RcvRing {
        &self.rcv_ring
    }

    /// The element buffer backing both rings.
    pub fn element_buffer(&self) -> &ElementBuffer {
        &self.buffer
    }

    /// Snapshot of state and ring occupancy.
    pub fn status(&self) -> VcStatus {
        VcStatus {
            arq_state: self.state,
            free_tx_slots: self.send_ring.count_free_slots(),
            tx_pending: self.send_ring.count_pending(true),
            rx_readable: self.rcv_ring.count_readable(),
            session_identifier: self.session_identifier,
        }
    }

    // =========================================================================
    // Session control
    // =========================================================================

    fn wipe_rings(&mut self) {
        self.send_ring.wipe(&mut self.buffer, 0);
        self.rcv_ring.wipe(&mut self.buffer, 0);
        self.need_recall = false;
        self.unconfirmed_payloads = 0;
        self.last_ctrl_tick = 0;
    }

    /// Drop the session and every buffered payload.
    pub fn reset(&mut self) {
        self.wipe_rings();
        self.buffer.wipe();
        self.state = ArqState::Off;
        self.session_identifier = 0;
        self.handshake_pending = false;
        self.last_tx_tick = 0;
        self.last_rx_tick = 0;
        tracing::debug!("arq reset to off");
    }

    /// Start a new session with a random non-zero identifier.
    pub fn begin_handshake(&mut self, now: Tick) -> SessionIdentifier {
        let identifier = rand::thread_rng().gen_range(1..=SessionIdentifier::MAX);
        self.start_session(identifier, now);
        identifier
    }

    /// Start a new session with a caller-chosen identifier.
    ///
    /// Identifier zero means "no session" and is rejected with
    /// [`VcError::ReservedSessionIdentifier`].
    pub fn begin_handshake_with(
        &mut self,
        identifier: SessionIdentifier,
        now: Tick,
    ) -> VcResult<()> {
        if identifier == 0 {
            return Err(VcError::ReservedSessionIdentifier);
        }
        self.start_session(identifier, now);
        Ok(())
    }

    fn start_session(&mut self, identifier: SessionIdentifier, now: Tick) {
        self.wipe_rings();
        self.state = ArqState::InInit;
        self.session_identifier = identifier;
        self.handshake_pending = true;
        self.last_tx_tick = now;
        self.last_rx_tick = now;
        tracing::debug!(identifier, "arq handshake started");
    }

    fn wipe_to_on(&mut self, identifier: SessionIdentifier, now: Tick) {
        self.wipe_rings();
        self.state = ArqState::On;
        self.session_identifier = identifier;
        self.handshake_pending = true;
        self.last_tx_tick = now;
        self.last_rx_tick = now;
    }

    fn handle_handshake(&mut self, handshake: ArqHandshake, now: Tick, diag: &mut VcDiagnostics) {
        diag.handshakes_received += 1;

        let outcome = resolve_handshake(
            self.state,
            self.session_identifier,
            handshake.peer_state,
            handshake.identifier,
        );
        match outcome {
            HandshakeOutcome::Ignore => {
                tracing::debug!(
                    own = self.session_identifier,
                    peer = handshake.identifier,
                    "ignored stale or losing handshake"
                );
            }
            HandshakeOutcome::Confirm { reply } => {
                self.state = ArqState::On;
                self.handshake_pending = reply;
                tracing::debug!(identifier = self.session_identifier, "arq on, session confirmed");
            }
            HandshakeOutcome::Restart { identifier, reply } => {
                let previous = self.state;
                self.wipe_to_on(identifier, now);
                self.handshake_pending = reply;
                tracing::debug!(%previous, identifier, "arq on, adopted peer session");
            }
            HandshakeOutcome::Echo { reply } => {
                self.handshake_pending = reply;
            }
        }
    }

    /// Drop to off if neither direction progressed within `timeout` ticks.
    ///
    /// Returns whether the session timed out.
    pub fn check_timeouts(&mut self, now: Tick, timeout: u32, diag: &mut VcDiagnostics) -> bool {
        if self.state == ArqState::Off {
            return false;
        }

        let tx_idle = ticks_since(now, self.last_tx_tick);
        let rx_idle = ticks_since(now, self.last_rx_tick);
        if tx_idle <= timeout && rx_idle <= timeout {
            return false;
        }

        tracing::debug!(
            identifier = self.session_identifier,
            tx_idle,
            rx_idle,
            "arq session timed out"
        );
        diag.arq_timeouts += 1;
        self.reset();
        true
    }

    // =========================================================================
    // Application side
    // =========================================================================

    /// Queue a payload for sending. Accepted in every state.
    pub fn push_to_send(&mut self, payload: &[u8]) -> VcResult<ArqSequence> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(VcError::PayloadTooLarge {
                length: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(self.send_ring.push(&mut self.buffer, payload)?)
    }

    /// Whether `push_to_send` would fail for lack of a ring slot.
    pub fn send_buffer_is_full(&self) -> bool {
        self.send_ring.is_full()
    }

    /// Payloads waiting for transmission.
    pub fn count_pending(&self, include_resends: bool) -> usize {
        self.send_ring.count_pending(include_resends)
    }

    /// Copy the next in-order received payload into `target`.
    pub fn read_received(&mut self, target: &mut [u8]) -> VcResult<usize> {
        Ok(self.rcv_ring.read_next(&mut self.buffer, target)?)
    }

    /// Payloads ready for `read_received`.
    pub fn count_readable(&self) -> usize {
        self.rcv_ring.count_readable()
    }

    /// Schedule a transmitted, unacknowledged payload for retransmission.
    pub fn schedule_resend(&mut self, sequence: ArqSequence) -> VcResult<()> {
        Ok(self.send_ring.schedule_resend(sequence)?)
    }

    // =========================================================================
    // Frame side
    // =========================================================================

    fn within_idle_budget(&self, frames_sent: u16) -> bool {
        frames_sent < self.config.arq.idle_frames_per_window
    }

    fn control_due(&self, now: Tick) -> bool {
        let threshold = self.config.arq.idle_frame_threshold_ticks;
        ticks_since(now, self.last_ctrl_tick) > threshold
            || ticks_since(now, self.last_tx_tick) > threshold
            || ticks_since(now, self.last_rx_tick) > threshold
            || self.unconfirmed_payloads > 0
    }

    /// Whether `fill_frame` would add anything.
    pub fn content_to_send(&self, now: Tick, frames_sent: u16) -> bool {
        let budget = self.within_idle_budget(frames_sent);
        match self.state {
            ArqState::Off => self.send_ring.count_pending(false) > 0,
            ArqState::InInit => budget,
            ArqState::On => {
                self.send_ring.count_pending(true) > 0
                    || (budget && (self.rcv_ring.horizon_bitmap() != 0 || self.need_recall))
                    || self.handshake_pending
                    || (budget && self.control_due(now))
            }
        }
    }

    /// Add this channel's extensions and at most one payload to `frame`.
    ///
    /// Returns whether anything was added. A payload that does not fit is
    /// dropped from the send ring and reported as
    /// [`VcError::PayloadTooLarge`].
    pub fn fill_frame(
        &mut self,
        frame: &mut Frame,
        now: Tick,
        frames_sent: u16,
        diag: &mut VcDiagnostics,
    ) -> VcResult<bool> {
        let added = match self.state {
            ArqState::Off => self.fill_unsequenced(frame, diag)?,
            ArqState::InInit => {
                if self.within_idle_budget(frames_sent) {
                    frame.add_extension(ArqHandshake {
                        peer_state: ArqState::InInit,
                        identifier: self.session_identifier,
                    })?;
                    diag.handshakes_sent += 1;
                    true
                } else {
                    false
                }
            }
            ArqState::On => self.fill_sequenced(frame, now, frames_sent, diag)?,
        };

        if added {
            diag.frames_filled += 1;
        }
        Ok(added)
    }

    fn peek_next(&self, include_resends: bool) -> VcResult<Option<TxPayload>> {
        match self.send_ring.peek_next_tx(&self.buffer, include_resends) {
            Ok(next) => Ok(Some(next)),
            Err(RingError::Empty) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Off: send the next fresh payload once and forget it.
    fn fill_unsequenced(&mut self, frame: &mut Frame, diag: &mut VcDiagnostics) -> VcResult<bool> {
        let Some(next) = self.peek_next(false)? else {
            return Ok(false);
        };

        if next.length > frame.space_left() {
            return Err(self.discard_oversize(next, frame.space_left(), false, diag));
        }

        let tx = self
            .send_ring
            .read_for_tx(&self.buffer, frame.spare_payload_mut(), false)?;
        frame.commit_payload(tx.length)?;
        let tx_sequence = self.send_ring.tx_sequence();
        self.send_ring.clean_tail_up_to(&mut self.buffer, tx_sequence)?;

        diag.payloads_sent += 1;
        Ok(true)
    }

    /// On: handshake, retransmit request, control, then one sequenced payload.
    fn fill_sequenced(
        &mut self,
        frame: &mut Frame,
        now: Tick,
        frames_sent: u16,
        diag: &mut VcDiagnostics,
    ) -> VcResult<bool> {
        let budget = self.within_idle_budget(frames_sent);
        let mut added = false;
        frame.set_arq_on(true);

        if self.handshake_pending {
            frame.add_extension(ArqHandshake {
                peer_state: ArqState::On,
                identifier: self.session_identifier,
            })?;
            self.handshake_pending = false;
            diag.handshakes_sent += 1;
            added = true;
        }

        if budget && (self.rcv_ring.horizon_bitmap() != 0 || self.need_recall) {
            let request = ArqRequest {
                sequence: self.rcv_ring.head_sequence(),
                mask: self.rcv_ring.missing_mask(),
            };
            frame.add_extension(request)?;
            self.need_recall = false;
            diag.resend_requests_sent += 1;
            tracing::debug!(sequence = request.sequence, mask = request.mask, "requested resends");
            added = true;
        }

        let payload_waiting = self.send_ring.count_pending(true) > 0;
        if payload_waiting || (budget && self.control_due(now)) {
            frame.add_extension(ArqControl {
                tx_sequence: self.send_ring.tx_sequence(),
                rx_sequence: self.rcv_ring.head_sequence(),
            })?;
            self.last_ctrl_tick = now;
            self.unconfirmed_payloads = 0;
            diag.control_sent += 1;
            added = true;
        }

        if !payload_waiting {
            return Ok(added);
        }
        let Some(next) = self.peek_next(true)? else {
            return Ok(added);
        };

        let space = frame.space_left().saturating_sub(EXT_ARQ_SEQUENCE_SIZE);
        if next.length > space {
            return Err(self.discard_oversize(next, space, true, diag));
        }

        frame.add_extension(ArqSequenceExt {
            sequence: next.sequence,
        })?;
        let tx = self
            .send_ring
            .read_for_tx(&self.buffer, frame.spare_payload_mut(), true)?;
        frame.commit_payload(tx.length)?;

        if tx.resend {
            diag.payloads_resent += 1;
            tracing::trace!(sequence = tx.sequence, "resent payload");
        } else {
            diag.payloads_sent += 1;
        }
        Ok(true)
    }

    fn discard_oversize(
        &mut self,
        next: TxPayload,
        space: usize,
        include_resends: bool,
        diag: &mut VcDiagnostics,
    ) -> VcError {
        let discarded = self.send_ring.discard_next_tx(include_resends);
        if !include_resends {
            let tx_sequence = self.send_ring.tx_sequence();
            if let Err(e) = self.send_ring.clean_tail_up_to(&mut self.buffer, tx_sequence) {
                tracing::debug!(error = %e, "could not release discarded payload");
            }
        }
        diag.payloads_discarded += 1;
        tracing::warn!(
            sequence = next.sequence,
            length = next.length,
            space,
            discarded = discarded.is_ok(),
            "payload does not fit frame, discarded"
        );
        VcError::PayloadTooLarge {
            length: next.length,
            max: space,
        }
    }

    /// Apply a received frame addressed to this channel.
    ///
    /// The handshake goes first and may change the state the rest of the
    /// frame is handled in. While on, control and retransmit requests are
    /// applied before the payload is pushed at its sequence.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        now: Tick,
        diag: &mut VcDiagnostics,
    ) -> VcResult<()> {
        diag.frames_processed += 1;

        if let Some(handshake) = frame.handshake() {
            self.handle_handshake(handshake, now, diag);
        }

        match self.state {
            ArqState::Off => match frame.payload() {
                Some(payload) => self.push_unsequenced(payload, now, diag),
                None => Ok(()),
            },
            ArqState::InInit => {
                tracing::trace!("frame ignored while handshaking");
                Ok(())
            }
            ArqState::On => {
                if let Some(control) = frame.control() {
                    tracing::trace!(
                        tx = control.tx_sequence,
                        rx = control.rx_sequence,
                        "received arq control"
                    );
                    self.update_tx_sync(control.rx_sequence, now);
                    self.update_rx_sync(control.tx_sequence, now, diag);
                }

                if let Some(request) = frame.request() {
                    diag.resend_requests_received += 1;
                    self.send_ring
                        .schedule_resends_by_mask(request.sequence, request.mask);
                }

                let Some(payload) = frame.payload() else {
                    return Ok(());
                };
                let Some(sequence) = frame.sequence() else {
                    self.need_recall = true;
                    diag.missing_sequence += 1;
                    tracing::warn!("arq on but payload arrived without sequence");
                    return Err(VcError::MissingSequence);
                };

                self.unconfirmed_payloads = self.unconfirmed_payloads.saturating_add(1);
                self.push_received(payload, sequence, now, diag)
            }
        }
    }

    fn push_received(
        &mut self,
        payload: &[u8],
        sequence: ArqSequence,
        now: Tick,
        diag: &mut VcDiagnostics,
    ) -> VcResult<()> {
        match self.rcv_ring.push(&mut self.buffer, payload, sequence) {
            Ok(advanced) => {
                if advanced > 0 {
                    self.last_rx_tick = now;
                }
                diag.payloads_received += 1;
                Ok(())
            }
            Err(e) => {
                diag.payloads_rejected += 1;
                tracing::debug!(sequence, error = %e, "received payload rejected");
                Err(e.into())
            }
        }
    }

    /// Pass-through receive while off: the payload takes the next head slot.
    fn push_unsequenced(
        &mut self,
        payload: &[u8],
        now: Tick,
        diag: &mut VcDiagnostics,
    ) -> VcResult<()> {
        match self.rcv_ring.push_at_head(&mut self.buffer, payload) {
            Ok(_) => {
                self.last_rx_tick = now;
                diag.payloads_received += 1;
                Ok(())
            }
            Err(e) => {
                diag.payloads_rejected += 1;
                tracing::debug!(error = %e, "unsequenced payload rejected");
                Err(e.into())
            }
        }
    }

    /// The peer's receive head acknowledges everything before it.
    fn update_tx_sync(&mut self, peer_rx_sequence: ArqSequence, now: Tick) {
        match self
            .send_ring
            .clean_tail_up_to(&mut self.buffer, peer_rx_sequence)
        {
            Ok(cleared) if cleared > 0 => self.last_tx_tick = now,
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "ignored acknowledgement"),
        }
        if self.send_ring.tx_sequence() == peer_rx_sequence {
            self.last_tx_tick = now;
        }
    }

    /// The peer's transmit head tells whether we are missing anything.
    fn update_rx_sync(
        &mut self,
        peer_tx_sequence: ArqSequence,
        now: Tick,
        diag: &mut VcDiagnostics,
    ) {
        match self.rcv_ring.sync_status(peer_tx_sequence) {
            SyncStatus::InSync => {
                self.last_rx_tick = now;
                self.need_recall = false;
            }
            SyncStatus::Behind { missing } => {
                tracing::trace!(missing, "behind peer, recall needed");
                self.need_recall = true;
            }
            SyncStatus::Diverged => {
                diag.sequence_divergences += 1;
                tracing::warn!(
                    peer_tx = peer_tx_sequence,
                    head = self.rcv_ring.head_sequence(),
                    "receive sequence detached from peer"
                );
            }
        }
    }
}
