//! Channel diagnostics and status snapshots.

use super::state::{ArqState, SessionIdentifier};

/// Event counters for one or more virtual channels.
///
/// Owned by the caller and passed into the channel operations that update it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcDiagnostics {
    /// Frames that received any content from `fill_frame`
    pub frames_filled: u64,
    /// Frames handed to `process_frame`
    pub frames_processed: u64,
    /// Fresh payloads placed in frames
    pub payloads_sent: u64,
    /// Retransmitted payloads placed in frames
    pub payloads_resent: u64,
    /// Payloads accepted into the receive ring
    pub payloads_received: u64,
    /// Payloads the receive ring refused (outside window, no space)
    pub payloads_rejected: u64,
    /// Payloads dropped because they did not fit a frame
    pub payloads_discarded: u64,
    /// Sequenced-mode payloads that arrived without a sequence
    pub missing_sequence: u64,
    /// Handshake extensions sent
    pub handshakes_sent: u64,
    /// Handshake extensions received
    pub handshakes_received: u64,
    /// Retransmit requests sent
    pub resend_requests_sent: u64,
    /// Retransmit requests received
    pub resend_requests_received: u64,
    /// Control extensions sent
    pub control_sent: u64,
    /// Control extensions reporting a detached peer sequence
    pub sequence_divergences: u64,
    /// Sessions dropped by the ARQ timeout
    pub arq_timeouts: u64,
}

impl VcDiagnostics {
    /// Add another set of counters to this one.
    pub fn merge(&mut self, other: &VcDiagnostics) {
        self.frames_filled += other.frames_filled;
        self.frames_processed += other.frames_processed;
        self.payloads_sent += other.payloads_sent;
        self.payloads_resent += other.payloads_resent;
        self.payloads_received += other.payloads_received;
        self.payloads_rejected += other.payloads_rejected;
        self.payloads_discarded += other.payloads_discarded;
        self.missing_sequence += other.missing_sequence;
        self.handshakes_sent += other.handshakes_sent;
        self.handshakes_received += other.handshakes_received;
        self.resend_requests_sent += other.resend_requests_sent;
        self.resend_requests_received += other.resend_requests_received;
        self.control_sent += other.control_sent;
        self.sequence_divergences += other.sequence_divergences;
        self.arq_timeouts += other.arq_timeouts;
    }
}

/// Point-in-time view of a virtual channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcStatus {
    /// Current ARQ state.
    pub arq_state: ArqState,
    /// Payloads that can still be queued for sending.
    pub free_tx_slots: usize,
    /// Payloads waiting for transmission, scheduled resends included.
    pub tx_pending: usize,
    /// Payloads ready for the application.
    pub rx_readable: usize,
    /// Current session, zero when off.
    pub session_identifier: SessionIdentifier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut total = VcDiagnostics::default();
        let one = VcDiagnostics {
            payloads_sent: 3,
            arq_timeouts: 1,
            ..Default::default()
        };
        total.merge(&one);
        total.merge(&one);
        assert_eq!(total.payloads_sent, 6);
        assert_eq!(total.arq_timeouts, 2);
        assert_eq!(total.payloads_received, 0);
    }
}
