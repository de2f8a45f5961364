//! Several virtual channels sharing one radio link.

use super::channel::VirtualChannel;
use super::config::VcConfig;
use super::diag::{VcDiagnostics, VcStatus};
use crate::core::{ArqSequence, ConfigError, SkylinkError, Tick};

/// Virtual channels multiplexed over one link, served round-robin.
#[derive(Debug, Clone)]
pub struct Link {
    channels: Vec<VirtualChannel>,
    /// Channel checked first by the next `next_channel_to_send`.
    next_vc: usize,
}

impl Link {
    /// Build one channel per configuration.
    pub fn new(configs: impl IntoIterator<Item = VcConfig>) -> Result<Self, ConfigError> {
        let channels = configs
            .into_iter()
            .map(VirtualChannel::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            channels,
            next_vc: 0,
        })
    }

    /// Build `count` channels sharing one configuration.
    pub fn with_channels(count: usize, config: VcConfig) -> Result<Self, ConfigError> {
        Self::new(std::iter::repeat_n(config, count))
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the link has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel `vc`.
    pub fn channel(&self, vc: usize) -> Result<&VirtualChannel, SkylinkError> {
        self.channels.get(vc).ok_or(SkylinkError::InvalidChannel(vc))
    }

    /// Channel `vc`, mutably.
    pub fn channel_mut(&mut self, vc: usize) -> Result<&mut VirtualChannel, SkylinkError> {
        self.channels
            .get_mut(vc)
            .ok_or(SkylinkError::InvalidChannel(vc))
    }

    /// All channels.
    pub fn channels(&self) -> &[VirtualChannel] {
        &self.channels
    }

    /// Queue a payload on channel `vc`.
    pub fn push_to_send(&mut self, vc: usize, payload: &[u8]) -> Result<ArqSequence, SkylinkError> {
        Ok(self.channel_mut(vc)?.push_to_send(payload)?)
    }

    /// Read the next received payload from channel `vc`.
    pub fn read_received(&mut self, vc: usize, target: &mut [u8]) -> Result<usize, SkylinkError> {
        Ok(self.channel_mut(vc)?.read_received(target)?)
    }

    /// Status of every channel, indexed by channel number.
    pub fn status(&self) -> Vec<VcStatus> {
        self.channels.iter().map(VirtualChannel::status).collect()
    }

    /// Pick the next channel with something to send, round-robin.
    ///
    /// `frames_sent[vc]` is how many frames channel `vc` already sent in the
    /// current window; missing entries count as zero.
    pub fn next_channel_to_send(&mut self, now: Tick, frames_sent: &[u16]) -> Option<usize> {
        let count = self.channels.len();
        let vc = (0..count)
            .map(|i| (self.next_vc + i) % count)
            .find(|&vc| {
                let sent = frames_sent.get(vc).copied().unwrap_or(0);
                self.channels[vc].content_to_send(now, sent)
            })?;
        self.next_vc = (vc + 1) % count;
        Some(vc)
    }

    /// Apply the session timeout of every channel. Returns how many timed out.
    pub fn check_timeouts(&mut self, now: Tick, diag: &mut VcDiagnostics) -> usize {
        let mut timed_out = 0;
        for vc in &mut self.channels {
            let timeout = vc.config().arq.timeout_ticks;
            if vc.check_timeouts(now, timeout, diag) {
                timed_out += 1;
            }
        }
        timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vc::ArqState;

    fn link(count: usize) -> Link {
        Link::with_channels(count, VcConfig::with_rings(8, 8, 4)).unwrap()
    }

    #[test]
    fn test_invalid_channel() {
        let mut link = link(2);
        assert_eq!(link.len(), 2);
        assert!(matches!(
            link.push_to_send(2, b"x"),
            Err(SkylinkError::InvalidChannel(2))
        ));
        assert!(link.channel(1).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let configs = [VcConfig::default(), VcConfig::with_rings(3, 8, 2)];
        assert!(Link::new(configs).is_err());
    }

    #[test]
    fn test_round_robin() {
        let mut link = link(3);
        assert_eq!(link.next_channel_to_send(0, &[]), None);

        link.push_to_send(0, b"a").unwrap();
        link.push_to_send(2, b"b").unwrap();

        assert_eq!(link.next_channel_to_send(0, &[]), Some(0));
        assert_eq!(link.next_channel_to_send(0, &[]), Some(2));
        assert_eq!(link.next_channel_to_send(0, &[]), Some(0));
    }

    #[test]
    fn test_round_robin_respects_budget() {
        let mut link = link(2);
        link.channel_mut(0).unwrap().begin_handshake_with(1, 0).unwrap();
        link.channel_mut(1).unwrap().begin_handshake_with(2, 0).unwrap();

        assert_eq!(link.next_channel_to_send(0, &[1, 0]), Some(1));
        assert_eq!(link.next_channel_to_send(0, &[1, 1]), None);
    }

    #[test]
    fn test_status_and_timeouts() {
        let mut link = link(2);
        link.channel_mut(1).unwrap().begin_handshake_with(9, 0).unwrap();
        link.push_to_send(0, b"x").unwrap();

        let status = link.status();
        assert_eq!(status[0].tx_pending, 1);
        assert_eq!(status[1].arq_state, ArqState::InInit);
        assert_eq!(status[1].session_identifier, 9);

        let mut diag = VcDiagnostics::default();
        assert_eq!(link.check_timeouts(20_000, &mut diag), 1);
        assert_eq!(link.status()[1].arq_state, ArqState::Off);
        assert_eq!(diag.arq_timeouts, 1);
    }
}
