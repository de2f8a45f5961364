//! Virtual channel configuration.
//!
//! Ring geometry is fixed when a channel is built; the ARQ timing parameters
//! drive keep-alives, resend requests and the session timeout.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::buffer::ElementBuffer;
use crate::core::{
    ARQ_MAXIMUM_HORIZON, ARQ_TIMEOUT_TICKS_RANGE, ConfigError, DEFAULT_ARQ_TIMEOUT_TICKS,
    DEFAULT_ELEMENT_SIZE, DEFAULT_HORIZON_WIDTH, DEFAULT_IDLE_FRAME_THRESHOLD_TICKS,
    DEFAULT_IDLE_FRAMES_PER_WINDOW, DEFAULT_RING_LEN, ELEMENT_MAX_COUNT,
    IDLE_FRAME_THRESHOLD_TICKS_RANGE, IDLE_FRAMES_PER_WINDOW_RANGE, MAX_PAYLOAD_LEN,
    VC_ELEMENT_SIZE_MAX, VC_ELEMENT_SIZE_MIN, VC_RING_LEN_MAX, VC_RING_LEN_MIN,
};

/// ARQ timing parameters, in ticks and frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArqConfig {
    /// No tx or rx progress for this long drops the session to off.
    pub timeout_ticks: u32,
    /// Idle time after which a control extension is sent unprompted.
    pub idle_frame_threshold_ticks: u32,
    /// Frames a channel may emit per window without fresh payload.
    pub idle_frames_per_window: u16,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            timeout_ticks: DEFAULT_ARQ_TIMEOUT_TICKS,
            idle_frame_threshold_ticks: DEFAULT_IDLE_FRAME_THRESHOLD_TICKS,
            idle_frames_per_window: DEFAULT_IDLE_FRAMES_PER_WINDOW,
        }
    }
}

impl ArqConfig {
    /// Create with custom timing
    pub fn with_timing(
        timeout_ticks: u32,
        idle_frame_threshold_ticks: u32,
        idle_frames_per_window: u16,
    ) -> Self {
        Self {
            timeout_ticks,
            idle_frame_threshold_ticks,
            idle_frames_per_window,
        }
    }

    /// Check every parameter against its supported range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("timeout_ticks", self.timeout_ticks, ARQ_TIMEOUT_TICKS_RANGE)?;
        check_range(
            "idle_frame_threshold_ticks",
            self.idle_frame_threshold_ticks,
            IDLE_FRAME_THRESHOLD_TICKS_RANGE,
        )?;
        let (min, max) = IDLE_FRAMES_PER_WINDOW_RANGE;
        check_range(
            "idle_frames_per_window",
            u32::from(self.idle_frames_per_window),
            (u32::from(min), u32::from(max)),
        )
    }
}

fn check_range(name: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ArqParameter {
            name,
            value,
            min,
            max,
        })
    }
}

/// Geometry and timing of one virtual channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VcConfig {
    /// Usable payload bytes per element buffer slot.
    pub element_size: usize,
    /// Send ring length.
    pub send_ring_len: usize,
    /// Receive ring length.
    pub rcv_ring_len: usize,
    /// Receive horizon width.
    pub horizon_width: u16,
    /// ARQ timing.
    pub arq: ArqConfig,
}

impl Default for VcConfig {
    fn default() -> Self {
        Self {
            element_size: DEFAULT_ELEMENT_SIZE,
            send_ring_len: DEFAULT_RING_LEN,
            rcv_ring_len: DEFAULT_RING_LEN,
            horizon_width: DEFAULT_HORIZON_WIDTH,
            arq: ArqConfig::default(),
        }
    }
}

impl VcConfig {
    /// Create with custom ring geometry and default timing
    pub fn with_rings(send_ring_len: usize, rcv_ring_len: usize, horizon_width: u16) -> Self {
        Self {
            send_ring_len,
            rcv_ring_len,
            horizon_width,
            ..Self::default()
        }
    }

    /// Replace the element size
    pub fn with_element_size(mut self, element_size: usize) -> Self {
        self.element_size = element_size;
        self
    }

    /// Replace the ARQ timing
    pub fn with_arq(mut self, arq: ArqConfig) -> Self {
        self.arq = arq;
        self
    }

    /// Largest horizon the receive ring length allows.
    pub fn max_horizon_width(&self) -> u16 {
        let by_ring = self.rcv_ring_len.saturating_sub(3);
        by_ring.min(usize::from(ARQ_MAXIMUM_HORIZON)) as u16
    }

    /// Element buffer slots needed so both rings can be full of maximum-size payloads.
    pub fn element_count(&self) -> usize {
        let ring_slots = self.send_ring_len + self.rcv_ring_len - 2;
        ring_slots * ElementBuffer::element_requirement(self.element_size, MAX_PAYLOAD_LEN)
    }

    /// Check the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (ring, len) in [("send", self.send_ring_len), ("receive", self.rcv_ring_len)] {
            if !(VC_RING_LEN_MIN..=VC_RING_LEN_MAX).contains(&len) {
                return Err(ConfigError::RingLength {
                    ring,
                    len,
                    min: VC_RING_LEN_MIN,
                    max: VC_RING_LEN_MAX,
                });
            }
        }

        let max = self.max_horizon_width();
        if self.horizon_width > max {
            return Err(ConfigError::HorizonWidth {
                horizon: self.horizon_width,
                max,
            });
        }

        if !(VC_ELEMENT_SIZE_MIN..=VC_ELEMENT_SIZE_MAX).contains(&self.element_size) {
            return Err(ConfigError::ElementSize {
                size: self.element_size,
                min: VC_ELEMENT_SIZE_MIN,
                max: VC_ELEMENT_SIZE_MAX,
            });
        }

        let count = self.element_count();
        if count > ELEMENT_MAX_COUNT {
            return Err(ConfigError::ElementCount(count));
        }

        self.arq.validate()
    }
}
