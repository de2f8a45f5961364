//! ARQ session state and handshake resolution.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of an ARQ session. Zero means no session.
pub type SessionIdentifier = u32;

/// ARQ state of a virtual channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ArqState {
    /// No reliability: payloads pass through once, unsequenced.
    #[default]
    Off = 0,
    /// Handshake sent, waiting for the peer.
    InInit = 1,
    /// Reliable transfer in both directions.
    On = 2,
}

impl ArqState {
    /// Value carried in the handshake extension.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Parse the handshake extension value.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(ArqState::Off),
            1 => Some(ArqState::InInit),
            2 => Some(ArqState::On),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArqState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArqState::Off => "off",
            ArqState::InInit => "in-init",
            ArqState::On => "on",
        };
        f.write_str(name)
    }
}

/// What a received handshake does to the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeOutcome {
    /// Stale or losing identifier.
    Ignore,
    /// Our own session confirmed; switch on without resetting sequencing.
    Confirm { reply: bool },
    /// Reset the rings and switch on with `identifier`.
    Restart {
        identifier: SessionIdentifier,
        reply: bool,
    },
    /// Repeat of the current session's handshake.
    Echo { reply: bool },
}

/// Decide how to react to a peer handshake.
///
/// `reply` tells whether we owe the peer a handshake of our own: always after
/// adopting a new session while on, otherwise only while the peer is still
/// waiting in init. A handshake carrying identifier zero names no session and
/// is ignored in every state.
pub(crate) fn resolve_handshake(
    own_state: ArqState,
    own_identifier: SessionIdentifier,
    peer_state: ArqState,
    peer_identifier: SessionIdentifier,
) -> HandshakeOutcome {
    let peer_waiting = peer_state == ArqState::InInit;
    match own_state {
        _ if peer_identifier == 0 => HandshakeOutcome::Ignore,
        ArqState::Off => HandshakeOutcome::Restart {
            identifier: peer_identifier,
            reply: true,
        },
        ArqState::InInit if peer_identifier == own_identifier => {
            HandshakeOutcome::Confirm { reply: peer_waiting }
        }
        ArqState::InInit if peer_identifier > own_identifier => HandshakeOutcome::Restart {
            identifier: peer_identifier,
            reply: peer_waiting,
        },
        ArqState::InInit => HandshakeOutcome::Ignore,
        ArqState::On if peer_identifier == own_identifier => {
            HandshakeOutcome::Echo { reply: peer_waiting }
        }
        ArqState::On => HandshakeOutcome::Restart {
            identifier: peer_identifier,
            reply: true,
        },
    }
}
