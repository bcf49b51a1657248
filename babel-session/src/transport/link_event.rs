use crate::media::RemoteTrack;
use babel_core::{Candidate, ParticipantId};

/// Connection state as reported by a peer transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkConnectionState {
    Connecting,
    Connected,
    /// Transient; the transport may still recover.
    Disconnected,
    Failed,
    Closed,
}

impl LinkConnectionState {
    /// Failed and Closed never recover without a new transport.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, LinkConnectionState::Failed | LinkConnectionState::Closed)
    }
}

/// Events a peer transport emits toward the session actor.
///
/// Every event carries the generation of the transport that produced it so
/// that events from a replaced transport can be told apart.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A local candidate was gathered and must reach the remote peer.
    LocalCandidate {
        peer_id: ParticipantId,
        generation: u64,
        candidate: Candidate,
    },

    StateChanged {
        peer_id: ParticipantId,
        generation: u64,
        state: LinkConnectionState,
    },

    RemoteTrack {
        peer_id: ParticipantId,
        generation: u64,
        track: RemoteTrack,
    },
}

impl LinkEvent {
    pub fn origin(&self) -> (&ParticipantId, u64) {
        match self {
            LinkEvent::LocalCandidate {
                peer_id,
                generation,
                ..
            }
            | LinkEvent::StateChanged {
                peer_id,
                generation,
                ..
            }
            | LinkEvent::RemoteTrack {
                peer_id,
                generation,
                ..
            } => (peer_id, *generation),
        }
    }
}
