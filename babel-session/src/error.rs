use babel_core::ParticipantId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("this session is already in a room")]
    AlreadyInRoom,

    #[error("relay unavailable: {0}")]
    TransportUnavailable(String),
}

/// Failures scoped to one peer link. None of them ends the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("negotiation with {0} timed out")]
    NegotiationTimeout(ParticipantId),

    #[error("peer {0} is unreachable")]
    PeerUnreachable(ParticipantId),

    #[error("no local media to attach for a link to {0}")]
    MediaNotReady(ParticipantId),

    #[error("stale negotiation message from {0}")]
    StaleMessage(ParticipantId),

    #[error("a link to {0} already exists")]
    DuplicatePeer(ParticipantId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session is no longer active")]
    Inactive,
}

/// Signaling channel failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("cannot reach relay: {0}")]
    Connect(String),

    #[error("signaling channel is closed")]
    Closed,

    #[error("cannot encode message: {0}")]
    Encode(String),
}
