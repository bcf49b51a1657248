use crate::captions::Caption;
use crate::error::SessionError;
use crate::link::NegotiationState;
use crate::media::RemoteStream;
use babel_core::{Identity, LanguageTag, Participant, ParticipantId, RoomId};

/// Everything a session reports outward, in the order it happened.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Joined {
        local_id: ParticipantId,
        room_id: RoomId,
    },

    MemberAdded(Participant),

    MemberUpdated(Participant),

    MemberRemoved(Participant),

    LinkStateChanged {
        peer_id: ParticipantId,
        state: NegotiationState,
    },

    LinkEstablished {
        peer_id: ParticipantId,
        stream: RemoteStream,
    },

    /// A link attempt failed. With `retrying` a fresh transport is already
    /// being negotiated.
    LinkFailed {
        peer_id: ParticipantId,
        error: SessionError,
        retrying: bool,
    },

    PeerUnreachable(ParticipantId),

    /// An invariant check fired. The offending object was discarded.
    ConsistencyWarning(SessionError),

    SpeechReceived {
        identity: Identity,
        text: String,
        source_lang: LanguageTag,
    },

    Caption(Caption),

    RelayError {
        reason: String,
    },

    RelayLost,

    Closed,
}
