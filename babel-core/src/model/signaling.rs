use crate::model::candidate::Candidate;
use crate::model::language::LanguageTag;
use crate::model::participant::{Identity, Participant, ParticipantId};
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Messages a client sends to the relay.
///
/// Negotiation payloads always carry the intended recipient in `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    JoinRoom {
        room_id: RoomId,
        identity: Identity,
    },
    LeaveRoom,
    Offer {
        target: ParticipantId,
        sdp: String,
    },
    Answer {
        target: ParticipantId,
        sdp: String,
    },
    Candidate {
        target: ParticipantId,
        candidate: Candidate,
    },
    UpdateLanguage {
        lang: LanguageTag,
    },
    SpeakData {
        room_id: RoomId,
        text: String,
        source_lang: LanguageTag,
        identity: Identity,
    },
}

impl ClientMessage {
    /// Recipient of a point-to-point negotiation message.
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            ClientMessage::Offer { target, .. }
            | ClientMessage::Answer { target, .. }
            | ClientMessage::Candidate { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Messages the relay delivers to a client.
///
/// Point-to-point messages carry `from`, stamped by the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RelayMessage {
    Welcome {
        participant_id: ParticipantId,
        room_id: RoomId,
        members: Vec<Participant>,
    },
    PeerJoined {
        participant: Participant,
    },
    PeerLeft {
        peer_id: ParticipantId,
    },
    Offer {
        from: ParticipantId,
        sdp: String,
    },
    Answer {
        from: ParticipantId,
        sdp: String,
    },
    Candidate {
        from: ParticipantId,
        candidate: Candidate,
    },
    LanguageChanged {
        peer_id: ParticipantId,
        lang: LanguageTag,
    },
    ReceiveSpeakData {
        text: String,
        source_lang: LanguageTag,
        identity: Identity,
    },
    Error {
        reason: String,
    },
}
