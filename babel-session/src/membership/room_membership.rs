use babel_core::utils::FALLBACK_LANGUAGE;
use babel_core::{LanguageTag, Participant, ParticipantId};
use std::collections::BTreeMap;
use tracing::debug;

/// What changed in the local room view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipChange {
    Added(Participant),
    Updated(Participant),
    Removed(Participant),
}

struct Member {
    participant: Participant,
    /// Seen only through negotiation traffic, not announced yet.
    provisional: bool,
}

/// Local, eventually consistent view of who else is in the room.
///
/// It never negotiates; every method only reports what changed.
pub struct RoomMembership {
    local_id: ParticipantId,
    members: BTreeMap<ParticipantId, Member>,
}

impl RoomMembership {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            members: BTreeMap::new(),
        }
    }

    /// Seed from the relay's welcome snapshot.
    pub fn apply_snapshot(&mut self, members: Vec<Participant>) -> Vec<MembershipChange> {
        members
            .into_iter()
            .filter_map(|p| self.peer_joined(p))
            .collect()
    }

    /// Duplicates are ignored. A provisional entry is filled in.
    pub fn peer_joined(&mut self, participant: Participant) -> Option<MembershipChange> {
        if participant.id == self.local_id {
            return None;
        }

        match self.members.get_mut(&participant.id) {
            Some(member) if member.provisional => {
                member.participant = participant.clone();
                member.provisional = false;
                Some(MembershipChange::Updated(participant))
            }
            Some(_) => {
                debug!("Duplicate peer-joined for {}", participant.id);
                None
            }
            None => {
                self.members.insert(
                    participant.id.clone(),
                    Member {
                        participant: participant.clone(),
                        provisional: false,
                    },
                );
                Some(MembershipChange::Added(participant))
            }
        }
    }

    /// Unknown ids are treated as already departed.
    pub fn peer_left(&mut self, peer_id: &ParticipantId) -> Option<MembershipChange> {
        match self.members.remove(peer_id) {
            Some(member) => Some(MembershipChange::Removed(member.participant)),
            None => {
                debug!("peer-left for unknown participant {}", peer_id);
                None
            }
        }
    }

    /// Record a participant that spoke to us before it was announced.
    pub fn observe_unannounced(&mut self, peer_id: &ParticipantId) -> Option<MembershipChange> {
        if *peer_id == self.local_id || self.members.contains_key(peer_id) {
            return None;
        }

        let participant = Participant {
            id: peer_id.clone(),
            display_name: peer_id.to_string(),
            spoken_language: LanguageTag::from(FALLBACK_LANGUAGE),
        };
        self.members.insert(
            peer_id.clone(),
            Member {
                participant: participant.clone(),
                provisional: true,
            },
        );
        Some(MembershipChange::Added(participant))
    }

    pub fn update_language(
        &mut self,
        peer_id: &ParticipantId,
        lang: LanguageTag,
    ) -> Option<MembershipChange> {
        let member = self.members.get_mut(peer_id)?;
        if member.participant.spoken_language == lang {
            return None;
        }
        member.participant.spoken_language = lang;
        Some(MembershipChange::Updated(member.participant.clone()))
    }

    pub fn current_members(&self) -> Vec<Participant> {
        self.members
            .values()
            .map(|m| m.participant.clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.members.keys().cloned().collect()
    }

    pub fn contains(&self, peer_id: &ParticipantId) -> bool {
        self.members.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
