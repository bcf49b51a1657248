use crate::hub::RelayError;
use babel_core::{ClientMessage, Identity, Participant, ParticipantId, RelayMessage, RoomId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct PeerSlot {
    tx: mpsc::UnboundedSender<RelayMessage>,
    room: Option<RoomId>,
    participant: Option<Participant>,
}

struct RelayInner {
    peers: DashMap<ParticipantId, PeerSlot>,
    rooms: DashMap<RoomId, Vec<ParticipantId>>,
}

/// In-memory routing table of the relay.
///
/// Lock order is rooms before peers; peer guards are never held across a
/// second map access.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<RelayInner>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                peers: DashMap::new(),
                rooms: DashMap::new(),
            }),
        }
    }

    /// Register a connection under a relay-assigned id.
    pub fn connect(&self, tx: mpsc::UnboundedSender<RelayMessage>) -> ParticipantId {
        loop {
            let id = ParticipantId::new();
            if self.connect_as(id.clone(), tx.clone()).is_ok() {
                return id;
            }
        }
    }

    /// Register a connection under a self-chosen id.
    pub fn connect_as(
        &self,
        id: ParticipantId,
        tx: mpsc::UnboundedSender<RelayMessage>,
    ) -> Result<(), RelayError> {
        match self.inner.peers.entry(id.clone()) {
            Entry::Occupied(_) => Err(RelayError::IdInUse(id)),
            Entry::Vacant(slot) => {
                slot.insert(PeerSlot {
                    tx,
                    room: None,
                    participant: None,
                });
                debug!("Connection registered as {}", id);
                Ok(())
            }
        }
    }

    pub fn is_connected(&self, id: &ParticipantId) -> bool {
        self.inner.peers.contains_key(id)
    }

    pub fn disconnect(&self, id: &ParticipantId) {
        self.leave_room(id);
        self.inner.peers.remove(id);
        debug!("Connection {} removed", id);
    }

    pub fn room_members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.inner
            .rooms
            .get(room_id)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    pub fn handle(&self, from: &ParticipantId, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinRoom { room_id, identity } => self.join_room(from, room_id, identity),

            ClientMessage::LeaveRoom => self.leave_room(from),

            ClientMessage::Offer { target, sdp } => {
                let out = RelayMessage::Offer {
                    from: from.clone(),
                    sdp,
                };
                self.route(from, &target, out);
            }

            ClientMessage::Answer { target, sdp } => {
                let out = RelayMessage::Answer {
                    from: from.clone(),
                    sdp,
                };
                self.route(from, &target, out);
            }

            ClientMessage::Candidate { target, candidate } => {
                let out = RelayMessage::Candidate {
                    from: from.clone(),
                    candidate,
                };
                self.route(from, &target, out);
            }

            ClientMessage::UpdateLanguage { lang } => {
                let room = {
                    let Some(mut slot) = self.inner.peers.get_mut(from) else {
                        return;
                    };
                    if let Some(participant) = slot.participant.as_mut() {
                        participant.spoken_language = lang.clone();
                    }
                    slot.room.clone()
                };
                let Some(room) = room else {
                    warn!("Language update from {} outside of a room", from);
                    return;
                };
                let out = RelayMessage::LanguageChanged {
                    peer_id: from.clone(),
                    lang,
                };
                self.broadcast_except(&room, from, out);
            }

            ClientMessage::SpeakData {
                room_id,
                text,
                source_lang,
                identity,
            } => {
                if self.room_of(from).as_ref() != Some(&room_id) {
                    warn!("Dropping speak-data from {} for foreign room {}", from, room_id);
                    return;
                }
                let out = RelayMessage::ReceiveSpeakData {
                    text,
                    source_lang,
                    identity,
                };
                self.broadcast_except(&room_id, from, out);
            }
        }
    }

    fn join_room(&self, from: &ParticipantId, room_id: RoomId, identity: Identity) {
        if !self.is_connected(from) {
            return;
        }
        if self.room_of(from).is_some() {
            self.leave_room(from);
        }

        let participant = Participant::new(from.clone(), identity);
        let mut room = self.inner.rooms.entry(room_id.clone()).or_default();

        let members: Vec<Participant> = room
            .iter()
            .filter_map(|id| {
                self.inner
                    .peers
                    .get(id)
                    .and_then(|slot| slot.participant.clone())
            })
            .collect();

        // The joiner must be routable and welcomed before anyone can address it.
        if let Some(mut slot) = self.inner.peers.get_mut(from) {
            slot.room = Some(room_id.clone());
            slot.participant = Some(participant.clone());
        }

        info!(
            "Participant {} joined room '{}' ({} already present)",
            from,
            room_id,
            members.len()
        );

        self.send_to(
            from,
            RelayMessage::Welcome {
                participant_id: from.clone(),
                room_id,
                members,
            },
        );

        for id in room.iter() {
            self.send_to(
                id,
                RelayMessage::PeerJoined {
                    participant: participant.clone(),
                },
            );
        }
        room.push(from.clone());
    }

    fn leave_room(&self, from: &ParticipantId) {
        let room_id = {
            let Some(mut slot) = self.inner.peers.get_mut(from) else {
                return;
            };
            slot.participant = None;
            slot.room.take()
        };
        let Some(room_id) = room_id else {
            return;
        };

        if let Some(mut room) = self.inner.rooms.get_mut(&room_id) {
            room.retain(|id| id != from);
            for id in room.iter() {
                self.send_to(
                    id,
                    RelayMessage::PeerLeft {
                        peer_id: from.clone(),
                    },
                );
            }
        }
        self.inner
            .rooms
            .remove_if(&room_id, |_, members| members.is_empty());

        info!("Participant {} left room '{}'", from, room_id);
    }

    fn route(&self, from: &ParticipantId, target: &ParticipantId, msg: RelayMessage) {
        let sender_room = self.room_of(from);
        if sender_room.is_none() || sender_room != self.room_of(target) {
            warn!(
                "Dropping negotiation message from {} to {}: not in the same room",
                from, target
            );
            return;
        }
        self.send_to(target, msg);
    }

    fn broadcast_except(&self, room_id: &RoomId, except: &ParticipantId, msg: RelayMessage) {
        let Some(room) = self.inner.rooms.get(room_id) else {
            return;
        };
        for id in room.iter().filter(|id| *id != except) {
            self.send_to(id, msg.clone());
        }
    }

    fn room_of(&self, id: &ParticipantId) -> Option<RoomId> {
        self.inner.peers.get(id).and_then(|slot| slot.room.clone())
    }

    fn send_to(&self, id: &ParticipantId, msg: RelayMessage) {
        if let Some(slot) = self.inner.peers.get(id) {
            if slot.tx.send(msg).is_err() {
                warn!("Connection {} is gone, message dropped", id);
            }
        } else {
            warn!("Attempted to relay to disconnected participant {}", id);
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}
