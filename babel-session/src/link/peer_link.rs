use crate::link::NegotiationState;
use crate::media::{RemoteStream, RemoteTrack};
use crate::transport::PeerTransport;
use babel_core::{Candidate, ParticipantId};
use std::collections::VecDeque;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Which side sends the offer on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Initiator,
    Responder,
}

impl LinkRole {
    pub fn between(local: &ParticipantId, remote: &ParticipantId) -> Self {
        if local.initiates_toward(remote) {
            LinkRole::Initiator
        } else {
            LinkRole::Responder
        }
    }
}

/// Read-only view of a link for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub peer_id: ParticipantId,
    pub role: LinkRole,
    pub state: NegotiationState,
    pub generation: u64,
    pub local_tracks_attached: bool,
    pub remote_description_set: bool,
    pub pending_remote_candidates: usize,
    pub attempts: u32,
}

/// State kept for one remote participant. Owned by the supervisor.
pub struct PeerLink {
    pub(crate) peer_id: ParticipantId,
    pub(crate) role: LinkRole,
    pub(crate) generation: u64,
    pub(crate) state: NegotiationState,
    pub(crate) transport: Option<Box<dyn PeerTransport>>,
    pub(crate) local_tracks_attached: bool,
    pub(crate) remote_description_set: bool,
    pub(crate) pending_remote_candidates: VecDeque<Candidate>,
    /// Offer received while no transport existed yet.
    pub(crate) parked_offer: Option<String>,
    pub(crate) attempts: u32,
    pub(crate) deadline: Option<Instant>,
    pub(crate) remote_tracks: Vec<RemoteTrack>,
    pub(crate) rendered: bool,
}

impl PeerLink {
    pub(crate) fn new(
        peer_id: ParticipantId,
        role: LinkRole,
        generation: u64,
        transport: Option<Box<dyn PeerTransport>>,
    ) -> Self {
        let local_tracks_attached = transport.is_some();
        Self {
            peer_id,
            role,
            generation,
            state: NegotiationState::Idle,
            transport,
            local_tracks_attached,
            remote_description_set: false,
            pending_remote_candidates: VecDeque::new(),
            parked_offer: None,
            attempts: 0,
            deadline: None,
            remote_tracks: Vec::new(),
            rendered: false,
        }
    }

    pub fn peer_id(&self) -> &ParticipantId {
        &self.peer_id
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    /// Give a deferred link its first transport. Queued candidates and a
    /// parked offer survive.
    pub(crate) fn attach_transport(&mut self, transport: Box<dyn PeerTransport>, generation: u64) {
        self.transport = Some(transport);
        self.generation = generation;
        self.local_tracks_attached = true;
    }

    /// Swap in a fresh transport and start negotiating from scratch.
    pub(crate) async fn replace_transport(&mut self, transport: Box<dyn PeerTransport>, generation: u64) {
        if let Some(old) = self.transport.replace(transport) {
            if let Err(e) = old.close().await {
                debug!("Closing replaced transport to {} failed: {:?}", self.peer_id, e);
            }
        }
        debug!(
            "Link {} rebuilt: generation {} -> {}",
            self.peer_id, self.generation, generation
        );
        self.generation = generation;
        self.local_tracks_attached = true;
        self.state = NegotiationState::Idle;
        self.remote_description_set = false;
        self.pending_remote_candidates.clear();
        self.parked_offer = None;
        self.deadline = None;
        self.remote_tracks.clear();
    }

    pub(crate) fn remote_stream(&self) -> RemoteStream {
        RemoteStream {
            peer_id: self.peer_id.clone(),
            tracks: self.remote_tracks.clone(),
        }
    }

    /// Release the transport. Safe in any state.
    pub(crate) async fn close(&mut self) {
        self.transition(NegotiationState::Closed);
        self.deadline = None;
        self.parked_offer = None;
        self.pending_remote_candidates.clear();
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("Closing transport to {} failed: {:?}", self.peer_id, e);
            }
        }
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            peer_id: self.peer_id.clone(),
            role: self.role,
            state: self.state,
            generation: self.generation,
            local_tracks_attached: self.local_tracks_attached,
            remote_description_set: self.remote_description_set,
            pending_remote_candidates: self.pending_remote_candidates.len(),
            attempts: self.attempts,
        }
    }
}
