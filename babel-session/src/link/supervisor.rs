use crate::error::SessionError;
use crate::link::{LinkRole, LinkSnapshot, NegotiationState, PeerLink};
use crate::media::{LocalMedia, MediaGrant, MediaRenderer};
use crate::session::SessionEvent;
use crate::signaling::SignalingTransport;
use crate::transport::{LinkConnectionState, LinkContext, LinkEvent, PeerConnector, PeerTransport};
use babel_core::{Candidate, ClientMessage, ParticipantId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Retry and timeout rules applied to every link.
#[derive(Debug, Clone, Copy)]
pub struct LinkPolicy {
    pub negotiation_timeout: Duration,
    pub max_offer_retries: u32,
}

/// External collaborators the supervisor drives.
#[derive(Clone)]
pub struct LinkServices {
    pub connector: Arc<dyn PeerConnector>,
    pub signaling: Arc<dyn SignalingTransport>,
    pub renderer: Arc<dyn MediaRenderer>,
    pub events: broadcast::Sender<SessionEvent>,
}

/// Owns every PeerLink of one session and drives their negotiation.
///
/// Runs inside the session actor, so no two handlers ever touch links
/// concurrently. At most one link exists per participant; that is checked
/// whenever a link is inserted.
pub struct PeerLinkSupervisor {
    local_id: ParticipantId,
    links: HashMap<ParticipantId, PeerLink>,
    /// Participants whose links were torn down on departure.
    departed: HashSet<ParticipantId>,
    media: MediaGrant,
    track_states: HashMap<String, bool>,
    services: LinkServices,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    next_generation: u64,
    policy: LinkPolicy,
}

impl PeerLinkSupervisor {
    pub fn new(
        local_id: ParticipantId,
        media: MediaGrant,
        services: LinkServices,
        link_tx: mpsc::UnboundedSender<LinkEvent>,
        policy: LinkPolicy,
    ) -> Self {
        Self {
            local_id,
            links: HashMap::new(),
            departed: HashSet::new(),
            media,
            track_states: HashMap::new(),
            services,
            link_tx,
            next_generation: 0,
            policy,
        }
    }

    pub fn has_link(&self, peer_id: &ParticipantId) -> bool {
        self.links.contains_key(peer_id)
    }

    pub fn link_ids(&self) -> Vec<ParticipantId> {
        self.links.keys().cloned().collect()
    }

    pub fn is_departed(&self, peer_id: &ParticipantId) -> bool {
        self.departed.contains(peer_id)
    }

    pub fn snapshot(&self) -> Vec<LinkSnapshot> {
        let mut links: Vec<LinkSnapshot> = self.links.values().map(PeerLink::snapshot).collect();
        links.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        links
    }

    /// Earliest pending negotiation deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.links.values().filter_map(|l| l.deadline).min()
    }

    // --- Membership input ---

    pub async fn on_member_added(&mut self, peer_id: &ParticipantId) {
        if *peer_id == self.local_id || self.links.contains_key(peer_id) {
            return;
        }
        self.departed.remove(peer_id);

        if let Err(error) = self.create_link(peer_id, true).await {
            self.report_creation_failure(peer_id, error);
        }
    }

    pub async fn on_member_removed(&mut self, peer_id: &ParticipantId) {
        self.departed.insert(peer_id.clone());
        let Some(link) = self.links.remove(peer_id) else {
            return;
        };
        info!("Tearing down link to departed participant {}", peer_id);
        self.teardown(link).await;
    }

    // --- Negotiation input ---

    pub async fn on_remote_offer(&mut self, from: &ParticipantId, sdp: String) {
        if self.discard_if_stale(from, "offer") {
            return;
        }

        if !self.links.contains_key(from) {
            info!("Offer from {} before any link existed, creating one", from);
            if let Err(error) = self.create_link(from, false).await {
                self.report_creation_failure(from, error);
                return;
            }
        }

        let Some(link) = self.links.get_mut(from) else {
            return;
        };

        if link.transport.is_none() {
            info!("Parking offer from {} until local media is attached", from);
            link.parked_offer = Some(sdp);
            return;
        }

        match (link.state, link.role) {
            (NegotiationState::Idle, _) => {}
            (NegotiationState::OfferSent, LinkRole::Initiator) => {
                info!("Glare with {}: keeping our offer, theirs is dropped", from);
                return;
            }
            (NegotiationState::OfferSent, LinkRole::Responder) => {
                info!("Glare with {}: yielding to their offer", from);
                if let Err(error) = self.rebuild(from).await {
                    self.fail_link(from, error).await;
                    return;
                }
            }
            (NegotiationState::Closed, _) => {
                warn!("Offer from {} for a closed link discarded", from);
                return;
            }
            (state, _) => {
                info!("Offer from {} while {}: remote restarted, rebuilding", from, state);
                if let Err(error) = self.rebuild(from).await {
                    self.fail_link(from, error).await;
                    return;
                }
            }
        }

        self.answer_offer(from, sdp).await;
    }

    pub async fn on_remote_answer(&mut self, from: &ParticipantId, sdp: String) {
        if self.discard_if_stale(from, "answer") {
            return;
        }
        let Some(link) = self.links.get_mut(from) else {
            warn!("{}", SessionError::StaleMessage(from.clone()));
            return;
        };
        if link.state != NegotiationState::OfferSent {
            warn!(
                "Answer from {} in {} discarded: {}",
                from,
                link.state,
                SessionError::StaleMessage(from.clone())
            );
            return;
        }

        let before = link.state;
        let result = link.accept_answer(sdp).await;
        match result {
            Ok(()) => {
                link.deadline = Some(Instant::now() + self.policy.negotiation_timeout);
                self.notify_transition(from, before);
            }
            Err(e) => {
                self.fail_link(from, SessionError::Transport(e.to_string()))
                    .await
            }
        }
    }

    pub async fn on_remote_candidate(&mut self, from: &ParticipantId, candidate: Candidate) {
        if self.discard_if_stale(from, "candidate") {
            return;
        }

        if !self.links.contains_key(from) {
            info!("Candidate from {} before any link existed, creating one", from);
            if let Err(error) = self.create_link(from, true).await {
                self.report_creation_failure(from, error);
                return;
            }
        }

        let Some(link) = self.links.get_mut(from) else {
            return;
        };
        if link.state == NegotiationState::Closed {
            warn!("{}", SessionError::StaleMessage(from.clone()));
            return;
        }
        link.receive_candidate(candidate).await;
    }

    // --- Transport input ---

    pub async fn on_link_event(&mut self, event: LinkEvent) {
        let (peer_id, generation) = event.origin();
        let peer_id = peer_id.clone();
        let Some(link) = self.links.get_mut(&peer_id) else {
            debug!("Event for a link to {} that no longer exists", peer_id);
            return;
        };
        if link.generation != generation {
            debug!(
                "Event from replaced transport to {} (generation {}, current {})",
                peer_id, generation, link.generation
            );
            return;
        }

        match event {
            LinkEvent::LocalCandidate { candidate, .. } => {
                if link.state == NegotiationState::Closed {
                    return;
                }
                self.send(ClientMessage::Candidate {
                    target: peer_id,
                    candidate,
                })
                .await;
            }

            LinkEvent::StateChanged { state, .. } => match state {
                LinkConnectionState::Connected => {
                    if !link.mark_connected() {
                        return;
                    }
                    link.attempts = 0;
                    link.rendered = true;
                    let stream = link.remote_stream();
                    info!("Link to {} established", peer_id);
                    self.services
                        .renderer
                        .render_remote_stream(&peer_id, stream.clone());
                    self.emit(SessionEvent::LinkStateChanged {
                        peer_id: peer_id.clone(),
                        state: NegotiationState::Established,
                    });
                    self.emit(SessionEvent::LinkEstablished { peer_id, stream });
                }
                state if state.is_permanent_failure() => {
                    let error = SessionError::Transport(format!("transport reported {state:?}"));
                    self.fail_link(&peer_id, error).await;
                }
                state => debug!("Transport to {} is {:?}", peer_id, state),
            },

            LinkEvent::RemoteTrack { track, .. } => {
                debug!("Remote {} track {} from {}", track.kind, track.id, peer_id);
                link.remote_tracks.push(track);
                if link.rendered {
                    let stream = link.remote_stream();
                    self.services.renderer.render_remote_stream(&peer_id, stream);
                }
            }
        }
    }

    /// Deadlines that passed are treated like transport failures.
    pub async fn expire_deadlines(&mut self, now: Instant) {
        let expired: Vec<ParticipantId> = self
            .links
            .values()
            .filter(|l| l.deadline.is_some_and(|d| d <= now))
            .map(|l| l.peer_id.clone())
            .collect();

        for peer_id in expired {
            if let Some(link) = self.links.get_mut(&peer_id) {
                warn!("Negotiation with {} timed out in {}", peer_id, link.state);
                link.deadline = None;
            }
            self.fail_link(&peer_id, SessionError::NegotiationTimeout(peer_id.clone()))
                .await;
        }
    }

    // --- Facade operations ---

    /// Provide local media after a deferred join. Deferred links get their
    /// transports and members without a link get one.
    pub async fn attach_media(&mut self, media: LocalMedia, members: &[ParticipantId]) {
        info!("Local media attached ({} tracks)", media.tracks().len());
        self.media = MediaGrant::Ready(media);

        let deferred: Vec<ParticipantId> = self
            .links
            .values()
            .filter(|l| l.transport.is_none() && l.state != NegotiationState::Closed)
            .map(|l| l.peer_id.clone())
            .collect();

        for peer_id in deferred {
            self.materialize(&peer_id).await;
        }

        for peer_id in members {
            if !self.links.contains_key(peer_id) {
                self.on_member_added(peer_id).await;
            }
        }
    }

    /// Mute or unmute one local track on every link, present and future.
    pub async fn set_track_enabled(&mut self, track_id: &str, enabled: bool) {
        self.track_states.insert(track_id.to_owned(), enabled);
        for link in self.links.values() {
            let Some(transport) = link.transport.as_ref() else {
                continue;
            };
            if let Err(e) = transport.set_track_enabled(track_id, enabled).await {
                warn!(
                    "Cannot toggle track {} toward {}: {:?}",
                    track_id, link.peer_id, e
                );
            }
        }
    }

    /// Close every link. Nothing is sent for them afterwards.
    pub async fn dispose(&mut self) {
        let links: Vec<PeerLink> = self.links.drain().map(|(_, link)| link).collect();
        for link in links {
            self.teardown(link).await;
        }
    }

    // --- Internals ---

    async fn create_link(&mut self, peer_id: &ParticipantId, may_offer: bool) -> Result<(), SessionError> {
        if self.links.contains_key(peer_id) {
            return Err(SessionError::DuplicatePeer(peer_id.clone()));
        }
        let role = LinkRole::between(&self.local_id, peer_id);

        let link = if matches!(self.media, MediaGrant::Pending) {
            info!("Link to {} deferred until local media is attached", peer_id);
            let generation = self.bump_generation();
            PeerLink::new(peer_id.clone(), role, generation, None)
        } else {
            let (transport, generation) = self.open_transport(peer_id).await?;
            PeerLink::new(peer_id.clone(), role, generation, Some(transport))
        };

        info!("Link to {} created as {:?}", peer_id, role);
        self.insert_link(link).await?;
        self.emit(SessionEvent::LinkStateChanged {
            peer_id: peer_id.clone(),
            state: NegotiationState::Idle,
        });

        if may_offer && role == LinkRole::Initiator {
            self.begin_offer(peer_id).await;
        }
        Ok(())
    }

    async fn insert_link(&mut self, link: PeerLink) -> Result<(), SessionError> {
        if self.links.contains_key(&link.peer_id) {
            let error = SessionError::DuplicatePeer(link.peer_id.clone());
            warn!("Consistency warning: {}", error);
            let mut link = link;
            link.close().await;
            self.emit(SessionEvent::ConsistencyWarning(error.clone()));
            return Err(error);
        }
        self.links.insert(link.peer_id.clone(), link);
        Ok(())
    }

    async fn open_transport(
        &mut self,
        peer_id: &ParticipantId,
    ) -> Result<(Box<dyn PeerTransport>, u64), SessionError> {
        let media = match &self.media {
            MediaGrant::Ready(media) if !media.is_empty() => media.clone(),
            _ => return Err(SessionError::MediaNotReady(peer_id.clone())),
        };

        let generation = self.bump_generation();
        let ctx = LinkContext {
            peer_id: peer_id.clone(),
            generation,
            events: self.link_tx.clone(),
        };
        let transport = self
            .services
            .connector
            .connect(ctx, &media)
            .await
            .map_err(|e| SessionError::Transport(format!("{e:#}")))?;

        for (track_id, enabled) in &self.track_states {
            if !enabled {
                if let Err(e) = transport.set_track_enabled(track_id, false).await {
                    warn!("Cannot mute track {} toward {}: {:?}", track_id, peer_id, e);
                }
            }
        }
        Ok((transport, generation))
    }

    /// Replace the transport of an existing link and reset its negotiation.
    async fn rebuild(&mut self, peer_id: &ParticipantId) -> Result<(), SessionError> {
        let (transport, generation) = self.open_transport(peer_id).await?;
        let Some(link) = self.links.get_mut(peer_id) else {
            let _ = transport.close().await;
            return Ok(());
        };
        link.replace_transport(transport, generation).await;
        if link.rendered {
            link.rendered = false;
            self.services.renderer.remove_remote_stream(peer_id);
        }
        Ok(())
    }

    async fn materialize(&mut self, peer_id: &ParticipantId) {
        let (transport, generation) = match self.open_transport(peer_id).await {
            Ok(opened) => opened,
            Err(error) => {
                self.report_creation_failure(peer_id, error);
                return;
            }
        };
        let Some(link) = self.links.get_mut(peer_id) else {
            let _ = transport.close().await;
            return;
        };
        link.attach_transport(transport, generation);
        let role = link.role;
        let parked = link.parked_offer.take();

        match parked {
            Some(sdp) => self.answer_offer(peer_id, sdp).await,
            None if role == LinkRole::Initiator => self.begin_offer(peer_id).await,
            None => {}
        }
    }

    async fn begin_offer(&mut self, peer_id: &ParticipantId) {
        if let Err(error) = self.try_offer(peer_id).await {
            self.fail_link(peer_id, error).await;
        }
    }

    async fn try_offer(&mut self, peer_id: &ParticipantId) -> Result<(), SessionError> {
        let Some(link) = self.links.get_mut(peer_id) else {
            return Ok(());
        };
        let before = link.state;
        let offer = link
            .start_offer()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        link.deadline = Some(Instant::now() + self.policy.negotiation_timeout);
        debug!("Sending offer to {}", peer_id);
        self.notify_transition(peer_id, before);
        self.send(offer).await;
        Ok(())
    }

    async fn answer_offer(&mut self, peer_id: &ParticipantId, sdp: String) {
        let Some(link) = self.links.get_mut(peer_id) else {
            return;
        };
        let before = link.state;
        let result = link.accept_offer(sdp).await;
        match result {
            Ok(answer) => {
                link.deadline = Some(Instant::now() + self.policy.negotiation_timeout);
                debug!("Sending answer to {}", peer_id);
                self.notify_transition(peer_id, before);
                self.send(answer).await;
            }
            Err(e) => {
                self.fail_link(peer_id, SessionError::Transport(e.to_string()))
                    .await
            }
        }
    }

    /// Retry with a fresh transport while attempts remain, then give up.
    async fn fail_link(&mut self, peer_id: &ParticipantId, error: SessionError) {
        let mut error = error;
        loop {
            let Some(link) = self.links.get_mut(peer_id) else {
                return;
            };
            if link.attempts >= self.policy.max_offer_retries {
                self.give_up(peer_id, error).await;
                return;
            }
            link.attempts += 1;
            let role = link.role;
            warn!(
                "Link to {} failed ({}), retry {}/{}",
                peer_id, error, link.attempts, self.policy.max_offer_retries
            );
            self.emit(SessionEvent::LinkFailed {
                peer_id: peer_id.clone(),
                error: error.clone(),
                retrying: true,
            });

            if let Err(e) = self.rebuild(peer_id).await {
                error = e;
                continue;
            }
            self.emit(SessionEvent::LinkStateChanged {
                peer_id: peer_id.clone(),
                state: NegotiationState::Idle,
            });

            match role {
                LinkRole::Initiator => match self.try_offer(peer_id).await {
                    Ok(()) => return,
                    Err(e) => error = e,
                },
                LinkRole::Responder => {
                    // Wait for the initiator's new offer, but not forever.
                    if let Some(link) = self.links.get_mut(peer_id) {
                        link.deadline = Some(Instant::now() + self.policy.negotiation_timeout);
                    }
                    return;
                }
            }
        }
    }

    async fn give_up(&mut self, peer_id: &ParticipantId, error: SessionError) {
        let Some(link) = self.links.remove(peer_id) else {
            return;
        };
        error!(
            "Peer {} unreachable after {} attempts: {}",
            peer_id, link.attempts, error
        );
        self.emit(SessionEvent::LinkFailed {
            peer_id: peer_id.clone(),
            error,
            retrying: false,
        });
        self.teardown(link).await;
        self.emit(SessionEvent::PeerUnreachable(peer_id.clone()));
    }

    async fn teardown(&self, mut link: PeerLink) {
        link.close().await;
        if link.rendered {
            self.services.renderer.remove_remote_stream(&link.peer_id);
        }
        self.emit(SessionEvent::LinkStateChanged {
            peer_id: link.peer_id.clone(),
            state: NegotiationState::Closed,
        });
    }

    fn report_creation_failure(&self, peer_id: &ParticipantId, error: SessionError) {
        match &error {
            SessionError::DuplicatePeer(_) => {
                // Already reported as a consistency warning.
            }
            SessionError::MediaNotReady(_) => {
                warn!("Link to {} not created: {}", peer_id, error);
                self.emit(SessionEvent::LinkFailed {
                    peer_id: peer_id.clone(),
                    error,
                    retrying: false,
                });
            }
            _ => {
                error!("Link to {} not created: {}", peer_id, error);
                self.emit(SessionEvent::LinkFailed {
                    peer_id: peer_id.clone(),
                    error,
                    retrying: false,
                });
            }
        }
    }

    fn discard_if_stale(&self, from: &ParticipantId, kind: &str) -> bool {
        if *from == self.local_id {
            warn!("Discarding {} addressed from ourselves", kind);
            return true;
        }
        if self.departed.contains(from) {
            warn!(
                "Discarding {}: {}",
                kind,
                SessionError::StaleMessage(from.clone())
            );
            return true;
        }
        false
    }

    fn notify_transition(&self, peer_id: &ParticipantId, before: NegotiationState) {
        let Some(link) = self.links.get(peer_id) else {
            return;
        };
        if link.state != before {
            self.emit(SessionEvent::LinkStateChanged {
                peer_id: peer_id.clone(),
                state: link.state,
            });
        }
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    async fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.services.signaling.send(msg).await {
            warn!("Failed to send negotiation message: {}", e);
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.services.events.send(event);
    }
}
