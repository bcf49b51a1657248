use crate::captions::SpeechItem;
use crate::link::PeerLinkSupervisor;
use crate::membership::{MembershipChange, RoomMembership};
use crate::session::{SessionCommand, SessionEvent};
use crate::signaling::SignalingTransport;
use crate::transport::LinkEvent;
use babel_core::{ClientMessage, Identity, Participant, ParticipantId, RelayMessage, RoomId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Single-threaded event loop of one joined session.
///
/// Relay messages, transport events, facade commands and negotiation
/// deadlines are all handled here, one at a time.
pub(crate) struct SessionActor {
    pub(crate) local_id: ParticipantId,
    pub(crate) room_id: RoomId,
    pub(crate) identity: Identity,
    pub(crate) membership: RoomMembership,
    pub(crate) supervisor: PeerLinkSupervisor,
    pub(crate) signaling: Arc<dyn SignalingTransport>,
    pub(crate) command_rx: mpsc::Receiver<SessionCommand>,
    pub(crate) relay_rx: mpsc::UnboundedReceiver<RelayMessage>,
    pub(crate) link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) speech_tx: Option<mpsc::UnboundedSender<SpeechItem>>,
    pub(crate) active: Arc<AtomicBool>,
}

enum Exit {
    Left(Option<oneshot::Sender<()>>),
    RelayLost,
}

impl SessionActor {
    pub(crate) async fn run(mut self, snapshot: Vec<Participant>, backlog: VecDeque<RelayMessage>) {
        info!("Session {} started in room '{}'", self.local_id, self.room_id);
        self.emit(SessionEvent::Joined {
            local_id: self.local_id.clone(),
            room_id: self.room_id.clone(),
        });

        for change in self.membership.apply_snapshot(snapshot) {
            self.apply_membership_change(change).await;
        }
        for msg in backlog {
            self.handle_relay_message(msg).await;
        }

        let exit = loop {
            let deadline = self.supervisor.next_deadline();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave { done }) => break Exit::Left(Some(done)),
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All session handles dropped, leaving");
                            break Exit::Left(None);
                        }
                    }
                }

                msg = self.relay_rx.recv() => {
                    match msg {
                        Some(m) => self.handle_relay_message(m).await,
                        None => break Exit::RelayLost,
                    }
                }

                Some(evt) = self.link_rx.recv() => {
                    self.supervisor.on_link_event(evt).await;
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.supervisor.expire_deadlines(Instant::now()).await;
                }
            }
        };

        match exit {
            Exit::Left(done) => {
                if let Err(e) = self.signaling.send(ClientMessage::LeaveRoom).await {
                    debug!("leave-room not delivered: {}", e);
                }
                self.shutdown().await;
                info!("Session {} left room '{}'", self.local_id, self.room_id);
                self.emit(SessionEvent::Closed);
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Exit::RelayLost => {
                warn!("Relay connection lost, closing all links");
                self.shutdown().await;
                self.emit(SessionEvent::RelayLost);
                self.emit(SessionEvent::Closed);
            }
        }
    }

    /// Active until the relay is released; a rejoin waits for that.
    async fn shutdown(&mut self) {
        self.supervisor.dispose().await;
        self.signaling.disconnect().await;
        self.speech_tx = None;
        self.active.store(false, Ordering::SeqCst);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::UpdateLanguage { lang } => {
                info!("Local spoken language is now {}", lang);
                self.identity.spoken_language = lang.clone();
                self.send(ClientMessage::UpdateLanguage { lang }).await;
            }

            SessionCommand::SetTrackEnabled { track_id, enabled } => {
                info!("Track {} {}", track_id, if enabled { "enabled" } else { "muted" });
                self.supervisor.set_track_enabled(&track_id, enabled).await;
            }

            SessionCommand::AttachMedia { media } => {
                let members = self.membership.ids();
                self.supervisor.attach_media(media, &members).await;
            }

            SessionCommand::PublishTranscript { text } => {
                self.send(ClientMessage::SpeakData {
                    room_id: self.room_id.clone(),
                    text,
                    source_lang: self.identity.spoken_language.clone(),
                    identity: self.identity.clone(),
                })
                .await;
            }

            SessionCommand::Members { reply } => {
                let _ = reply.send(self.membership.current_members());
            }

            SessionCommand::Links { reply } => {
                let _ = reply.send(self.supervisor.snapshot());
            }

            SessionCommand::Leave { .. } => {}
        }
    }

    async fn handle_relay_message(&mut self, msg: RelayMessage) {
        match msg {
            RelayMessage::Welcome { participant_id, .. } => {
                warn!("Unexpected second welcome (as {}) ignored", participant_id);
            }

            RelayMessage::PeerJoined { participant } => {
                if let Some(change) = self.membership.peer_joined(participant) {
                    self.apply_membership_change(change).await;
                }
            }

            RelayMessage::PeerLeft { peer_id } => {
                if let Some(change) = self.membership.peer_left(&peer_id) {
                    self.apply_membership_change(change).await;
                }
            }

            RelayMessage::Offer { from, sdp } => {
                if self.observe_sender(&from) {
                    self.supervisor.on_remote_offer(&from, sdp).await;
                }
            }

            RelayMessage::Answer { from, sdp } => {
                self.supervisor.on_remote_answer(&from, sdp).await;
            }

            RelayMessage::Candidate { from, candidate } => {
                if self.observe_sender(&from) {
                    self.supervisor.on_remote_candidate(&from, candidate).await;
                }
            }

            RelayMessage::LanguageChanged { peer_id, lang } => {
                if let Some(change) = self.membership.update_language(&peer_id, lang) {
                    self.emit_membership(&change);
                }
            }

            RelayMessage::ReceiveSpeakData {
                text,
                source_lang,
                identity,
            } => {
                self.emit(SessionEvent::SpeechReceived {
                    identity: identity.clone(),
                    text: text.clone(),
                    source_lang: source_lang.clone(),
                });
                if let Some(tx) = &self.speech_tx {
                    let _ = tx.send(SpeechItem {
                        identity,
                        text,
                        source_lang,
                    });
                }
            }

            RelayMessage::Error { reason } => {
                warn!("Relay reported an error: {}", reason);
                self.emit(SessionEvent::RelayError { reason });
            }
        }
    }

    /// Negotiation traffic from someone we were never told about still
    /// counts as membership. Returns false for departed senders.
    fn observe_sender(&mut self, from: &ParticipantId) -> bool {
        if self.supervisor.is_departed(from) {
            warn!("Negotiation message from departed participant {} discarded", from);
            return false;
        }
        if let Some(change) = self.membership.observe_unannounced(from) {
            info!("{} is negotiating before being announced", from);
            self.emit_membership(&change);
        }
        true
    }

    async fn apply_membership_change(&mut self, change: MembershipChange) {
        self.emit_membership(&change);
        match change {
            MembershipChange::Added(p) | MembershipChange::Updated(p) => {
                self.supervisor.on_member_added(&p.id).await;
            }
            MembershipChange::Removed(p) => {
                self.supervisor.on_member_removed(&p.id).await;
            }
        }
    }

    fn emit_membership(&self, change: &MembershipChange) {
        let event = match change {
            MembershipChange::Added(p) => {
                info!("{} ({}) is in the room", p.display_name, p.id);
                SessionEvent::MemberAdded(p.clone())
            }
            MembershipChange::Updated(p) => SessionEvent::MemberUpdated(p.clone()),
            MembershipChange::Removed(p) => {
                info!("{} ({}) left the room", p.display_name, p.id);
                SessionEvent::MemberRemoved(p.clone())
            }
        };
        self.emit(event);
    }

    async fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.signaling.send(msg).await {
            warn!("Failed to send to relay: {}", e);
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
