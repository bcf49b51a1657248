use crate::captions::{CaptionPipeline, CaptionSettings, Speaker, Translator};
use crate::config::SessionConfig;
use crate::error::{JoinError, TransportError};
use crate::link::{LinkPolicy, LinkServices, PeerLinkSupervisor};
use crate::media::{MediaGrant, MediaRenderer};
use crate::membership::RoomMembership;
use crate::session::session_actor::SessionActor;
use crate::session::{SessionEvent, SessionHandle};
use crate::signaling::SignalingTransport;
use crate::transport::PeerConnector;
use babel_core::{ClientMessage, Identity, LanguageTag, Participant, ParticipantId, RelayMessage, RoomId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tracing::{info, warn};

struct CaptionSetup {
    translator: Arc<dyn Translator>,
    speaker: Arc<dyn Speaker>,
    listen_language: LanguageTag,
}

struct Welcome {
    local_id: ParticipantId,
    members: Vec<Participant>,
    backlog: VecDeque<RelayMessage>,
}

/// Entry point for joining rooms.
///
/// One `Session` is in at most one room at a time. After `leave`, or after
/// the relay connection is lost, it may join again.
pub struct Session {
    signaling: Arc<dyn SignalingTransport>,
    connector: Arc<dyn PeerConnector>,
    renderer: Arc<dyn MediaRenderer>,
    config: SessionConfig,
    captions: Option<CaptionSetup>,
    events: broadcast::Sender<SessionEvent>,
    current: Mutex<Option<SessionHandle>>,
}

impl Session {
    pub fn new(
        signaling: Arc<dyn SignalingTransport>,
        connector: Arc<dyn PeerConnector>,
        renderer: Arc<dyn MediaRenderer>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            signaling,
            connector,
            renderer,
            config,
            captions: None,
            events,
            current: Mutex::new(None),
        }
    }

    /// Run inbound speech through `translator` and `speaker`, targeting
    /// `listen_language`.
    pub fn with_captions(
        mut self,
        translator: Arc<dyn Translator>,
        speaker: Arc<dyn Speaker>,
        listen_language: impl Into<LanguageTag>,
    ) -> Self {
        self.captions = Some(CaptionSetup {
            translator,
            speaker,
            listen_language: listen_language.into(),
        });
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Events of every room this session joins.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn join(
        &self,
        room_id: impl Into<RoomId>,
        identity: Identity,
        media: impl Into<MediaGrant>,
    ) -> Result<SessionHandle, JoinError> {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(SessionHandle::is_active) {
            return Err(JoinError::AlreadyInRoom);
        }

        let room_id = room_id.into();
        let media = media.into();

        let mut relay_rx = self
            .signaling
            .connect()
            .await
            .map_err(|e| JoinError::TransportUnavailable(e.to_string()))?;

        let join = ClientMessage::JoinRoom {
            room_id: room_id.clone(),
            identity: identity.clone(),
        };
        if let Err(e) = self.signaling.send(join).await {
            self.signaling.disconnect().await;
            return Err(JoinError::TransportUnavailable(e.to_string()));
        }

        let welcome = tokio::time::timeout(self.config.join_timeout, await_welcome(&mut relay_rx)).await;
        let welcome = match welcome {
            Ok(Ok(welcome)) => welcome,
            Ok(Err(e)) => {
                self.signaling.disconnect().await;
                return Err(JoinError::TransportUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!("No welcome from relay within {:?}", self.config.join_timeout);
                self.signaling.disconnect().await;
                return Err(JoinError::TransportUnavailable(
                    "relay did not acknowledge the join".to_owned(),
                ));
            }
        };
        info!(
            "Joined room '{}' as {} with {} members present",
            room_id,
            welcome.local_id,
            welcome.members.len()
        );

        let (command_tx, command_rx) = mpsc::channel(self.config.event_capacity.max(1));
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));

        let (speech_tx, caption_settings) = match &self.captions {
            Some(setup) => {
                let (settings_tx, settings_rx) =
                    watch::channel(CaptionSettings::new(setup.listen_language.clone()));
                let (speech_tx, speech_rx) = mpsc::unbounded_channel();
                let pipeline = CaptionPipeline::new(
                    setup.translator.clone(),
                    setup.speaker.clone(),
                    settings_rx,
                    speech_rx,
                    self.events.clone(),
                );
                tokio::spawn(pipeline.run());
                (Some(speech_tx), Some(settings_tx))
            }
            None => (None, None),
        };

        let supervisor = PeerLinkSupervisor::new(
            welcome.local_id.clone(),
            media,
            LinkServices {
                connector: self.connector.clone(),
                signaling: self.signaling.clone(),
                renderer: self.renderer.clone(),
                events: self.events.clone(),
            },
            link_tx,
            LinkPolicy {
                negotiation_timeout: self.config.negotiation_timeout,
                max_offer_retries: self.config.max_offer_retries,
            },
        );

        let actor = SessionActor {
            local_id: welcome.local_id.clone(),
            room_id: room_id.clone(),
            identity,
            membership: RoomMembership::new(welcome.local_id.clone()),
            supervisor,
            signaling: self.signaling.clone(),
            command_rx,
            relay_rx,
            link_rx,
            events: self.events.clone(),
            speech_tx,
            active: active.clone(),
        };
        tokio::spawn(actor.run(welcome.members, welcome.backlog));

        let handle = SessionHandle::new(
            welcome.local_id,
            room_id,
            command_tx,
            self.events.clone(),
            active,
            caption_settings,
        );
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Leave the current room, if any. Always succeeds.
    pub async fn leave(&self) {
        let handle = self.current.lock().await.take();
        if let Some(handle) = handle {
            handle.leave().await;
        }
    }

    pub async fn handle(&self) -> Option<SessionHandle> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|h| h.is_active())
            .cloned()
    }
}

/// Wait for the relay's welcome, keeping anything that arrives first.
async fn await_welcome(relay_rx: &mut mpsc::UnboundedReceiver<RelayMessage>) -> Result<Welcome, TransportError> {
    let mut backlog = VecDeque::new();
    loop {
        match relay_rx.recv().await {
            Some(RelayMessage::Welcome {
                participant_id,
                members,
                ..
            }) => {
                return Ok(Welcome {
                    local_id: participant_id,
                    members,
                    backlog,
                });
            }
            Some(RelayMessage::Error { reason }) => {
                return Err(TransportError::Connect(reason));
            }
            Some(other) => backlog.push_back(other),
            None => return Err(TransportError::Closed),
        }
    }
}
