use crate::captions::CaptionSettings;
use crate::error::SessionError;
use crate::link::LinkSnapshot;
use crate::media::LocalMedia;
use crate::session::{SessionCommand, SessionEvent};
use babel_core::{LanguageTag, Participant, ParticipantId, RoomId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

/// Control surface of one joined room. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    local_id: ParticipantId,
    room_id: RoomId,
    command_tx: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    active: Arc<AtomicBool>,
    captions: Option<watch::Sender<CaptionSettings>>,
}

impl SessionHandle {
    pub(crate) fn new(
        local_id: ParticipantId,
        room_id: RoomId,
        command_tx: mpsc::Sender<SessionCommand>,
        events: broadcast::Sender<SessionEvent>,
        active: Arc<AtomicBool>,
        captions: Option<watch::Sender<CaptionSettings>>,
    ) -> Self {
        Self {
            local_id,
            room_id,
            command_tx,
            events,
            active,
            captions,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Close every link and leave the room. Idempotent; returns once the
    /// session has shut down.
    pub async fn leave(&self) {
        let (done, wait) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Leave { done })
            .await
            .is_err()
        {
            debug!("Session {} already closed", self.local_id);
            return;
        }
        let _ = wait.await;
    }

    pub async fn update_local_language(&self, lang: impl Into<LanguageTag>) -> Result<(), SessionError> {
        self.command(SessionCommand::UpdateLanguage { lang: lang.into() })
            .await
    }

    pub async fn set_track_enabled(&self, track_id: impl Into<String>, enabled: bool) -> Result<(), SessionError> {
        self.command(SessionCommand::SetTrackEnabled {
            track_id: track_id.into(),
            enabled,
        })
        .await
    }

    pub async fn attach_media(&self, media: LocalMedia) -> Result<(), SessionError> {
        self.command(SessionCommand::AttachMedia { media }).await
    }

    pub async fn publish_transcript(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.command(SessionCommand::PublishTranscript { text: text.into() })
            .await
    }

    pub async fn members(&self) -> Result<Vec<Participant>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(SessionCommand::Members { reply }).await?;
        rx.await.map_err(|_| SessionError::Inactive)
    }

    pub async fn links(&self) -> Result<Vec<LinkSnapshot>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(SessionCommand::Links { reply }).await?;
        rx.await.map_err(|_| SessionError::Inactive)
    }

    /// No-op when the session was joined without captions.
    pub fn set_listen_language(&self, lang: impl Into<LanguageTag>) {
        let lang = lang.into();
        if let Some(settings) = &self.captions {
            settings.send_modify(|s| s.listen_language = lang);
        }
    }

    pub fn set_subtitles_enabled(&self, enabled: bool) {
        if let Some(settings) = &self.captions {
            settings.send_modify(|s| s.subtitles_enabled = enabled);
        }
    }

    async fn command(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::Inactive);
        }
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Inactive)
    }
}
