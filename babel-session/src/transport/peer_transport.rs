use crate::media::LocalMedia;
use crate::transport::{LinkConnectionState, LinkEvent};
use anyhow::Result;
use async_trait::async_trait;
use babel_core::{Candidate, ParticipantId};
use tokio::sync::mpsc;

/// Identity of one transport instance plus the channel its events go to.
#[derive(Debug, Clone)]
pub struct LinkContext {
    pub peer_id: ParticipantId,
    pub generation: u64,
    pub events: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkContext {
    pub fn emit_candidate(&self, candidate: Candidate) {
        let _ = self.events.send(LinkEvent::LocalCandidate {
            peer_id: self.peer_id.clone(),
            generation: self.generation,
            candidate,
        });
    }

    pub fn emit_state(&self, state: LinkConnectionState) {
        let _ = self.events.send(LinkEvent::StateChanged {
            peer_id: self.peer_id.clone(),
            generation: self.generation,
            state,
        });
    }
}

/// Builds one peer transport per link (and per retry).
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a transport with `media` attached. The transport reports
    /// through `ctx.events` for as long as it lives.
    async fn connect(&self, ctx: LinkContext, media: &LocalMedia) -> Result<Box<dyn PeerTransport>>;
}

/// The media connection toward one remote participant.
///
/// Both `create_*` methods also apply the description locally.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn set_remote_offer(&self, sdp: String) -> Result<()>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn add_remote_candidate(&self, candidate: Candidate) -> Result<()>;

    /// Detach or re-attach one local track without renegotiating.
    async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
