use babel_core::ParticipantId;
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// A track received from a peer.
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: String,
    pub stream_id: String,
    pub handle: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            stream_id: stream_id.into(),
            handle: None,
        }
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .finish_non_exhaustive()
    }
}

/// Everything currently received from one peer, handed to the renderer.
#[derive(Debug, Clone)]
pub struct RemoteStream {
    pub peer_id: ParticipantId,
    pub tracks: Vec<RemoteTrack>,
}
