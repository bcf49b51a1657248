use crate::media::RemoteStream;
use babel_core::ParticipantId;

/// Presentation hooks owned by the media/UI layer.
///
/// Called from the session actor; implementations must not block.
pub trait MediaRenderer: Send + Sync {
    fn render_remote_stream(&self, peer_id: &ParticipantId, stream: RemoteStream);

    fn remove_remote_stream(&self, peer_id: &ParticipantId);
}

/// Renderer that only logs. Handy for headless clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl MediaRenderer for NullRenderer {
    fn render_remote_stream(&self, peer_id: &ParticipantId, stream: RemoteStream) {
        tracing::debug!("Remote stream from {} ({} tracks)", peer_id, stream.tracks.len());
    }

    fn remove_remote_stream(&self, peer_id: &ParticipantId) {
        tracing::debug!("Remote stream from {} removed", peer_id);
    }
}
