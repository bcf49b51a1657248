use crate::link::LinkSnapshot;
use crate::media::LocalMedia;
use babel_core::{LanguageTag, Participant};
use tokio::sync::oneshot;

/// Requests from a `SessionHandle` to its session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Close every link and unregister from the relay.
    Leave { done: oneshot::Sender<()> },

    /// Metadata only; no renegotiation.
    UpdateLanguage { lang: LanguageTag },

    SetTrackEnabled { track_id: String, enabled: bool },

    AttachMedia { media: LocalMedia },

    /// Send a local transcript to the room as `speak-data`.
    PublishTranscript { text: String },

    Members { reply: oneshot::Sender<Vec<Participant>> },

    Links { reply: oneshot::Sender<Vec<LinkSnapshot>> },
}
