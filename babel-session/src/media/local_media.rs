use std::fmt;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// One captured track. The handle is absent for tracks that only exist as
/// identifiers, which is enough for transports that do not carry real RTP.
#[derive(Clone)]
pub struct LocalTrack {
    id: String,
    kind: MediaKind,
    handle: Option<Arc<dyn TrackLocal + Send + Sync>>,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            kind,
            handle: None,
        }
    }

    pub fn from_rtc(handle: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        let kind = match handle.kind() {
            RTPCodecType::Video => MediaKind::Video,
            _ => MediaKind::Audio,
        };
        Self {
            id: handle.id().to_owned(),
            kind,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn handle(&self) -> Option<&Arc<dyn TrackLocal + Send + Sync>> {
        self.handle.as_ref()
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("rtc", &self.handle.is_some())
            .finish()
    }
}

/// The local track set. Shared read-only by every peer link.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    tracks: Vec<LocalTrack>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self { tracks }
    }

    pub fn with_track(mut self, track: LocalTrack) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Local media as handed to `join`.
///
/// `Pending` records links without transports until `attach_media` arrives.
#[derive(Debug, Clone)]
pub enum MediaGrant {
    Ready(LocalMedia),
    Pending,
}

impl MediaGrant {
    pub fn media(&self) -> Option<&LocalMedia> {
        match self {
            MediaGrant::Ready(media) => Some(media),
            MediaGrant::Pending => None,
        }
    }
}

impl From<LocalMedia> for MediaGrant {
    fn from(media: LocalMedia) -> Self {
        MediaGrant::Ready(media)
    }
}
