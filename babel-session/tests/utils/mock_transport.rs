use anyhow::{Result, bail};
use async_trait::async_trait;
use babel_core::{Candidate, ParticipantId};
use babel_session::{
    LinkConnectionState, LinkContext, LinkEvent, LocalMedia, PeerConnector, PeerTransport,
    RemoteTrack,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A call made on a mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect {
        peer_id: ParticipantId,
        generation: u64,
        tracks: usize,
    },
    CreateOffer {
        peer_id: ParticipantId,
        generation: u64,
    },
    SetRemoteOffer {
        peer_id: ParticipantId,
        generation: u64,
        sdp: String,
    },
    CreateAnswer {
        peer_id: ParticipantId,
        generation: u64,
    },
    SetRemoteAnswer {
        peer_id: ParticipantId,
        generation: u64,
        sdp: String,
    },
    AddCandidate {
        peer_id: ParticipantId,
        generation: u64,
        candidate: String,
    },
    SetTrackEnabled {
        peer_id: ParticipantId,
        generation: u64,
        track_id: String,
        enabled: bool,
    },
    Close {
        peer_id: ParticipantId,
        generation: u64,
    },
}

impl TransportCall {
    pub fn peer_id(&self) -> &ParticipantId {
        match self {
            TransportCall::Connect { peer_id, .. }
            | TransportCall::CreateOffer { peer_id, .. }
            | TransportCall::SetRemoteOffer { peer_id, .. }
            | TransportCall::CreateAnswer { peer_id, .. }
            | TransportCall::SetRemoteAnswer { peer_id, .. }
            | TransportCall::AddCandidate { peer_id, .. }
            | TransportCall::SetTrackEnabled { peer_id, .. }
            | TransportCall::Close { peer_id, .. } => peer_id,
        }
    }
}

struct ConnectorState {
    calls: Mutex<Vec<TransportCall>>,
    contexts: Mutex<Vec<LinkContext>>,
    auto_connect: AtomicBool,
    fail_connect: AtomicBool,
}

/// In-memory peer connector.
///
/// Its transports gather one local candidate whenever a local description
/// is applied, and report `Connected` once both descriptions are set and at
/// least one remote candidate was applied (unless built with `silent`).
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<ConnectorState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_auto_connect(true)
    }

    /// Transports never report `Connected` on their own.
    pub fn silent() -> Self {
        Self::with_auto_connect(false)
    }

    fn with_auto_connect(auto_connect: bool) -> Self {
        Self {
            state: Arc::new(ConnectorState {
                calls: Mutex::new(Vec::new()),
                contexts: Mutex::new(Vec::new()),
                auto_connect: AtomicBool::new(auto_connect),
                fail_connect: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, peer_id: &str) -> Vec<TransportCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.peer_id().as_str() == peer_id)
            .collect()
    }

    pub fn transports_for(&self, peer_id: &str) -> usize {
        self.count_for(peer_id, |c| matches!(c, TransportCall::Connect { .. }))
    }

    pub fn offers_created(&self, peer_id: &str) -> usize {
        self.count_for(peer_id, |c| matches!(c, TransportCall::CreateOffer { .. }))
    }

    pub fn answers_created(&self, peer_id: &str) -> usize {
        self.count_for(peer_id, |c| matches!(c, TransportCall::CreateAnswer { .. }))
    }

    pub fn closes_for(&self, peer_id: &str) -> usize {
        self.count_for(peer_id, |c| matches!(c, TransportCall::Close { .. }))
    }

    /// Remote candidates applied toward `peer_id`, in application order.
    pub fn applied_candidates(&self, peer_id: &str) -> Vec<String> {
        self.calls_for(peer_id)
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::AddCandidate { candidate, .. } => Some(candidate),
                _ => None,
            })
            .collect()
    }

    pub fn count_for(&self, peer_id: &str, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls_for(peer_id).iter().filter(|c| pred(c)).count()
    }

    fn latest_context(&self, peer_id: &str) -> Option<LinkContext> {
        self.state
            .contexts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|ctx| ctx.peer_id.as_str() == peer_id)
            .cloned()
    }

    pub fn context_for(&self, peer_id: &str, generation: u64) -> Option<LinkContext> {
        self.state
            .contexts
            .lock()
            .unwrap()
            .iter()
            .find(|ctx| ctx.peer_id.as_str() == peer_id && ctx.generation == generation)
            .cloned()
    }

    /// Report a connection state from the newest transport toward `peer_id`.
    pub fn report_state(&self, peer_id: &str, state: LinkConnectionState) -> bool {
        match self.latest_context(peer_id) {
            Some(ctx) => {
                ctx.emit_state(state);
                true
            }
            None => false,
        }
    }

    pub fn deliver_remote_track(&self, peer_id: &str, track: RemoteTrack) -> bool {
        let Some(ctx) = self.latest_context(peer_id) else {
            return false;
        };
        ctx.events
            .send(LinkEvent::RemoteTrack {
                peer_id: ctx.peer_id.clone(),
                generation: ctx.generation,
                track,
            })
            .is_ok()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn connect(&self, ctx: LinkContext, media: &LocalMedia) -> Result<Box<dyn PeerTransport>> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            bail!("mock connector refused to build a transport");
        }
        self.state.calls.lock().unwrap().push(TransportCall::Connect {
            peer_id: ctx.peer_id.clone(),
            generation: ctx.generation,
            tracks: media.tracks().len(),
        });
        self.state.contexts.lock().unwrap().push(ctx.clone());

        Ok(Box::new(MockPeerTransport {
            ctx,
            state: self.state.clone(),
            flags: Mutex::new(MockFlags::default()),
        }))
    }
}

#[derive(Default)]
struct MockFlags {
    local_set: bool,
    remote_set: bool,
    remote_candidates: usize,
    connected: bool,
    closed: bool,
}

pub struct MockPeerTransport {
    ctx: LinkContext,
    state: Arc<ConnectorState>,
    flags: Mutex<MockFlags>,
}

impl MockPeerTransport {
    fn record(&self, call: TransportCall) {
        tracing::debug!("[MockTransport] {:?}", call);
        self.state.calls.lock().unwrap().push(call);
    }

    fn peer(&self) -> ParticipantId {
        self.ctx.peer_id.clone()
    }

    fn gather_local_candidate(&self) {
        self.ctx.emit_candidate(Candidate::new(format!(
            "candidate:mock {} gen{}",
            self.ctx.peer_id, self.ctx.generation
        )));
    }

    fn maybe_connect(&self) {
        if !self.state.auto_connect.load(Ordering::SeqCst) {
            return;
        }
        let mut flags = self.flags.lock().unwrap();
        if flags.local_set
            && flags.remote_set
            && flags.remote_candidates > 0
            && !flags.connected
            && !flags.closed
        {
            flags.connected = true;
            self.ctx.emit_state(LinkConnectionState::Connected);
        }
    }
}

#[async_trait]
impl PeerTransport for MockPeerTransport {
    async fn create_offer(&self) -> Result<String> {
        self.record(TransportCall::CreateOffer {
            peer_id: self.peer(),
            generation: self.ctx.generation,
        });
        self.flags.lock().unwrap().local_set = true;
        self.gather_local_candidate();
        self.maybe_connect();
        Ok(format!("offer toward {} gen{}", self.ctx.peer_id, self.ctx.generation))
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        self.record(TransportCall::SetRemoteOffer {
            peer_id: self.peer(),
            generation: self.ctx.generation,
            sdp,
        });
        self.flags.lock().unwrap().remote_set = true;
        self.maybe_connect();
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        self.record(TransportCall::CreateAnswer {
            peer_id: self.peer(),
            generation: self.ctx.generation,
        });
        self.flags.lock().unwrap().local_set = true;
        self.gather_local_candidate();
        self.maybe_connect();
        Ok(format!("answer toward {} gen{}", self.ctx.peer_id, self.ctx.generation))
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        self.record(TransportCall::SetRemoteAnswer {
            peer_id: self.peer(),
            generation: self.ctx.generation,
            sdp,
        });
        self.flags.lock().unwrap().remote_set = true;
        self.maybe_connect();
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: Candidate) -> Result<()> {
        self.record(TransportCall::AddCandidate {
            peer_id: self.peer(),
            generation: self.ctx.generation,
            candidate: candidate.candidate,
        });
        self.flags.lock().unwrap().remote_candidates += 1;
        self.maybe_connect();
        Ok(())
    }

    async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<()> {
        self.record(TransportCall::SetTrackEnabled {
            peer_id: self.peer(),
            generation: self.ctx.generation,
            track_id: track_id.to_owned(),
            enabled,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(TransportCall::Close {
            peer_id: self.peer(),
            generation: self.ctx.generation,
        });
        self.flags.lock().unwrap().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babel_session::{LocalTrack, MediaKind};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_mock_transport_connects_after_full_exchange() {
        let connector = MockConnector::new();
        let (events, mut rx) = mpsc::unbounded_channel();
        let ctx = LinkContext {
            peer_id: ParticipantId::from("7"),
            generation: 1,
            events,
        };
        let media = LocalMedia::default().with_track(LocalTrack::new("mic", MediaKind::Audio));

        let transport = connector.connect(ctx, &media).await.unwrap();
        transport.create_offer().await.unwrap();
        transport.set_remote_answer("a".into()).await.unwrap();
        transport
            .add_remote_candidate(Candidate::new("c"))
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(LinkEvent::LocalCandidate { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(LinkEvent::StateChanged {
                state: LinkConnectionState::Connected,
                ..
            })
        ));
        assert_eq!(connector.applied_candidates("7"), vec!["c"]);
    }
}
