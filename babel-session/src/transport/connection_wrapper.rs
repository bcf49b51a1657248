use crate::media::{LocalMedia, RemoteTrack};
use crate::transport::{LinkConnectionState, LinkContext, LinkEvent, PeerConnector, PeerTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use babel_core::{Candidate, IceServerConfig, ParticipantId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Builds `webrtc` peer connections.
#[derive(Debug, Clone)]
pub struct WebRtcConnector {
    ice_servers: Vec<IceServerConfig>,
}

impl WebRtcConnector {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self, ctx: LinkContext, media: &LocalMedia) -> Result<Box<dyn PeerTransport>> {
        let transport = ConnectionWrapper::new(ctx, self.rtc_configuration(), media).await?;
        Ok(Box::new(transport))
    }
}

struct LocalSender {
    sender: Arc<RTCRtpSender>,
    track: Arc<dyn TrackLocal + Send + Sync>,
}

/// One `RTCPeerConnection` toward one remote participant.
pub struct ConnectionWrapper {
    pub peer_id: ParticipantId,
    pub peer_connection: Arc<RTCPeerConnection>,
    senders: HashMap<String, LocalSender>,
}

impl ConnectionWrapper {
    pub async fn new(ctx: LinkContext, rtc_config: RTCConfiguration, media: &LocalMedia) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_ctx = ctx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let ctx = state_ctx.clone();

                Box::pin(async move {
                    info!("Peer connection to {} is {:?}", ctx.peer_id, s);
                    let state = match s {
                        RTCPeerConnectionState::Connected => LinkConnectionState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkConnectionState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkConnectionState::Failed,
                        RTCPeerConnectionState::Closed => LinkConnectionState::Closed,
                        _ => LinkConnectionState::Connecting,
                    };
                    ctx.emit_state(state);
                })
            },
        ));

        let ice_ctx = ctx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let ctx = ice_ctx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                ctx.emit_candidate(Candidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                });
            })
        }));

        let track_ctx = ctx.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let ctx = track_ctx.clone();

                Box::pin(async move {
                    debug!("Remote {} track from {}", track.kind(), ctx.peer_id);
                    let remote = RemoteTrack {
                        id: track.id(),
                        kind: track.kind().to_string(),
                        stream_id: track.stream_id(),
                        handle: Some(track),
                    };
                    let _ = ctx.events.send(LinkEvent::RemoteTrack {
                        peer_id: ctx.peer_id.clone(),
                        generation: ctx.generation,
                        track: remote,
                    });
                })
            },
        ));

        let mut senders = HashMap::new();
        for local in media.tracks() {
            let Some(track) = local.handle() else {
                debug!("Track {} has no RTP source, not attached", local.id());
                continue;
            };
            let sender = peer_connection
                .add_track(Arc::clone(track))
                .await
                .with_context(|| format!("Failed to attach track {}", local.id()))?;

            // RTCP has to be drained for interceptors to work.
            let rtcp_sender = Arc::clone(&sender);
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
            });

            senders.insert(
                local.id().to_owned(),
                LocalSender {
                    sender,
                    track: Arc::clone(track),
                },
            );
        }

        Ok(Self {
            peer_id: ctx.peer_id,
            peer_connection,
            senders,
        })
    }
}

#[async_trait]
impl PeerTransport for ConnectionWrapper {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: Candidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add remote candidate")?;
        Ok(())
    }

    async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<()> {
        let Some(local) = self.senders.get(track_id) else {
            debug!("Track {} is not sent to {}", track_id, self.peer_id);
            return Ok(());
        };
        let track = enabled.then(|| Arc::clone(&local.track));
        local.sender.replace_track(track).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
