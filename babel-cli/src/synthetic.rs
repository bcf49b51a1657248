use babel_session::{LocalMedia, LocalTrack};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Opus comfort-noise frame.
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];
const FRAME: Duration = Duration::from_millis(20);

/// A microphone that sends silence, for headless clients.
pub fn silent_microphone() -> (LocalMedia, JoinHandle<()>) {
    let track = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
            rtcp_feedback: vec![],
        },
        "mic".to_owned(),
        "babel-cli".to_owned(),
    ));

    let writer = track.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME);
        loop {
            ticker.tick().await;
            let sample = Sample {
                data: Bytes::from_static(OPUS_SILENCE),
                duration: FRAME,
                ..Default::default()
            };
            if let Err(e) = writer.write_sample(&sample).await {
                debug!("Silence frame dropped: {}", e);
            }
        }
    });

    let media = LocalMedia::default()
        .with_track(LocalTrack::from_rtc(track as Arc<dyn TrackLocal + Send + Sync>));
    (media, task)
}
