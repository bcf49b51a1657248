use babel_core::{Candidate, ParticipantId, RelayMessage};
use babel_session::{LinkConnectionState, NegotiationState, SessionError, SessionEvent};

use crate::integration::{Harness, init_tracing, link_to, participant, settle, wait_for_state};

async fn established(h: &Harness) -> babel_session::SessionHandle {
    let handle = h.join().await;
    assert!(wait_for_state(&handle, "2", NegotiationState::OfferSent).await);
    h.signaling.push(RelayMessage::Answer {
        from: ParticipantId::from("2"),
        sdp: "answer".into(),
    });
    h.signaling.push(RelayMessage::Candidate {
        from: ParticipantId::from("2"),
        candidate: Candidate::new("c1"),
    });
    assert!(wait_for_state(&handle, "2", NegotiationState::Established).await);
    handle
}

#[tokio::test]
async fn test_failed_transport_is_rebuilt_and_reoffered() {
    init_tracing();

    let h = Harness::new("3", vec![participant("2", "Al", "en-US")]);
    let handle = established(&h).await;
    let first = link_to(&handle, "2").await.unwrap();

    assert!(h.connector.report_state("2", LinkConnectionState::Failed));
    assert!(
        h.log
            .wait_for(
                |e| matches!(e, SessionEvent::LinkFailed { error: SessionError::Transport(_), retrying: true, .. }),
                5000
            )
            .await
    );
    assert!(wait_for_state(&handle, "2", NegotiationState::OfferSent).await);

    let second = link_to(&handle, "2").await.unwrap();
    assert!(second.generation > first.generation);
    assert_eq!(h.connector.offers_created("2"), 2);
    assert_eq!(h.renderer.removals_for("2"), 1);

    // Events from the replaced transport are ignored.
    let old = h.connector.context_for("2", first.generation).unwrap();
    old.emit_state(LinkConnectionState::Failed);
    old.emit_candidate(Candidate::new("from the old transport"));
    settle().await;

    assert_eq!(link_to(&handle, "2").await.unwrap(), second);
    assert_eq!(
        h.log.count(|e| matches!(e, SessionEvent::LinkFailed { .. })),
        1
    );

    handle.leave().await;
}

#[tokio::test]
async fn test_departure_during_rebuild_withdraws_stream_once() {
    init_tracing();

    let h = Harness::new("3", vec![participant("2", "Al", "en-US")]);
    let handle = established(&h).await;
    assert_eq!(h.renderer.renders_for("2"), 1);

    assert!(h.connector.report_state("2", LinkConnectionState::Failed));
    assert!(wait_for_state(&handle, "2", NegotiationState::OfferSent).await);
    assert_eq!(h.renderer.removals_for("2"), 1);

    h.signaling.push(RelayMessage::PeerLeft {
        peer_id: ParticipantId::from("2"),
    });
    assert!(
        h.log
            .wait_for(|e| matches!(e, SessionEvent::MemberRemoved(p) if p.id.as_str() == "2"), 5000)
            .await
    );
    settle().await;

    assert!(handle.links().await.unwrap().is_empty());
    assert_eq!(h.connector.closes_for("2"), 2);
    assert_eq!(h.renderer.removals_for("2"), 1);

    handle.leave().await;
}

#[tokio::test]
async fn test_disconnected_is_not_a_failure() {
    init_tracing();

    let h = Harness::new("3", vec![participant("2", "Al", "en-US")]);
    let handle = established(&h).await;

    h.connector.report_state("2", LinkConnectionState::Disconnected);
    settle().await;

    assert_eq!(
        link_to(&handle, "2").await.unwrap().state,
        NegotiationState::Established
    );
    assert!(!h.log.any(|e| matches!(e, SessionEvent::LinkFailed { .. })));
    assert_eq!(h.connector.transports_for("2"), 1);

    handle.leave().await;
}

#[tokio::test]
async fn test_connector_error_leaves_member_without_link() {
    init_tracing();

    let h = Harness::new("1", vec![]);
    let handle = h.join().await;
    h.connector.set_fail_connect(true);

    h.signaling.push(RelayMessage::PeerJoined {
        participant: participant("2", "Al", "en-US"),
    });
    assert!(
        h.log
            .wait_for(
                |e| matches!(e, SessionEvent::LinkFailed { retrying: false, .. }),
                5000
            )
            .await
    );

    assert!(handle.links().await.unwrap().is_empty());
    assert_eq!(handle.members().await.unwrap().len(), 1);

    handle.leave().await;
}
