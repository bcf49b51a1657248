use babel_core::{ParticipantId, RelayMessage};
use babel_session::{NegotiationState, SessionEvent};

use crate::integration::{Harness, init_tracing, participant, settle, wait_for_state};

#[tokio::test]
async fn test_repeated_peer_left_tears_down_once() {
    init_tracing();

    let h = Harness::new("1", vec![]);
    let handle = h.join().await;

    h.signaling.push(RelayMessage::PeerJoined {
        participant: participant("2", "Al", "en-US"),
    });
    assert!(wait_for_state(&handle, "2", NegotiationState::Idle).await);

    for _ in 0..2 {
        h.signaling.push(RelayMessage::PeerLeft {
            peer_id: ParticipantId::from("2"),
        });
    }
    settle().await;

    assert!(handle.links().await.unwrap().is_empty());
    assert!(handle.members().await.unwrap().is_empty());
    // The link never got past Idle, so there was no stream to withdraw.
    assert_eq!(h.renderer.removals_for("2"), 0);
    assert_eq!(h.connector.closes_for("2"), 1);
    assert_eq!(
        h.log.count(|e| matches!(e, SessionEvent::MemberRemoved(p) if p.id.as_str() == "2")),
        1
    );
    assert_eq!(
        h.log.count(|e| matches!(
            e,
            SessionEvent::LinkStateChanged { peer_id, state: NegotiationState::Closed }
                if peer_id.as_str() == "2"
        )),
        1
    );

    handle.leave().await;
}

#[tokio::test]
async fn test_peer_left_for_unknown_participant_is_ignored() {
    init_tracing();

    let h = Harness::new("1", vec![participant("2", "Al", "en-US")]);
    let handle = h.join().await;
    assert!(wait_for_state(&handle, "2", NegotiationState::Idle).await);

    h.signaling.push(RelayMessage::PeerLeft {
        peer_id: ParticipantId::from("77"),
    });
    settle().await;

    assert_eq!(handle.members().await.unwrap().len(), 1);
    assert_eq!(handle.links().await.unwrap().len(), 1);
    assert!(h.renderer.calls().is_empty());
    assert!(!h.log.any(|e| matches!(e, SessionEvent::MemberRemoved(_))));

    handle.leave().await;
}
