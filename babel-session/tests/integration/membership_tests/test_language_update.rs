use babel_core::{ClientMessage, LanguageTag, ParticipantId, RelayMessage};
use babel_session::{NegotiationState, SessionEvent};

use crate::integration::{Harness, init_tracing, participant, settle, wait_for_state, wait_until};

#[tokio::test]
async fn test_remote_language_change_updates_member_only() {
    init_tracing();

    let h = Harness::new("1", vec![participant("2", "Bo", "en-US")]);
    let handle = h.join().await;
    assert!(wait_for_state(&handle, "2", NegotiationState::Idle).await);

    h.signaling.push(RelayMessage::LanguageChanged {
        peer_id: ParticipantId::from("2"),
        lang: LanguageTag::from("fr-FR"),
    });
    assert!(
        h.log
            .wait_for(
                |e| matches!(e, SessionEvent::MemberUpdated(p) if p.spoken_language.as_str() == "fr-FR"),
                5000
            )
            .await
    );

    let members = handle.members().await.unwrap();
    assert_eq!(members[0].spoken_language, LanguageTag::from("fr-FR"));
    assert_eq!(members[0].display_name, "Bo");

    settle().await;
    assert_eq!(h.connector.transports_for("2"), 1);
    assert_eq!(h.connector.closes_for("2"), 0);

    handle.leave().await;
}

#[tokio::test]
async fn test_local_language_change_is_announced_and_used_for_transcripts() {
    init_tracing();

    let h = Harness::new("1", vec![participant("2", "Bo", "en-US")]);
    let handle = h.join().await;

    handle.update_local_language("de-DE").await.unwrap();
    handle.publish_transcript("guten Tag").await.unwrap();

    assert!(
        wait_until(
            || h.signaling
                .sent()
                .iter()
                .any(|m| matches!(m, ClientMessage::SpeakData { .. })),
            5000
        )
        .await
    );

    let sent = h.signaling.sent();
    assert!(sent.contains(&ClientMessage::UpdateLanguage {
        lang: LanguageTag::from("de-DE")
    }));
    let speak = sent
        .iter()
        .find_map(|m| match m {
            ClientMessage::SpeakData {
                text,
                source_lang,
                identity,
                ..
            } => Some((text.clone(), source_lang.clone(), identity.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(speak.0, "guten Tag");
    assert_eq!(speak.1, LanguageTag::from("de-DE"));
    assert_eq!(speak.2.spoken_language, LanguageTag::from("de-DE"));
    assert_eq!(speak.2.display_name, "Local");

    // Links are untouched.
    assert_eq!(h.connector.transports_for("2"), 1);

    handle.leave().await;
}
