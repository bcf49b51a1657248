use std::sync::Arc;

use babel_core::{Identity, LanguageTag, RelayMessage};
use babel_session::{Caption, Session, SessionConfig, SessionEvent, SessionHandle, Speaker};

use crate::integration::{ROOM, identity, init_tracing, test_media, wait_until};
use crate::utils::{
    EventLog, HangingSpeaker, MockConnector, RecordingRenderer, RecordingSignaling, RecordingSpeaker,
    SpeakerCall, TaggingTranslator, UtteranceCall,
};

struct CaptionHarness<S = RecordingSpeaker> {
    signaling: RecordingSignaling,
    translator: TaggingTranslator,
    speaker: S,
    log: EventLog,
    handle: SessionHandle,
}

async fn join_with_captions(listen: &str) -> CaptionHarness {
    join_with_speaker(listen, RecordingSpeaker::new()).await
}

async fn join_with_speaker<S>(listen: &str, speaker: S) -> CaptionHarness<S>
where
    S: Speaker + Clone + 'static,
{
    let signaling = RecordingSignaling::new("1", vec![]);
    let translator = TaggingTranslator::new();
    let session = Session::new(
        Arc::new(signaling.clone()),
        Arc::new(MockConnector::new()),
        Arc::new(RecordingRenderer::new()),
        SessionConfig::default(),
    )
    .with_captions(Arc::new(translator.clone()), Arc::new(speaker.clone()), listen);
    let log = EventLog::attach(session.subscribe());
    let handle = session
        .join(ROOM, identity("Local"), test_media())
        .await
        .unwrap();

    CaptionHarness {
        signaling,
        translator,
        speaker,
        log,
        handle,
    }
}

fn speech<S>(h: &CaptionHarness<S>, text: &str, lang: &str) {
    h.signaling.push(RelayMessage::ReceiveSpeakData {
        text: text.into(),
        source_lang: LanguageTag::from(lang),
        identity: Identity::new("Bo", lang),
    });
}

fn captions(log: &EventLog) -> Vec<Caption> {
    log.events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Caption(c) => Some(c),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_foreign_speech_is_translated_shown_and_spoken() {
    init_tracing();

    let h = join_with_captions("fr-FR").await;
    speech(&h, "hello", "en-US");

    assert!(wait_until(|| captions(&h.log).len() == 1, 5000).await);
    let caption = &captions(&h.log)[0];
    assert_eq!(caption.text, "[fr-FR] hello");
    assert_eq!(caption.original, "hello");
    assert_eq!(caption.speaker.display_name, "Bo");
    assert_eq!(caption.target_lang, LanguageTag::from("fr-FR"));
    assert!(caption.visible);

    assert!(wait_until(|| !h.speaker.spoken().is_empty(), 5000).await);
    assert_eq!(
        h.speaker.calls(),
        vec![
            SpeakerCall::Cancel,
            SpeakerCall::Speak {
                text: "[fr-FR] hello".into(),
                lang: LanguageTag::from("fr-FR"),
            }
        ]
    );
    assert!(h.log.any(|e| matches!(e, SessionEvent::SpeechReceived { text, .. } if text == "hello")));

    h.handle.leave().await;
}

#[tokio::test]
async fn test_same_language_skips_translation() {
    init_tracing();

    let h = join_with_captions("fr-FR").await;
    speech(&h, "bonjour", "fr-CA");

    assert!(wait_until(|| captions(&h.log).len() == 1, 5000).await);
    assert_eq!(captions(&h.log)[0].text, "bonjour");
    assert!(h.translator.requests().is_empty());

    h.handle.leave().await;
}

#[tokio::test]
async fn test_translation_failure_falls_back_to_original() {
    init_tracing();

    let h = join_with_captions("ja-JP").await;
    h.translator.set_failing(true);
    speech(&h, "good morning", "en-GB");

    assert!(wait_until(|| captions(&h.log).len() == 1, 5000).await);
    assert_eq!(captions(&h.log)[0].text, "good morning");
    assert_eq!(h.translator.requests(), vec!["good morning"]);
    assert!(wait_until(|| h.speaker.spoken() == vec!["good morning"], 5000).await);

    h.handle.leave().await;
}

#[tokio::test]
async fn test_settings_changes_apply_to_later_speech() {
    init_tracing();

    let h = join_with_captions("fr-FR").await;

    h.handle.set_subtitles_enabled(false);
    h.handle.set_listen_language("de-DE");
    speech(&h, "hello", "en-US");

    assert!(wait_until(|| captions(&h.log).len() == 1, 5000).await);
    let caption = &captions(&h.log)[0];
    assert!(!caption.visible);
    assert_eq!(caption.text, "[de-DE] hello");
    assert!(
        wait_until(
            || h.speaker.calls().contains(&SpeakerCall::Speak {
                text: "[de-DE] hello".into(),
                lang: LanguageTag::from("de-DE"),
            }),
            5000
        )
        .await
    );

    h.handle.leave().await;
}

#[tokio::test]
async fn test_each_caption_cancels_before_speaking() {
    init_tracing();

    let h = join_with_captions("en-US").await;
    speech(&h, "one", "en-US");
    assert!(wait_until(|| h.speaker.spoken() == vec!["one"], 5000).await);
    speech(&h, "two", "en-US");
    assert!(wait_until(|| h.speaker.spoken() == vec!["one", "two"], 5000).await);

    assert_eq!(
        h.speaker.calls(),
        vec![
            SpeakerCall::Cancel,
            SpeakerCall::Speak {
                text: "one".into(),
                lang: LanguageTag::from("en-US"),
            },
            SpeakerCall::Cancel,
            SpeakerCall::Speak {
                text: "two".into(),
                lang: LanguageTag::from("en-US"),
            },
        ]
    );

    h.handle.leave().await;
}

#[tokio::test]
async fn test_new_caption_interrupts_unfinished_utterance() {
    init_tracing();

    let h = join_with_speaker("en-US", HangingSpeaker::new()).await;
    speech(&h, "one", "en-US");
    assert!(wait_until(|| h.speaker.started() == vec!["one"], 5000).await);

    // "one" is still being spoken when "two" arrives.
    speech(&h, "two", "en-US");
    assert!(wait_until(|| captions(&h.log).len() == 2, 5000).await);
    assert!(wait_until(|| h.speaker.started() == vec!["one", "two"], 5000).await);
    assert!(
        wait_until(
            || h.speaker.calls().contains(&UtteranceCall::Interrupted("one".into())),
            5000
        )
        .await
    );

    let calls = h.speaker.calls();
    assert_eq!(
        &calls[..3],
        &[
            UtteranceCall::Cancel,
            UtteranceCall::Started("one".into()),
            UtteranceCall::Cancel,
        ]
    );
    assert!(!calls.contains(&UtteranceCall::Interrupted("two".into())));

    h.handle.leave().await;
    assert!(
        wait_until(
            || h.speaker.calls().contains(&UtteranceCall::Interrupted("two".into())),
            5000
        )
        .await
    );
}
