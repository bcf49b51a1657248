use crate::captions::{Caption, CaptionSettings, Speaker, SpeechItem, Translator};
use crate::session::SessionEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Translate, caption and speak inbound speech.
///
/// Runs on its own task so slow translation never delays negotiation.
pub struct CaptionPipeline {
    translator: Arc<dyn Translator>,
    speaker: Arc<dyn Speaker>,
    settings: watch::Receiver<CaptionSettings>,
    input: mpsc::UnboundedReceiver<SpeechItem>,
    events: broadcast::Sender<SessionEvent>,
}

impl CaptionPipeline {
    pub fn new(
        translator: Arc<dyn Translator>,
        speaker: Arc<dyn Speaker>,
        settings: watch::Receiver<CaptionSettings>,
        input: mpsc::UnboundedReceiver<SpeechItem>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            translator,
            speaker,
            settings,
            input,
            events,
        }
    }

    pub async fn run(mut self) {
        info!("Caption pipeline started");

        let mut speaking: Option<JoinHandle<()>> = None;

        while let Some(item) = self.input.recv().await {
            let settings = self.settings.borrow().clone();
            let caption = self.caption(item, &settings).await;

            let text = caption.text.clone();
            let _ = self.events.send(SessionEvent::Caption(caption));

            // A new caption replaces whatever is still being spoken.
            self.speaker.cancel();
            if let Some(previous) = speaking.take() {
                previous.abort();
            }
            let speaker = self.speaker.clone();
            let lang = settings.listen_language;
            speaking = Some(tokio::spawn(async move {
                if let Err(e) = speaker.speak(&text, &lang).await {
                    warn!("Speaking caption failed: {:?}", e);
                }
            }));
        }

        if let Some(current) = speaking.take() {
            current.abort();
        }
        self.speaker.cancel();
        info!("Caption pipeline finished");
    }

    async fn caption(&self, item: SpeechItem, settings: &CaptionSettings) -> Caption {
        let target = &settings.listen_language;

        let text = if item.source_lang.same_language(target) {
            item.text.clone()
        } else {
            match self
                .translator
                .translate(&item.text, &item.source_lang, target)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        "Translation {} -> {} failed, showing original: {:?}",
                        item.source_lang, target, e
                    );
                    item.text.clone()
                }
            }
        };
        debug!("Caption from {}: {}", item.identity.display_name, text);

        Caption {
            speaker: item.identity,
            original: item.text,
            text,
            source_lang: item.source_lang,
            target_lang: target.clone(),
            visible: settings.subtitles_enabled,
        }
    }
}
