use anyhow::Result;
use async_trait::async_trait;
use babel_core::{Identity, LanguageTag};

/// Text-to-text translation service.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &LanguageTag, to: &LanguageTag) -> Result<String>;
}

/// Text-to-speech engine.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str, lang: &LanguageTag) -> Result<()>;

    /// Stop whatever is being spoken.
    fn cancel(&self);
}

/// Translator that returns its input.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _from: &LanguageTag, _to: &LanguageTag) -> Result<String> {
        Ok(text.to_owned())
    }
}

/// Speaker that stays silent.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeaker;

#[async_trait]
impl Speaker for SilentSpeaker {
    async fn speak(&self, _text: &str, _lang: &LanguageTag) -> Result<()> {
        Ok(())
    }

    fn cancel(&self) {}
}

/// A remote utterance as delivered by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechItem {
    pub identity: Identity,
    pub text: String,
    pub source_lang: LanguageTag,
}

/// A translated utterance ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub speaker: Identity,
    pub original: String,
    pub text: String,
    pub source_lang: LanguageTag,
    pub target_lang: LanguageTag,
    /// Whether subtitles were switched on when the caption was produced.
    pub visible: bool,
}

/// Runtime switches of the caption pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionSettings {
    pub listen_language: LanguageTag,
    pub subtitles_enabled: bool,
}

impl CaptionSettings {
    pub fn new(listen_language: impl Into<LanguageTag>) -> Self {
        Self {
            listen_language: listen_language.into(),
            subtitles_enabled: true,
        }
    }
}
