//! Optional model collaborators: speech recognition, speech synthesis and
//! letter vision.
//!
//! The tutor works with any subset of these missing. Each call is a single
//! attempt under the configured timeout; a failure or timeout is logged and
//! the caller substitutes a fixed fallback value.

use crate::llm_client::LanguageModel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// What the speech recognizer heard, with its confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
}

impl Transcript {
    /// The value used when recognition fails or times out.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// A label the vision model found in an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn none() -> Self {
        Self {
            label: String::new(),
            confidence: 0.0,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Renders the reply as encoded audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LetterVision: Send + Sync {
    /// Detects a letter or object in an image. A single-character label is a letter.
    async fn detect(&self, image: &[u8]) -> Result<Detection>;
}

/// The set of collaborators wired into an orchestrator. All optional.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub speech_to_text: Option<Arc<dyn SpeechToText>>,
    pub text_to_speech: Option<Arc<dyn TextToSpeech>>,
    pub vision: Option<Arc<dyn LetterVision>>,
    pub language_model: Option<Arc<dyn LanguageModel>>,
}

impl Collaborators {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_speech_to_text(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.speech_to_text = Some(stt);
        self
    }

    pub fn with_text_to_speech(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.text_to_speech = Some(tts);
        self
    }

    pub fn with_vision(mut self, vision: Arc<dyn LetterVision>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("speech_to_text", &self.speech_to_text.is_some())
            .field("text_to_speech", &self.text_to_speech.is_some())
            .field("vision", &self.vision.is_some())
            .field("language_model", &self.language_model.is_some())
            .finish()
    }
}

/// Runs one collaborator call under `timeout`. Returns `None` on error or
/// timeout so the caller can fall back.
pub(crate) async fn attempt<T, F>(collaborator: &'static str, timeout: Duration, call: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(collaborator, error = %e, "Collaborator call failed, using fallback.");
            None
        }
        Err(_) => {
            warn!(collaborator, ?timeout, "Collaborator call timed out, using fallback.");
            None
        }
    }
}
