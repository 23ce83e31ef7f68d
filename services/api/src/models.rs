//! API Models
//!
//! Request and response bodies for the REST API, documented for OpenAPI with
//! `utoipa`. Core types are flattened into plain strings here so the schema
//! stays readable; nested progress data is passed through as JSON objects.

use bubbly_core::curriculum::LetterEntry;
use bubbly_core::dialogue::TurnOutcome;
use bubbly_core::progress::{ProgressEvent, ProgressSummary};
use bubbly_core::session::{AgeRange, SessionSettings, SessionSnapshot, SettingsUpdate, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default)]
pub struct SettingsPayload {
    /// Either "3-5" or "6-8".
    #[schema(example = "3-5")]
    pub age_range: Option<String>,
    pub vision_enabled: Option<bool>,
    pub tts_enabled: Option<bool>,
    pub asr_enabled: Option<bool>,
}

impl SettingsPayload {
    /// Converts to a core settings update, rejecting unknown age ranges.
    pub fn into_update(self) -> Result<SettingsUpdate, String> {
        let age_range = match self.age_range.as_deref() {
            None => None,
            Some(label) => Some(
                [AgeRange::Younger, AgeRange::Older]
                    .into_iter()
                    .find(|range| range.label() == label.trim())
                    .ok_or_else(|| format!("Unknown age range '{}', expected 3-5 or 6-8", label))?,
            ),
        };
        Ok(SettingsUpdate {
            age_range,
            vision_enabled: self.vision_enabled,
            tts_enabled: self.tts_enabled,
            asr_enabled: self.asr_enabled,
        })
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default)]
pub struct CreateSessionPayload {
    #[schema(example = "Mia")]
    pub child_name: Option<String>,
    pub settings: Option<SettingsPayload>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SettingsView {
    #[schema(example = "3-5")]
    pub age_range: String,
    pub vision_enabled: bool,
    pub tts_enabled: bool,
    pub asr_enabled: bool,
}

impl From<SessionSettings> for SettingsView {
    fn from(settings: SessionSettings) -> Self {
        Self {
            age_range: settings.age_range.label().to_string(),
            vision_enabled: settings.vision_enabled,
            tts_enabled: settings.tts_enabled,
            asr_enabled: settings.asr_enabled,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ExchangeView {
    pub child: String,
    pub bubbly: String,
    #[schema(example = "learn_letter")]
    pub intent: String,
    pub at: DateTime<Utc>,
}

impl From<Turn> for ExchangeView {
    fn from(turn: Turn) -> Self {
        Self {
            child: turn.user,
            bubbly: turn.assistant,
            intent: as_label(&turn.intent),
            at: turn.at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub child_name: Option<String>,
    #[schema(example = "B")]
    pub current_letter: String,
    #[schema(example = "easy")]
    pub difficulty: String,
    pub streak: u32,
    pub mastered: Vec<String>,
    pub struggled: Vec<String>,
    pub settings: SettingsView,
    pub recent_turns: Vec<ExchangeView>,
    /// The activity waiting for an answer, if any.
    #[schema(value_type = Option<Object>)]
    pub pending_activity: Option<serde_json::Value>,
    pub total_interactions: u32,
    pub started_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub progress: serde_json::Value,
}

impl SessionView {
    pub fn new(id: Uuid, snapshot: SessionSnapshot) -> Self {
        Self {
            id,
            child_name: snapshot.child_name,
            current_letter: snapshot.current_letter.to_string(),
            difficulty: as_label(&snapshot.difficulty),
            streak: snapshot.streak,
            mastered: snapshot.mastered.iter().map(|l| l.to_string()).collect(),
            struggled: snapshot.struggled.iter().map(|l| l.to_string()).collect(),
            settings: snapshot.settings.into(),
            recent_turns: snapshot.recent_turns.into_iter().map(Into::into).collect(),
            pending_activity: snapshot
                .pending_activity
                .and_then(|activity| serde_json::to_value(activity).ok()),
            total_interactions: snapshot.total_interactions,
            started_at: snapshot.started_at,
            progress: progress_json(&snapshot.progress),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct SessionCreated {
    pub greeting: String,
    pub session: SessionView,
}

/// One turn. Exactly one of `utterance`, `audio_base64` or `image_base64` must be set.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default)]
pub struct TurnPayload {
    #[schema(example = "Teach me B")]
    pub utterance: Option<String>,
    /// Pronunciation confidence in [0, 1] for a spoken utterance.
    #[schema(example = 0.85)]
    pub confidence: Option<f32>,
    pub audio_base64: Option<String>,
    pub image_base64: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct TurnResponse {
    pub reply: String,
    #[schema(example = "learn_letter")]
    pub intent: String,
    #[schema(example = "B")]
    pub current_letter: String,
    /// Stars and badges earned this turn.
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<serde_json::Value>,
    /// Safety category when the turn was redirected.
    pub flagged: Option<String>,
    /// What speech or vision recognized from a non-text input.
    pub recognized: Option<String>,
    /// Synthesized speech for the reply, base64 encoded.
    pub audio_base64: Option<String>,
}

impl TurnResponse {
    pub fn from_outcome(outcome: TurnOutcome, audio_base64: Option<String>) -> Self {
        Self {
            reply: outcome.reply,
            intent: as_label(&outcome.intent),
            current_letter: outcome.current_letter.to_string(),
            events: outcome.events.iter().map(event_json).collect(),
            flagged: outcome.flagged.map(|category| as_label(&category)),
            recognized: outcome.recognized,
            audio_base64,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct LetterView {
    #[schema(example = "B")]
    pub letter: String,
    pub phonetic: String,
    pub example_words: Vec<String>,
    pub confusable_letters: Vec<String>,
    pub activities: Vec<String>,
    pub rhyme: Option<String>,
}

impl From<&LetterEntry> for LetterView {
    fn from(entry: &LetterEntry) -> Self {
        Self {
            letter: entry.letter.to_string(),
            phonetic: entry.phonetic.clone(),
            example_words: entry.example_words.clone(),
            confusable_letters: entry
                .confusable_letters
                .iter()
                .map(|l| l.to_string())
                .collect(),
            activities: entry
                .activities
                .iter()
                .map(|kind| kind.id().to_string())
                .collect(),
            rhyme: entry.rhyme.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

/// The serde name of a unit enum variant, e.g. `Intent::LearnLetter` -> "learn_letter".
fn as_label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(label)) => label,
        _ => String::new(),
    }
}

pub(crate) fn event_json(event: &ProgressEvent) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
}

pub(crate) fn progress_json(summary: &ProgressSummary) -> serde_json::Value {
    serde_json::to_value(summary).unwrap_or(serde_json::Value::Null)
}
