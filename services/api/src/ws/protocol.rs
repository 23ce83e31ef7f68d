//! Defines the WebSocket message protocol between the browser client and the API server.

use crate::models::{SessionView, SettingsPayload, SettingsView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Starts a new session or resumes one created over REST. This must be the first message.
    #[serde(rename = "init")]
    Init {
        child_name: Option<String>,
        session_id: Option<Uuid>,
        settings: Option<SettingsPayload>,
    },
    /// A text utterance, optionally with a pronunciation confidence.
    #[serde(rename = "user_message")]
    UserMessage {
        text: String,
        confidence: Option<f32>,
    },
    /// Recorded speech, base64 encoded. Raw binary frames are accepted too.
    #[serde(rename = "audio")]
    Audio { data: String },
    /// A picture, base64 encoded.
    #[serde(rename = "image")]
    Image { data: String },
    #[serde(rename = "update_settings")]
    UpdateSettings { settings: SettingsPayload },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization and provides the initial state.
    Initialized {
        session_id: Uuid,
        greeting: String,
        session: SessionView,
    },
    /// Bubbly's answer to one turn.
    Reply {
        text: String,
        intent: String,
        current_letter: String,
        flagged: Option<String>,
        recognized: Option<String>,
    },
    /// A star or badge earned during the last turn.
    Progress { event: serde_json::Value },
    /// Synthesized speech for the last reply, base64 encoded.
    AudioChunk { data: String },
    SettingsUpdated { settings: SettingsView },
    /// Reports an error to the client.
    Error { message: String },
}
