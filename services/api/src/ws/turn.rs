//! Runs one conversational turn for a WebSocket session and turns the outcome
//! into the messages pushed back to the client.

use crate::{
    models::{TurnResponse, event_json},
    sessions::SharedSession,
    state::AppState,
    ws::protocol::ServerMessage,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use bubbly_core::TurnInput;
use tracing::debug;

/// Handles one input and returns the reply, progress and audio messages in send order.
pub async fn run_turn(state: &AppState, session: &SharedSession, input: TurnInput) -> Vec<ServerMessage> {
    let outcome = {
        let mut session = session.lock().await;
        state.orchestrator.handle_turn(&mut session, input).await
    };
    debug!(intent = ?outcome.intent, events = outcome.events.len(), "Turn handled");

    let audio = outcome.audio.as_ref().map(|bytes| STANDARD.encode(bytes));
    let events: Vec<serde_json::Value> = outcome.events.iter().map(event_json).collect();
    let response = TurnResponse::from_outcome(outcome, None);

    let mut messages = vec![ServerMessage::Reply {
        text: response.reply,
        intent: response.intent,
        current_letter: response.current_letter,
        flagged: response.flagged,
        recognized: response.recognized,
    }];
    messages.extend(events.into_iter().map(|event| ServerMessage::Progress { event }));
    if let Some(data) = audio {
        messages.push(ServerMessage::AudioChunk { data });
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_star_turn_sends_reply_then_progress() {
        let state = test_state();
        let id = state
            .sessions
            .insert(state.orchestrator.new_session())
            .await;
        let session = state.sessions.get(id).await.unwrap();

        let messages = run_turn(&state, &session, TurnInput::spoken("A", 0.9)).await;

        assert_eq!(messages.len(), 3);
        match &messages[0] {
            ServerMessage::Reply {
                intent,
                current_letter,
                ..
            } => {
                assert_eq!(intent, "learn_letter");
                assert_eq!(current_letter, "A");
            }
            other => panic!("expected reply, got {:?}", other),
        }
        assert!(matches!(&messages[1], ServerMessage::Progress { event } if event["type"] == "star_awarded"));
        assert!(matches!(&messages[2], ServerMessage::Progress { event } if event["badge"] == "first_star"));
    }

    #[tokio::test]
    async fn test_plain_turn_sends_only_reply() {
        let state = test_state();
        let id = state
            .sessions
            .insert(state.orchestrator.new_session())
            .await;
        let session = state.sessions.get(id).await.unwrap();

        let messages = run_turn(&state, &session, TurnInput::text("help")).await;

        assert_eq!(messages.len(), 1);
        assert_eq!(session.lock().await.recent_turns().len(), 1);
    }
}
