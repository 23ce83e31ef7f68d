//! Manages the WebSocket connection lifecycle for a tutoring session.

use super::{
    protocol::{ClientMessage, ServerMessage},
    turn::run_turn,
};
use crate::{
    models::{SessionView, SettingsView},
    sessions::SharedSession,
    state::AppState,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use bubbly_core::TurnInput;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Performs the `init` handshake, then runs the session loop until the client
/// leaves. The session is discarded when the connection closes.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let temp_id: u32 = rand::random();
    tracing::Span::current().record("session_id", temp_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (mut socket_tx, mut socket_rx) = socket.split();

    // The first message from the client must be an `init` message.
    let initialized = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => initialize_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        Some(Err(e)) => Err(anyhow!(e).context("Failed to read init message")),
        None => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let (session_id, session, greeting) = match initialized {
        Ok(initialized) => initialized,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };
    tracing::Span::current().record("session_id", session_id.to_string());

    let snapshot = session.lock().await.snapshot();
    if send_msg(
        &mut socket_tx,
        ServerMessage::Initialized {
            session_id,
            greeting,
            session: SessionView::new(session_id, snapshot),
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        state.sessions.remove(session_id).await;
        return;
    }

    let session_span = tracing::info_span!("tutor_session", %session_id);
    let result = run_session(&state, &session, socket_tx, socket_rx)
        .instrument(session_span)
        .await;
    if let Err(e) = result {
        error!(error = ?e, "Tutor session terminated with error.");
    }

    state.sessions.remove(session_id).await;
    info!("WebSocket connection closed and session discarded.");
}

/// Parses the `init` message and either resumes or creates the session.
async fn initialize_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(Uuid, SharedSession, String)> {
    let init_msg: ClientMessage = serde_json::from_str(init_text)?;
    let ClientMessage::Init {
        child_name,
        session_id,
        settings,
    } = init_msg
    else {
        return Err(anyhow!("First message must be `init`"));
    };

    let update = settings
        .map(|s| s.into_update().map_err(|e| anyhow!(e)))
        .transpose()?;

    if let Some(id) = session_id {
        let session = state
            .sessions
            .get(id)
            .await
            .context("Session not found")?;
        {
            let mut session = session.lock().await;
            if let Some(update) = update {
                session.update_settings(update);
            }
            if let Some(name) = child_name.filter(|n| !n.trim().is_empty()) {
                session.set_child_name(name.trim());
            }
        }
        info!(session_id = %id, "Resuming existing session");
        let greeting = match session.lock().await.child_name() {
            Some(name) => format!("Welcome back, {}! Let's keep learning!", name),
            None => "Welcome back! Let's keep learning!".to_string(),
        };
        return Ok((id, session, greeting));
    }

    let mut fresh = state.orchestrator.new_session();
    if let Some(update) = update {
        fresh.update_settings(update);
    }
    let greeting = match child_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            fresh.set_child_name(name);
            format!(
                "Hello, {}! I'm Bubbly, your alphabet friend! Let's start with the letter {}!",
                name,
                fresh.current_letter()
            )
        }
        None => "Hello! I'm Bubbly, your alphabet friend! What's your name?".to_string(),
    };
    let id = state.sessions.insert(fresh).await;
    let session = state
        .sessions
        .get(id)
        .await
        .context("Session vanished right after creation")?;
    Ok((id, session, greeting))
}

/// The main event loop for an active WebSocket session.
async fn run_session(
    state: &AppState,
    session: &SharedSession,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    while let Some(msg_result) = socket_rx.next().await {
        let ws_msg = match msg_result {
            Ok(ws_msg) => ws_msg,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };

        let input = match ws_msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::UserMessage { text, confidence }) => Some(TurnInput::Text {
                    utterance: text,
                    confidence,
                }),
                Ok(ClientMessage::Audio { data }) => decode_or_report(&mut socket_tx, &data)
                    .await?
                    .map(TurnInput::Audio),
                Ok(ClientMessage::Image { data }) => decode_or_report(&mut socket_tx, &data)
                    .await?
                    .map(TurnInput::Image),
                Ok(ClientMessage::UpdateSettings { settings }) => {
                    match settings.into_update() {
                        Ok(update) => {
                            let mut session = session.lock().await;
                            session.update_settings(update);
                            let settings = SettingsView::from(session.settings());
                            drop(session);
                            send_msg(&mut socket_tx, ServerMessage::SettingsUpdated { settings })
                                .await?;
                        }
                        Err(message) => {
                            send_msg(&mut socket_tx, ServerMessage::Error { message }).await?
                        }
                    }
                    None
                }
                Ok(ClientMessage::Init { .. }) => {
                    warn!("Ignoring repeated init message.");
                    None
                }
                Err(e) => {
                    warn!("Ignoring malformed message: {}", e);
                    send_msg(
                        &mut socket_tx,
                        ServerMessage::Error {
                            message: format!("Malformed message: {}", e),
                        },
                    )
                    .await?;
                    None
                }
            },
            Message::Binary(data) => Some(TurnInput::Audio(data.to_vec())),
            Message::Close(_) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => None,
        };

        if let Some(input) = input {
            for msg in run_turn(state, session, input).await {
                send_msg(&mut socket_tx, msg).await?;
            }
        }
    }
    Ok(())
}

async fn decode_or_report(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    data: &str,
) -> Result<Option<Vec<u8>>> {
    match STANDARD.decode(data) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) => {
            send_msg(
                socket_tx,
                ServerMessage::Error {
                    message: format!("Payload is not valid base64: {}", e),
                },
            )
            .await?;
            Ok(None)
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
