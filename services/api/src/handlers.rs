//! Axum Handlers for the REST API
//!
//! Session lifecycle, conversational turns and curriculum lookup. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use bubbly_core::{Letter, TurnInput};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::{
        CreateSessionPayload, ErrorResponse, LetterView, SessionCreated, SessionView,
        SettingsPayload, TurnPayload, TurnResponse,
    },
    sessions::SharedSession,
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))
}

/// Converts a turn payload to core input. Exactly one input kind must be present.
pub(crate) fn turn_input(payload: TurnPayload) -> Result<TurnInput, ApiError> {
    match (payload.utterance, payload.audio_base64, payload.image_base64) {
        (Some(utterance), None, None) => Ok(TurnInput::Text {
            utterance,
            confidence: payload.confidence,
        }),
        (None, Some(audio), None) => Ok(TurnInput::Audio(decode(&audio, "audio_base64")?)),
        (None, None, Some(image)) => Ok(TurnInput::Image(decode(&image, "image_base64")?)),
        _ => Err(ApiError::BadRequest(
            "Provide exactly one of utterance, audio_base64 or image_base64".to_string(),
        )),
    }
}

fn decode(data: &str, field: &str) -> Result<Vec<u8>, ApiError> {
    STANDARD
        .decode(data)
        .map_err(|e| ApiError::BadRequest(format!("{} is not valid base64: {}", field, e)))
}

/// Start a new tutoring session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionPayload,
    responses(
        (status = 201, description = "Session created successfully", body = SessionCreated),
        (status = 400, description = "Bad request", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.orchestrator.new_session();

    if let Some(settings) = payload.settings {
        session.update_settings(settings.into_update().map_err(ApiError::BadRequest)?);
    }
    let name = payload
        .child_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if let Some(name) = &name {
        session.set_child_name(name.clone());
    }

    let letter = session.current_letter();
    let greeting = match &name {
        Some(name) => format!(
            "Hello, {}! I'm Bubbly, your alphabet friend! Let's start with the letter {}!",
            name, letter
        ),
        None => "Hello! I'm Bubbly, your alphabet friend! What's your name?".to_string(),
    };

    let snapshot = session.snapshot();
    let id = state.sessions.insert(session).await;

    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            greeting,
            session: SessionView::new(id, snapshot),
        }),
    ))
}

/// Get the current state of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = find_session(&state, id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok((StatusCode::OK, Json(SessionView::new(id, snapshot))))
}

/// End a session. Everything it recorded is discarded.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Session with id '{}' not found",
            id
        )))
    }
}

/// Send one utterance (or recording, or picture) and get Bubbly's reply.
#[utoipa::path(
    post,
    path = "/sessions/{id}/turns",
    request_body = TurnPayload,
    responses(
        (status = 200, description = "Bubbly's reply", body = TurnResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn take_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TurnPayload>,
) -> Result<Json<TurnResponse>, ApiError> {
    let input = turn_input(payload)?;
    let session = find_session(&state, id).await?;

    let mut session = session.lock().await;
    let outcome = state.orchestrator.handle_turn(&mut session, input).await;
    drop(session);

    info!(session_id = %id, intent = ?outcome.intent, events = outcome.events.len(), "Turn handled");
    let audio = outcome.audio.as_ref().map(|bytes| STANDARD.encode(bytes));
    Ok(Json(TurnResponse::from_outcome(outcome, audio)))
}

/// Change a session's age range or modality toggles.
#[utoipa::path(
    patch,
    path = "/sessions/{id}/settings",
    request_body = SettingsPayload,
    responses(
        (status = 200, description = "Settings updated", body = SessionView),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SettingsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let update = payload.into_update().map_err(ApiError::BadRequest)?;
    let session = find_session(&state, id).await?;

    let mut session = session.lock().await;
    session.update_settings(update);
    let snapshot = session.snapshot();

    Ok((StatusCode::OK, Json(SessionView::new(id, snapshot))))
}

/// Look up the curriculum entry for one letter.
#[utoipa::path(
    get,
    path = "/curriculum/{letter}",
    responses(
        (status = 200, description = "Curriculum entry", body = LetterView),
        (status = 400, description = "Not a letter", body = ErrorResponse)
    ),
    params(
        ("letter" = String, Path, description = "A single letter, A to Z")
    )
)]
pub async fn get_letter(
    State(state): State<Arc<AppState>>,
    Path(letter): Path<String>,
) -> Result<Json<LetterView>, ApiError> {
    let letter = Letter::parse(&letter)
        .ok_or_else(|| ApiError::BadRequest(format!("'{}' is not a letter from A to Z", letter)))?;
    Ok(Json(state.orchestrator.curriculum().entry(letter).into()))
}
