//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        CreateSessionPayload, ErrorResponse, ExchangeView, LetterView, SessionCreated,
        SessionView, SettingsPayload, SettingsView, TurnPayload, TurnResponse,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, patch, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::get_session,
        handlers::delete_session,
        handlers::take_turn,
        handlers::update_settings,
        handlers::get_letter,
    ),
    components(
        schemas(
            CreateSessionPayload, SessionCreated, SessionView, SettingsPayload, SettingsView,
            ExchangeView, TurnPayload, TurnResponse, LetterView, ErrorResponse
        )
    ),
    tags(
        (name = "Bubbly API", description = "Sessions and conversation turns for the Bubbly alphabet tutor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/turns", post(handlers::take_turn))
        .route("/sessions/{id}/settings", patch(handlers::update_settings))
        .route("/curriculum/{letter}", get(handlers::get_letter))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/sessions",
            "/sessions/{id}",
            "/sessions/{id}/turns",
            "/sessions/{id}/settings",
            "/curriculum/{letter}",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}
