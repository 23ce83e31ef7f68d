//! Main Entrypoint for the Bubbly API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the curriculum and the persona prompt.
//! 3. Wiring the optional language-model collaborator into the orchestrator.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use bubbly_api::{
    config::{Config, Provider},
    router::create_router,
    sessions::SessionStore,
    state::AppState,
};
use bubbly_core::{
    Curriculum, DialogueOrchestrator, TutorConfig,
    llm_client::{DEFAULT_SYSTEM_PROMPT, OpenAICompatibleClient},
    modalities::Collaborators,
};
use std::{fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads the persona prompt from `system_prompt.md` in the prompts directory.
fn load_prompt(prompts_path: &Path) -> anyhow::Result<String> {
    let path = prompts_path.join("system_prompt.md");
    fs::read_to_string(&path).with_context(|| format!("Could not read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Curriculum and Persona ---
    let curriculum = match &config.curriculum_path {
        Some(path) => Curriculum::load(path)
            .with_context(|| format!("Failed to load curriculum from {}", path.display()))?,
        None => Curriculum::builtin().context("Built-in curriculum is invalid")?,
    };
    info!("Curriculum loaded.");

    let persona = match &config.prompts_path {
        Some(path) => load_prompt(path)?,
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    // --- 4. Initialize Collaborators ---
    let collaborators = match (&config.provider, &config.llm_base_url) {
        (Provider::None, _) | (_, None) => {
            info!("No language model configured. Replies use templates only.");
            Collaborators::none()
        }
        (provider, Some(base_url)) => {
            info!(?provider, %base_url, "Using language model for rephrasing.");
            Collaborators::none().with_language_model(Arc::new(
                OpenAICompatibleClient::for_endpoint(
                    base_url,
                    config.openai_api_key.as_deref(),
                    config.chat_model.clone(),
                ),
            ))
        }
    };

    let orchestrator = DialogueOrchestrator::new(
        Arc::new(curriculum),
        TutorConfig::default().with_model_timeout(config.model_timeout),
    )
    .with_collaborators(collaborators)
    .with_persona(persona);

    let app_state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        sessions: Arc::new(SessionStore::new()),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
