//! Bubbly API Library Crate
//!
//! This library contains the web service around the tutor: application state,
//! the in-memory session store, REST handlers, WebSocket logic and routing.
//! The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod sessions;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{Config, Provider};
    use crate::sessions::SessionStore;
    use crate::state::AppState;
    use bubbly_core::{Curriculum, DialogueOrchestrator, TutorConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::Level;

    pub fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            curriculum_path: None,
            provider: Provider::None,
            openai_api_key: None,
            llm_base_url: None,
            chat_model: String::new(),
            model_timeout: Duration::from_secs(1),
            log_level: Level::INFO,
            prompts_path: None,
        }
    }

    pub fn test_state() -> Arc<AppState> {
        let curriculum = Arc::new(Curriculum::builtin().unwrap());
        Arc::new(AppState {
            orchestrator: Arc::new(DialogueOrchestrator::new(curriculum, TutorConfig::default())),
            sessions: Arc::new(SessionStore::new()),
            config: Arc::new(test_config()),
        })
    }
}
