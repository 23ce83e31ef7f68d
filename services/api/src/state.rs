//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the orchestrator,
//! the live sessions and the loaded configuration.

use crate::config::Config;
use crate::sessions::SessionStore;
use bubbly_core::DialogueOrchestrator;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
}
