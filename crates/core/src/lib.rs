//! Bubbly Core
//!
//! The alphabet tutor behind every Bubbly front end. A [`dialogue::DialogueOrchestrator`]
//! takes one child utterance at a time, classifies it, screens it, updates the
//! session's [`session::SessionState`] and answers in character. Progress
//! (stars, streaks, badges) lives in the session and is never written anywhere.

pub mod activities;
pub mod config;
pub mod curriculum;
pub mod dialogue;
pub mod intent;
pub mod llm_client;
pub mod modalities;
pub mod progress;
pub mod safety;
pub mod session;

pub use config::TutorConfig;
pub use curriculum::{Curriculum, CurriculumError, Letter};
pub use dialogue::{DialogueOrchestrator, TurnInput, TurnOutcome, TurnStage};
pub use session::SessionState;
