//! Tutor Tuning
//!
//! Thresholds and limits that shape how a session progresses. The defaults are
//! the values the lesson flow was designed around; the service and the terminal
//! front end override only the model timeout.

use std::time::Duration;

/// Tuning knobs for the dialogue orchestrator and the progress tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorConfig {
    /// Minimum pronunciation confidence that earns a star.
    pub star_threshold: f32,
    /// Confidence at or above which an attempt counts as a perfect pronunciation.
    pub perfect_threshold: f32,
    /// Number of (utterance, reply) pairs kept in the recent-turn buffer.
    pub memory_turns: usize,
    /// Consecutive successes on the current letter before moving to the next one.
    pub advance_after: u32,
    /// Difficulty steps up each time the streak reaches a multiple of this value.
    pub difficulty_step_streak: u32,
    /// Consecutive misses that step the difficulty back down.
    pub difficulty_drop_misses: u32,
    /// Upper bound on any single call to an external model collaborator.
    pub model_timeout: Duration,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            star_threshold: 0.7,
            perfect_threshold: 0.95,
            memory_turns: 3,
            advance_after: 3,
            difficulty_step_streak: 5,
            difficulty_drop_misses: 3,
            model_timeout: Duration::from_secs(10),
        }
    }
}

impl TutorConfig {
    /// Returns a copy with a different collaborator timeout.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_lesson_flow() {
        let config = TutorConfig::default();
        assert_eq!(config.star_threshold, 0.7);
        assert_eq!(config.memory_turns, 3);
        assert_eq!(config.advance_after, 3);
        assert_eq!(config.model_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_with_model_timeout() {
        let config = TutorConfig::default().with_model_timeout(Duration::from_millis(250));
        assert_eq!(config.model_timeout, Duration::from_millis(250));
        assert_eq!(config.star_threshold, 0.7);
    }
}
