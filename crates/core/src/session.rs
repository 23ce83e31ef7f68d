//! Session State
//!
//! Everything Bubbly remembers about one conversation: a short rolling window
//! of recent turns, what it has learned about the child, where the lesson is,
//! and the progress record. Session state is memory-only and is dropped when
//! the conversation ends.

use crate::activities::Activity;
use crate::config::TutorConfig;
use crate::curriculum::Letter;
use crate::dialogue::TurnStage;
use crate::intent::Intent;
use crate::progress::{ProgressSummary, ProgressTracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt::Write;

const EASY_LETTERS: &[char] = &['A', 'E', 'I', 'O', 'U'];
const MEDIUM_LETTERS: &[char] = &[
    'B', 'C', 'D', 'F', 'G', 'H', 'L', 'M', 'N', 'P', 'R', 'S', 'T',
];
const HARD_LETTERS: &[char] = &['J', 'K', 'Q', 'V', 'W', 'X', 'Y', 'Z'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn step_up(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Hard => Difficulty::Hard,
        }
    }

    pub fn step_down(self) -> Self {
        match self {
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Easy => Difficulty::Easy,
        }
    }

    /// Letters practised at this level, vowels first.
    pub fn letter_pool(self) -> impl Iterator<Item = Letter> {
        let pool = match self {
            Difficulty::Easy => EASY_LETTERS,
            Difficulty::Medium => MEDIUM_LETTERS,
            Difficulty::Hard => HARD_LETTERS,
        };
        pool.iter().filter_map(|c| Letter::new(*c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeRange {
    #[serde(rename = "3-5")]
    Younger,
    #[serde(rename = "6-8")]
    Older,
}

impl AgeRange {
    pub fn label(self) -> &'static str {
        match self {
            AgeRange::Younger => "3-5",
            AgeRange::Older => "6-8",
        }
    }
}

/// Per-session toggles set by a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub age_range: AgeRange,
    pub vision_enabled: bool,
    pub tts_enabled: bool,
    pub asr_enabled: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            age_range: AgeRange::Younger,
            vision_enabled: false,
            tts_enabled: true,
            asr_enabled: true,
        }
    }
}

/// A partial settings change; `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsUpdate {
    pub age_range: Option<AgeRange>,
    pub vision_enabled: Option<bool>,
    pub tts_enabled: Option<bool>,
    pub asr_enabled: Option<bool>,
}

/// One exchange between the child and Bubbly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub intent: Intent,
    pub at: DateTime<Utc>,
}

/// Fixed-size FIFO window of the most recent turns.
#[derive(Debug, Clone)]
pub struct RecentTurns {
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl RecentTurns {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a turn, evicting the oldest one when the window is full.
    pub fn push(&mut self, turn: Turn) {
        if self.capacity == 0 {
            return;
        }
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }
}

/// Serializable view of a session for callers outside the crate.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub child_name: Option<String>,
    pub current_letter: Letter,
    pub difficulty: Difficulty,
    pub streak: u32,
    pub mastered: Vec<Letter>,
    pub struggled: Vec<Letter>,
    pub settings: SessionSettings,
    pub recent_turns: Vec<Turn>,
    pub pending_activity: Option<Activity>,
    pub stage: TurnStage,
    pub total_interactions: u32,
    pub started_at: DateTime<Utc>,
    pub progress: ProgressSummary,
}

/// Mutable state of one conversation, owned by whoever drives its turns.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) recent: RecentTurns,
    pub(crate) child_name: Option<String>,
    pub(crate) current_letter: Letter,
    pub(crate) difficulty: Difficulty,
    pub(crate) progress: ProgressTracker,
    pub(crate) settings: SessionSettings,
    pub(crate) activity: Option<Activity>,
    pub(crate) stage: TurnStage,
    current_letter_successes: u32,
    total_interactions: u32,
    started_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(&TutorConfig::default())
    }
}

impl SessionState {
    pub fn new(config: &TutorConfig) -> Self {
        Self {
            recent: RecentTurns::new(config.memory_turns),
            child_name: None,
            current_letter: Letter::A,
            difficulty: Difficulty::Easy,
            progress: ProgressTracker::new(config),
            settings: SessionSettings::default(),
            activity: None,
            stage: TurnStage::AwaitInput,
            current_letter_successes: 0,
            total_interactions: 0,
            started_at: Utc::now(),
        }
    }

    pub fn with_settings(config: &TutorConfig, settings: SessionSettings) -> Self {
        Self {
            settings,
            ..Self::new(config)
        }
    }

    pub fn child_name(&self) -> Option<&str> {
        self.child_name.as_deref()
    }

    /// Sets the child's name; only called when the child states it.
    pub fn set_child_name(&mut self, name: impl Into<String>) {
        self.child_name = Some(name.into());
    }

    pub fn current_letter(&self) -> Letter {
        self.current_letter
    }

    pub fn set_current_letter(&mut self, letter: Letter) {
        if letter != self.current_letter {
            self.current_letter = letter;
            self.current_letter_successes = 0;
        }
    }

    /// Moves to the next letter of the alphabet and returns it.
    pub fn advance_letter(&mut self) -> Letter {
        let next = self.current_letter.next();
        self.set_current_letter(next);
        next
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn streak(&self) -> u32 {
        self.progress.current_streak()
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut ProgressTracker {
        &mut self.progress
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn update_settings(&mut self, update: SettingsUpdate) {
        if let Some(age_range) = update.age_range {
            self.settings.age_range = age_range;
        }
        if let Some(enabled) = update.vision_enabled {
            self.settings.vision_enabled = enabled;
        }
        if let Some(enabled) = update.tts_enabled {
            self.settings.tts_enabled = enabled;
        }
        if let Some(enabled) = update.asr_enabled {
            self.settings.asr_enabled = enabled;
        }
    }

    pub fn recent_turns(&self) -> &RecentTurns {
        &self.recent
    }

    pub fn pending_activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }

    pub fn stage(&self) -> TurnStage {
        self.stage
    }

    pub fn total_interactions(&self) -> u32 {
        self.total_interactions
    }

    pub(crate) fn record_turn(&mut self, user: String, assistant: String, intent: Intent) {
        self.recent.push(Turn {
            user,
            assistant,
            intent,
            at: Utc::now(),
        });
        self.total_interactions += 1;
    }

    /// Counts a success on the current letter; returns the running count.
    pub(crate) fn note_success_on_current(&mut self) -> u32 {
        self.current_letter_successes += 1;
        self.current_letter_successes
    }

    /// Adjusts difficulty after an attempt and returns the new level if it changed.
    pub(crate) fn adjust_difficulty(&mut self, config: &TutorConfig) -> Option<Difficulty> {
        let before = self.difficulty;
        let streak = self.progress.current_streak();
        if streak > 0 && config.difficulty_step_streak > 0 && streak % config.difficulty_step_streak == 0 {
            self.difficulty = self.difficulty.step_up();
        } else if self.progress.consecutive_misses() >= config.difficulty_drop_misses {
            self.difficulty = self.difficulty.step_down();
            self.progress.reset_misses();
        }
        (self.difficulty != before).then_some(self.difficulty)
    }

    /// Suggests what to practise next at the current difficulty.
    ///
    /// Struggled letters in the pool come first, mastered letters are skipped,
    /// and an exhausted pool hands over to the next level's first letter.
    pub fn suggest_next_letter(&self) -> Letter {
        let mastered = self.progress.mastered();
        let struggled = self.progress.struggled();
        let available: Vec<Letter> = self
            .difficulty
            .letter_pool()
            .filter(|l| !mastered.contains(l))
            .collect();

        if let Some(letter) = available.iter().find(|l| struggled.contains(l)) {
            return *letter;
        }
        if let Some(letter) = available.first() {
            return *letter;
        }
        match self.difficulty {
            Difficulty::Easy => Difficulty::Medium.letter_pool().next(),
            Difficulty::Medium => Difficulty::Hard.letter_pool().next(),
            Difficulty::Hard => None,
        }
        .unwrap_or(Letter::A)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            child_name: self.child_name.clone(),
            current_letter: self.current_letter,
            difficulty: self.difficulty,
            streak: self.streak(),
            mastered: self.progress.mastered().iter().copied().collect(),
            struggled: self.progress.struggled().iter().copied().collect(),
            settings: self.settings,
            recent_turns: self.recent.iter().cloned().collect(),
            pending_activity: self.activity.clone(),
            stage: self.stage,
            total_interactions: self.total_interactions,
            started_at: self.started_at,
            progress: self.progress.summary(),
        }
    }

    /// Plain-text summary of recent conversation and derived state.
    pub fn memory_report(&self) -> String {
        let mut report = String::from("=== Recent Conversation ===\n");
        let exchanges: Vec<String> = self
            .recent
            .iter()
            .map(|t| format!("Child: {}\nBubbly: {}", t.user, t.assistant))
            .collect();
        report.push_str(&exchanges.join("\n---\n"));

        report.push_str("\n\n=== Derived State ===\n");
        let _ = writeln!(report, "Name: {}", self.child_name().unwrap_or("Unknown"));
        let _ = writeln!(report, "Current Letter: {}", self.current_letter);
        let _ = writeln!(report, "Difficulty: {:?}", self.difficulty);
        let _ = writeln!(report, "Streak: {} correct", self.streak());
        let _ = writeln!(report, "Age Range: {}", self.settings.age_range.label());
        if !self.progress.mastered().is_empty() {
            let _ = writeln!(report, "Mastered: {}", letter_list(self.progress.mastered()));
        }
        if !self.progress.struggled().is_empty() {
            let _ = writeln!(report, "Needs Practice: {}", letter_list(self.progress.struggled()));
        }
        report
    }
}

fn letter_list(letters: &BTreeSet<Letter>) -> String {
    letters
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: char) -> Letter {
        Letter::new(c).unwrap()
    }

    fn turn(n: usize) -> (String, String) {
        (format!("utterance {}", n), format!("reply {}", n))
    }

    #[test]
    fn test_recent_turns_evict_oldest_first() {
        let mut session = SessionState::default();
        for n in 1..=4 {
            let (user, assistant) = turn(n);
            session.record_turn(user, assistant, Intent::Unknown);
        }

        let users: Vec<&str> = session.recent_turns().iter().map(|t| t.user.as_str()).collect();
        assert_eq!(users, vec!["utterance 2", "utterance 3", "utterance 4"]);
        assert_eq!(session.total_interactions(), 4);
    }

    #[test]
    fn test_recent_turns_never_exceed_capacity() {
        let mut turns = RecentTurns::new(3);
        for n in 0..50 {
            let (user, assistant) = turn(n);
            turns.push(Turn {
                user,
                assistant,
                intent: Intent::Help,
                at: Utc::now(),
            });
            assert!(turns.len() <= 3);
        }
        assert_eq!(turns.last().unwrap().user, "utterance 49");
    }

    #[test]
    fn test_defaults() {
        let session = SessionState::default();
        assert_eq!(session.current_letter(), Letter::A);
        assert_eq!(session.difficulty(), Difficulty::Easy);
        assert_eq!(session.streak(), 0);
        assert_eq!(session.child_name(), None);
        assert_eq!(session.stage(), TurnStage::AwaitInput);
    }

    #[test]
    fn test_advance_letter_follows_alphabet() {
        let mut session = SessionState::default();
        session.set_current_letter(letter('C'));
        assert_eq!(session.advance_letter(), letter('D'));
        assert_eq!(session.current_letter(), letter('D'));
    }

    #[test]
    fn test_changing_letter_resets_success_count() {
        let mut session = SessionState::default();
        session.note_success_on_current();
        assert_eq!(session.note_success_on_current(), 2);
        session.set_current_letter(letter('B'));
        assert_eq!(session.note_success_on_current(), 1);
    }

    #[test]
    fn test_difficulty_steps_up_on_streak_multiple() {
        let config = TutorConfig::default();
        let mut session = SessionState::new(&config);
        for l in ['A', 'E', 'I', 'O'] {
            session.progress.award_star(letter(l), 0.9);
            assert_eq!(session.adjust_difficulty(&config), None);
        }
        session.progress.award_star(letter('U'), 0.9);
        assert_eq!(session.adjust_difficulty(&config), Some(Difficulty::Medium));
    }

    #[test]
    fn test_difficulty_steps_down_after_misses() {
        let config = TutorConfig::default();
        let mut session = SessionState::new(&config);
        session.difficulty = Difficulty::Hard;
        for l in ['J', 'K', 'Q'] {
            session.progress.record_miss(letter(l));
        }
        assert_eq!(session.adjust_difficulty(&config), Some(Difficulty::Medium));
        assert_eq!(session.progress.consecutive_misses(), 0);
    }

    #[test]
    fn test_suggest_prefers_struggled_then_unmastered() {
        let mut session = SessionState::default();
        assert_eq!(session.suggest_next_letter(), letter('A'));

        session.progress.award_star(letter('A'), 0.9);
        assert_eq!(session.suggest_next_letter(), letter('E'));

        session.progress.record_miss(letter('O'));
        assert_eq!(session.suggest_next_letter(), letter('O'));
    }

    #[test]
    fn test_suggest_moves_to_next_pool_when_exhausted() {
        let mut session = SessionState::default();
        for l in ['A', 'E', 'I', 'O', 'U'] {
            session.progress.award_star(letter(l), 0.9);
        }
        assert_eq!(session.suggest_next_letter(), letter('B'));
    }

    #[test]
    fn test_update_settings_is_partial() {
        let mut session = SessionState::default();
        session.update_settings(SettingsUpdate {
            age_range: Some(AgeRange::Older),
            vision_enabled: Some(true),
            ..Default::default()
        });
        let settings = session.settings();
        assert_eq!(settings.age_range, AgeRange::Older);
        assert!(settings.vision_enabled);
        assert!(settings.tts_enabled);
    }

    #[test]
    fn test_age_range_serializes_as_label() {
        assert_eq!(serde_json::to_string(&AgeRange::Older).unwrap(), "\"6-8\"");
        let parsed: AgeRange = serde_json::from_str("\"3-5\"").unwrap();
        assert_eq!(parsed, AgeRange::Younger);
    }

    #[test]
    fn test_memory_report_mentions_state() {
        let mut session = SessionState::default();
        session.set_child_name("Mia");
        session.record_turn("hi".into(), "hello Mia".into(), Intent::Introduction);
        let report = session.memory_report();
        assert!(report.contains("Child: hi"));
        assert!(report.contains("Name: Mia"));
        assert!(report.contains("Current Letter: A"));
    }
}
