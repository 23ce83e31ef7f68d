//! Progress Tracker
//!
//! Stars, streaks and badges for one session. A star is earned when a
//! pronunciation attempt clears the confidence threshold; badges unlock once
//! each at fixed milestones. Nothing here outlives the session.

use crate::config::TutorConfig;
use crate::curriculum::Letter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Milestone badges, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    FirstStar,
    FiveStreak,
    TenLetters,
    AlphabetHalf,
    AlphabetComplete,
    PerfectSpeaker,
}

impl BadgeKind {
    pub const ALL: [BadgeKind; 6] = [
        BadgeKind::FirstStar,
        BadgeKind::FiveStreak,
        BadgeKind::TenLetters,
        BadgeKind::AlphabetHalf,
        BadgeKind::AlphabetComplete,
        BadgeKind::PerfectSpeaker,
    ];

    pub fn id(self) -> &'static str {
        match self {
            BadgeKind::FirstStar => "first_star",
            BadgeKind::FiveStreak => "five_streak",
            BadgeKind::TenLetters => "ten_letters",
            BadgeKind::AlphabetHalf => "alphabet_half",
            BadgeKind::AlphabetComplete => "alphabet_complete",
            BadgeKind::PerfectSpeaker => "perfect_speaker",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BadgeKind::FirstStar => "First Steps",
            BadgeKind::FiveStreak => "On Fire!",
            BadgeKind::TenLetters => "Letter Expert",
            BadgeKind::AlphabetHalf => "Halfway Hero",
            BadgeKind::AlphabetComplete => "Alphabet Champion",
            BadgeKind::PerfectSpeaker => "Perfect Speaker",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BadgeKind::FirstStar => "Earned your first star!",
            BadgeKind::FiveStreak => "5 correct answers in a row!",
            BadgeKind::TenLetters => "Mastered 10 letters!",
            BadgeKind::AlphabetHalf => "Learned half the alphabet!",
            BadgeKind::AlphabetComplete => "Mastered the entire alphabet!",
            BadgeKind::PerfectSpeaker => "Perfect pronunciation 10 times!",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            BadgeKind::FirstStar => "🌟",
            BadgeKind::FiveStreak => "🔥",
            BadgeKind::TenLetters => "🏆",
            BadgeKind::AlphabetHalf => "🎯",
            BadgeKind::AlphabetComplete => "👑",
            BadgeKind::PerfectSpeaker => "🎤",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Star {
    pub letter: Letter,
    pub confidence: f32,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub kind: BadgeKind,
    pub earned_at: DateTime<Utc>,
}

/// A side effect of a turn that the caller may want to celebrate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    StarAwarded { letter: Letter, confidence: f32 },
    BadgeUnlocked { badge: BadgeKind },
}

/// Snapshot of progress suitable for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub stars_earned: usize,
    pub badges: Vec<BadgeKind>,
    pub current_streak: u32,
    pub best_streak: u32,
    pub mastered: Vec<Letter>,
    pub struggled: Vec<Letter>,
    pub perfect_pronunciations: u32,
    pub total_attempts: u32,
    pub recent_stars: Vec<Star>,
    pub message: String,
}

/// Session-scoped progress: stars, streaks, mastery and badges.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    star_threshold: f32,
    perfect_threshold: f32,
    stars: Vec<Star>,
    badges: Vec<Badge>,
    current_streak: u32,
    best_streak: u32,
    consecutive_misses: u32,
    mastered: BTreeSet<Letter>,
    struggled: BTreeSet<Letter>,
    perfect_pronunciations: u32,
    total_attempts: u32,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(&TutorConfig::default())
    }
}

impl ProgressTracker {
    pub fn new(config: &TutorConfig) -> Self {
        Self {
            star_threshold: config.star_threshold,
            perfect_threshold: config.perfect_threshold,
            stars: Vec::new(),
            badges: Vec::new(),
            current_streak: 0,
            best_streak: 0,
            consecutive_misses: 0,
            mastered: BTreeSet::new(),
            struggled: BTreeSet::new(),
            perfect_pronunciations: 0,
            total_attempts: 0,
        }
    }

    /// Records a pronunciation attempt.
    ///
    /// At or above the star threshold a star is appended, the streak grows and
    /// the letter counts as mastered. Below it the streak resets and the letter
    /// is recorded as struggled. A NaN confidence never earns a star.
    /// Returns the star when one was earned.
    pub fn award_star(&mut self, letter: Letter, confidence: f32) -> Option<Star> {
        if confidence.is_nan() || confidence < self.star_threshold {
            self.record_miss(letter);
            return None;
        }

        self.total_attempts += 1;
        self.current_streak += 1;
        self.best_streak = self.best_streak.max(self.current_streak);
        self.consecutive_misses = 0;
        if confidence >= self.perfect_threshold {
            self.perfect_pronunciations += 1;
        }
        self.struggled.remove(&letter);
        self.mastered.insert(letter);

        let star = Star {
            letter,
            confidence,
            earned_at: Utc::now(),
        };
        self.stars.push(star.clone());
        debug!(%letter, confidence, streak = self.current_streak, "Star awarded");
        Some(star)
    }

    /// Records an unsuccessful attempt without going through a confidence score,
    /// e.g. when the child said a confusable letter instead of the target.
    ///
    /// A mastered letter moves back to struggled.
    pub fn record_miss(&mut self, letter: Letter) {
        self.total_attempts += 1;
        self.current_streak = 0;
        self.consecutive_misses += 1;
        self.mastered.remove(&letter);
        self.struggled.insert(letter);
        debug!(%letter, misses = self.consecutive_misses, "Attempt missed");
    }

    /// Returns badges whose milestone has been crossed since the last call.
    /// Each badge is returned at most once per session.
    pub fn check_badges(&mut self) -> Vec<BadgeKind> {
        let earned: Vec<BadgeKind> = BadgeKind::ALL
            .into_iter()
            .filter(|kind| self.milestone_reached(*kind) && !self.has_badge(*kind))
            .collect();

        let now = Utc::now();
        for kind in &earned {
            self.badges.push(Badge {
                kind: *kind,
                earned_at: now,
            });
        }
        earned
    }

    fn milestone_reached(&self, kind: BadgeKind) -> bool {
        match kind {
            BadgeKind::FirstStar => !self.stars.is_empty(),
            BadgeKind::FiveStreak => self.current_streak >= 5,
            BadgeKind::TenLetters => self.mastered.len() >= 10,
            BadgeKind::AlphabetHalf => self.mastered.len() >= 13,
            BadgeKind::AlphabetComplete => self.mastered.len() >= 26,
            BadgeKind::PerfectSpeaker => self.perfect_pronunciations >= 10,
        }
    }

    pub fn has_badge(&self, kind: BadgeKind) -> bool {
        self.badges.iter().any(|b| b.kind == kind)
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Clears the miss counter once the difficulty has been lowered in response.
    pub fn reset_misses(&mut self) {
        self.consecutive_misses = 0;
    }

    pub fn mastered(&self) -> &BTreeSet<Letter> {
        &self.mastered
    }

    pub fn struggled(&self) -> &BTreeSet<Letter> {
        &self.struggled
    }

    pub fn motivational_message(&self) -> &'static str {
        let mastered = self.mastered.len();
        if self.current_streak >= 10 {
            "You're UNSTOPPABLE! Amazing streak!"
        } else if self.current_streak >= 5 {
            "You're on fire! Keep it going!"
        } else if self.current_streak >= 3 {
            "Great job! You're doing wonderfully!"
        } else if mastered >= 20 {
            "Almost there! You've learned so many letters!"
        } else if mastered >= 10 {
            "Fantastic progress! You're a quick learner!"
        } else if mastered >= 5 {
            "You're doing great! Keep learning!"
        } else {
            "Every letter is an adventure! Let's explore!"
        }
    }

    pub fn summary(&self) -> ProgressSummary {
        let recent_start = self.stars.len().saturating_sub(5);
        ProgressSummary {
            stars_earned: self.stars.len(),
            badges: self.badges.iter().map(|b| b.kind).collect(),
            current_streak: self.current_streak,
            best_streak: self.best_streak,
            mastered: self.mastered.iter().copied().collect(),
            struggled: self.struggled.iter().copied().collect(),
            perfect_pronunciations: self.perfect_pronunciations,
            total_attempts: self.total_attempts,
            recent_stars: self.stars[recent_start..].to_vec(),
            message: self.motivational_message().to_string(),
        }
    }
}
