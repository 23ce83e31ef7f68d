//! Letter Activities
//!
//! Small games built from a letter's curriculum entry. Two of them
//! (`choose_the_sound` and `letter_matching`) offer options and are graded when
//! the child answers with one of them; the rest are open-ended prompts.

use crate::curriculum::{Curriculum, Letter, LetterEntry};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

/// The kinds of activity a curriculum entry can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    RepeatAfterMe,
    FindAnObject,
    ChooseTheSound,
    ShowTheLetter,
    LetterMatching,
    RhymeTime,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::RepeatAfterMe,
        ActivityKind::FindAnObject,
        ActivityKind::ChooseTheSound,
        ActivityKind::ShowTheLetter,
        ActivityKind::LetterMatching,
        ActivityKind::RhymeTime,
    ];

    /// The identifier used in curriculum documents.
    pub fn id(self) -> &'static str {
        match self {
            ActivityKind::RepeatAfterMe => "repeat_after_me",
            ActivityKind::FindAnObject => "find_an_object",
            ActivityKind::ChooseTheSound => "choose_the_sound",
            ActivityKind::ShowTheLetter => "show_the_letter",
            ActivityKind::LetterMatching => "letter_matching",
            ActivityKind::RhymeTime => "rhyme_time",
        }
    }

    /// Accepts identifiers with either underscores or hyphens.
    pub fn from_id(id: &str) -> Option<Self> {
        let normalized = id.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.id() == normalized)
    }
}

/// A concrete activity prepared for one letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub letter: Letter,
    pub instruction: String,
    /// Choices offered to the child; empty for open-ended activities.
    pub options: Vec<String>,
    pub answer: String,
    pub hints: Vec<String>,
}

/// Outcome of grading an answer against a pending activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityResult {
    pub correct: bool,
    pub message: String,
}

const PRAISE: [&str; 5] = [
    "Excellent! That's absolutely right!",
    "Perfect! You're doing amazing!",
    "Wonderful! You got it!",
    "Great job! That's correct!",
    "Fantastic! You're a star!",
];

impl Activity {
    /// Picks one of the entry's activities at random and builds it.
    pub fn random_for<R: Rng + ?Sized>(
        entry: &LetterEntry,
        curriculum: &Curriculum,
        rng: &mut R,
    ) -> Self {
        let kinds: Vec<ActivityKind> = entry.activities.iter().copied().collect();
        let kind = kinds
            .choose(rng)
            .copied()
            .unwrap_or(ActivityKind::RepeatAfterMe);
        Self::build(kind, entry, curriculum, rng)
    }

    pub fn build<R: Rng + ?Sized>(
        kind: ActivityKind,
        entry: &LetterEntry,
        curriculum: &Curriculum,
        rng: &mut R,
    ) -> Self {
        let letter = entry.letter;
        let word = entry.example_word();
        match kind {
            ActivityKind::RepeatAfterMe => Self {
                kind,
                letter,
                instruction: format!(
                    "Let's practice the letter {letter}! Say '{letter}', it sounds like {}. \
                     Listen carefully and repeat after me: '{letter}'... '{letter}'!",
                    entry.phonetic
                ),
                options: Vec::new(),
                answer: letter.to_string(),
                hints: vec![
                    format!("Try saying it slowly: '{letter}'"),
                    format!("Think of the word '{word}'"),
                ],
            },
            ActivityKind::FindAnObject => {
                let examples: Vec<&str> = entry.example_words.iter().take(3).map(String::as_str).collect();
                Self {
                    kind,
                    letter,
                    instruction: format!(
                        "Object hunt time! Find something that starts with '{letter}'! \
                         Can you find: {}? Look around you or show me a picture!",
                        examples.join(", ")
                    ),
                    options: Vec::new(),
                    answer: word.to_string(),
                    hints: vec![
                        format!("Look for something like a {}", word.to_lowercase()),
                        format!("It starts with the '{letter}' sound"),
                    ],
                }
            }
            ActivityKind::ChooseTheSound => {
                let mut options = vec![letter.to_string()];
                options.extend(
                    entry
                        .confusable_letters
                        .iter()
                        .take(2)
                        .map(|l| l.to_string()),
                );
                let mut others: Vec<Letter> = Letter::all()
                    .filter(|l| *l != letter && !entry.is_confusable_with(*l))
                    .collect();
                others.shuffle(rng);
                options.extend(others.into_iter().take(4 - options.len()).map(|l| l.to_string()));
                options.shuffle(rng);

                let contrast = entry
                    .confusable_letters
                    .iter()
                    .next()
                    .map(|l| format!("'{}'", l))
                    .unwrap_or_else(|| "other letters".to_string());
                Self {
                    kind,
                    letter,
                    instruction: format!(
                        "Listen carefully! Which one sounds like '{letter}'? Options: {}",
                        options.join(", ")
                    ),
                    options,
                    answer: letter.to_string(),
                    hints: vec![
                        format!("The '{letter}' sound is different from {contrast}"),
                        format!("Listen for {}", entry.phonetic),
                        format!("Think of the word '{word}'"),
                    ],
                }
            }
            ActivityKind::ShowTheLetter => Self {
                kind,
                letter,
                instruction: format!(
                    "Can you show me the letter '{letter}'? Draw it in the air, write it on paper, \
                     or find it in a book!"
                ),
                options: Vec::new(),
                answer: letter.to_string(),
                hints: vec![
                    format!("The letter looks like this: {letter} and {}", letter.as_char().to_ascii_lowercase()),
                    format!("It's letter number {} in the alphabet", letter.index() + 1),
                    format!("You can see it at the start of '{word}'"),
                ],
            },
            ActivityKind::LetterMatching => {
                let mut distractors: Vec<String> = curriculum
                    .entries()
                    .filter(|other| other.letter != letter)
                    .map(|other| other.example_word().to_string())
                    .collect();
                distractors.shuffle(rng);
                let mut options = vec![word.to_string()];
                options.extend(distractors.into_iter().take(3));
                options.shuffle(rng);
                Self {
                    kind,
                    letter,
                    instruction: format!(
                        "Which word starts with '{letter}'? Options: {}",
                        options.join(", ")
                    ),
                    options,
                    answer: word.to_string(),
                    hints: vec![
                        "Say each word slowly and listen to the first sound".to_string(),
                        format!("The '{letter}' sound is {}", entry.phonetic),
                    ],
                }
            }
            ActivityKind::RhymeTime => {
                let rhyme = entry.rhyme.clone().unwrap_or_else(|| {
                    format!("{letter} is special, {letter} is fun, let's practice {letter} everyone!")
                });
                Self {
                    kind,
                    letter,
                    instruction: format!(
                        "Rhyme time! Let's sing about '{letter}'! {rhyme} Can you say it with me?"
                    ),
                    options: Vec::new(),
                    answer: letter.to_string(),
                    hints: vec![
                        "Listen to the rhythm!".to_string(),
                        "Clap along with the rhyme!".to_string(),
                    ],
                }
            }
        }
    }

    /// Whether the utterance is an answer to this activity.
    pub fn accepts(&self, utterance: &str) -> bool {
        let answer = normalize(utterance);
        !answer.is_empty() && self.options.iter().any(|option| normalize(option) == answer)
    }

    pub fn check_answer<R: Rng + ?Sized>(&self, utterance: &str, rng: &mut R) -> ActivityResult {
        if normalize(utterance) == normalize(&self.answer) {
            let praise = PRAISE.choose(rng).copied().unwrap_or(PRAISE[0]);
            ActivityResult {
                correct: true,
                message: praise.to_string(),
            }
        } else {
            ActivityResult {
                correct: false,
                message: format!("Not quite! Let's try again. {}", self.hint(rng)),
            }
        }
    }

    pub fn hint<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.hints
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "Keep trying! You can do it!".to_string())
    }
}

fn normalize(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase()
}
