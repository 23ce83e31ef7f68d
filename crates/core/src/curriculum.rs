//! Curriculum Store
//!
//! This module holds the static alphabet curriculum: for every letter A–Z a
//! phonetic description, example words, the letters it is commonly confused
//! with, and the activities that can be played with it. The curriculum is
//! loaded once at startup, validated eagerly, and shared read-only afterwards.

use crate::activities::ActivityKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// The curriculum that ships with the crate.
const BUILTIN_CURRICULUM: &str = include_str!("../data/curriculum.json");

/// A single uppercase letter of the English alphabet.
///
/// Holding a `Letter` guarantees the value is a valid key into a [`Curriculum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct Letter(char);

impl Letter {
    pub const A: Letter = Letter('A');
    pub const Z: Letter = Letter('Z');

    /// Accepts `a`–`z` or `A`–`Z`; anything else yields `None`.
    pub fn new(c: char) -> Option<Self> {
        c.is_ascii_alphabetic().then(|| Self(c.to_ascii_uppercase()))
    }

    /// Parses a string holding exactly one letter, ignoring surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Zero-based position in the alphabet.
    pub fn index(self) -> usize {
        (self.0 as u8 - b'A') as usize
    }

    /// The following letter, wrapping from Z back to A.
    pub fn next(self) -> Self {
        Self((b'A' + ((self.index() as u8 + 1) % 26)) as char)
    }

    pub fn is_vowel(self) -> bool {
        matches!(self.0, 'A' | 'E' | 'I' | 'O' | 'U')
    }

    /// Iterates A through Z.
    pub fn all() -> impl Iterator<Item = Letter> {
        (b'A'..=b'Z').map(|b| Letter(b as char))
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<char> for Letter {
    type Error = String;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Letter::new(c).ok_or_else(|| format!("'{}' is not a letter", c))
    }
}

impl From<Letter> for char {
    fn from(letter: Letter) -> Self {
        letter.0
    }
}

/// Errors raised while loading a curriculum. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    #[error("Failed to read curriculum file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Curriculum is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Curriculum has no entry for letter {0}")]
    MissingLetter(Letter),
    #[error("Curriculum lists letter {0} more than once")]
    DuplicateLetter(Letter),
    #[error("Curriculum key '{0}' is not a single letter A-Z")]
    InvalidKey(String),
    #[error("Letter {0} has an empty phonetic description")]
    EmptyPhonetic(Letter),
    #[error("Letter {0} has no example words")]
    NoExampleWords(Letter),
    #[error("Letter {letter} lists '{value}' as a confusable letter")]
    InvalidConfusable { letter: Letter, value: String },
    #[error("Letter {letter} lists unknown activity '{value}'")]
    UnknownActivity { letter: Letter, value: String },
}

/// Immutable curriculum data for one letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetterEntry {
    pub letter: Letter,
    pub phonetic: String,
    pub example_words: Vec<String>,
    pub confusable_letters: BTreeSet<Letter>,
    pub activities: BTreeSet<ActivityKind>,
    pub rhyme: Option<String>,
}

impl LetterEntry {
    /// The first example word. Validation guarantees there is one.
    pub fn example_word(&self) -> &str {
        self.example_words
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn is_confusable_with(&self, other: Letter) -> bool {
        self.confusable_letters.contains(&other)
    }
}

#[derive(Deserialize)]
struct CurriculumDocument {
    letters: BTreeMap<String, RawLetterEntry>,
}

#[derive(Deserialize)]
struct RawLetterEntry {
    phonetic: String,
    example_words: Vec<String>,
    #[serde(default)]
    confusable_letters: Vec<String>,
    #[serde(default)]
    activities: Vec<String>,
    #[serde(default)]
    rhyme: Option<String>,
}

impl RawLetterEntry {
    fn validate(self, letter: Letter) -> Result<LetterEntry, CurriculumError> {
        if self.phonetic.trim().is_empty() {
            return Err(CurriculumError::EmptyPhonetic(letter));
        }
        let example_words: Vec<String> = self
            .example_words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if example_words.is_empty() {
            return Err(CurriculumError::NoExampleWords(letter));
        }

        let confusable_letters = self
            .confusable_letters
            .into_iter()
            .map(|value| match Letter::parse(&value) {
                Some(other) if other != letter => Ok(other),
                _ => Err(CurriculumError::InvalidConfusable { letter, value }),
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let activities = self
            .activities
            .into_iter()
            .map(|value| {
                ActivityKind::from_id(&value)
                    .ok_or(CurriculumError::UnknownActivity { letter, value })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(LetterEntry {
            letter,
            phonetic: self.phonetic.trim().to_string(),
            example_words,
            confusable_letters,
            activities,
            rhyme: self.rhyme.filter(|r| !r.trim().is_empty()),
        })
    }
}

/// The complete, validated A–Z curriculum.
#[derive(Debug, Clone)]
pub struct Curriculum {
    // Indexed by `Letter::index`; always 26 entries.
    entries: Vec<LetterEntry>,
}

impl Curriculum {
    /// Loads the curriculum bundled with the crate.
    pub fn builtin() -> Result<Self, CurriculumError> {
        Self::from_json_str(BUILTIN_CURRICULUM)
    }

    /// Loads and validates a curriculum document from disk.
    pub fn load(path: &Path) -> Result<Self, CurriculumError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CurriculumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let curriculum = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "Curriculum loaded");
        Ok(curriculum)
    }

    /// Parses and validates a curriculum document.
    ///
    /// Every letter A–Z must be present exactly once, with a non-empty phonetic
    /// description, at least one example word, confusable letters drawn from
    /// A–Z, and known activity identifiers.
    pub fn from_json_str(raw: &str) -> Result<Self, CurriculumError> {
        let document: CurriculumDocument = serde_json::from_str(raw)?;

        let mut by_letter = BTreeMap::new();
        for (key, entry) in document.letters {
            let letter = Letter::parse(&key).ok_or_else(|| CurriculumError::InvalidKey(key))?;
            if by_letter.insert(letter, entry.validate(letter)?).is_some() {
                return Err(CurriculumError::DuplicateLetter(letter));
            }
        }

        let entries = Letter::all()
            .map(|letter| {
                by_letter
                    .remove(&letter)
                    .ok_or(CurriculumError::MissingLetter(letter))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }

    pub fn entry(&self, letter: Letter) -> &LetterEntry {
        &self.entries[letter.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = &LetterEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_document(skip: Option<char>) -> serde_json::Value {
        let mut letters = serde_json::Map::new();
        for letter in Letter::all() {
            if Some(letter.as_char()) == skip {
                continue;
            }
            letters.insert(
                letter.to_string(),
                serde_json::json!({
                    "phonetic": format!("the {} sound", letter),
                    "example_words": [format!("{}-word", letter)],
                }),
            );
        }
        serde_json::json!({ "letters": letters })
    }

    #[test]
    fn test_letter_parsing() {
        assert_eq!(Letter::new('b'), Some(Letter('B')));
        assert_eq!(Letter::parse(" q "), Some(Letter('Q')));
        assert_eq!(Letter::parse("qq"), None);
        assert_eq!(Letter::new('7'), None);
        assert_eq!(Letter::new('é'), None);
    }

    #[test]
    fn test_letter_next_wraps() {
        assert_eq!(Letter::new('C').unwrap().next(), Letter::new('D').unwrap());
        assert_eq!(Letter::Z.next(), Letter::A);
    }

    #[test]
    fn test_letter_serializes_as_char_string() {
        let json = serde_json::to_string(&Letter::new('m').unwrap()).unwrap();
        assert_eq!(json, "\"M\"");
    }

    #[test]
    fn test_builtin_has_every_letter_with_content() {
        let curriculum = Curriculum::builtin().expect("builtin curriculum should validate");
        for letter in Letter::all() {
            let entry = curriculum.entry(letter);
            assert_eq!(entry.letter, letter);
            assert!(!entry.phonetic.is_empty(), "{} has no phonetic", letter);
            assert!(!entry.example_words.is_empty(), "{} has no examples", letter);
        }
    }

    #[test]
    fn test_builtin_b_is_confusable_with_p() {
        let curriculum = Curriculum::builtin().unwrap();
        let b = curriculum.entry(Letter::new('B').unwrap());
        assert!(b.is_confusable_with(Letter::new('P').unwrap()));
        assert_eq!(b.example_word(), "Ball");
    }

    #[test]
    fn test_missing_letter_fails_fast() {
        let raw = minimal_document(Some('Q')).to_string();
        let err = Curriculum::from_json_str(&raw).unwrap_err();
        assert!(matches!(err, CurriculumError::MissingLetter(l) if l.as_char() == 'Q'));
    }

    #[test]
    fn test_invalid_key_fails_fast() {
        let mut doc = minimal_document(None);
        doc["letters"]["AB"] = serde_json::json!({
            "phonetic": "x",
            "example_words": ["x"],
        });
        let err = Curriculum::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CurriculumError::InvalidKey(k) if k == "AB"));
    }

    #[test]
    fn test_duplicate_letter_fails_fast() {
        let mut doc = minimal_document(None);
        doc["letters"]["a"] = serde_json::json!({
            "phonetic": "a second A",
            "example_words": ["Apple"],
        });
        let err = Curriculum::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CurriculumError::DuplicateLetter(l) if l == Letter::A));
    }

    #[test]
    fn test_empty_examples_fail_fast() {
        let mut doc = minimal_document(None);
        doc["letters"]["C"]["example_words"] = serde_json::json!(["  "]);
        let err = Curriculum::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CurriculumError::NoExampleWords(l) if l.as_char() == 'C'));
    }

    #[test]
    fn test_bad_confusable_fails_fast() {
        let mut doc = minimal_document(None);
        doc["letters"]["B"]["confusable_letters"] = serde_json::json!(["P", "3"]);
        let err = Curriculum::from_json_str(&doc.to_string()).unwrap_err();
        match err {
            CurriculumError::InvalidConfusable { letter, value } => {
                assert_eq!(letter.as_char(), 'B');
                assert_eq!(value, "3");
            }
            other => panic!("Expected InvalidConfusable, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_activity_fails_fast() {
        let mut doc = minimal_document(None);
        doc["letters"]["D"]["activities"] = serde_json::json!(["juggling"]);
        let err = Curriculum::from_json_str(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CurriculumError::UnknownActivity { value, .. } if value == "juggling"));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = Curriculum::from_json_str("{ letters: ").unwrap_err();
        assert!(matches!(err, CurriculumError::Json(_)));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = Curriculum::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
