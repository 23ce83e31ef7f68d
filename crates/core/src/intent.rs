//! Intent Classifier
//!
//! Maps a raw utterance to one of a fixed set of intents plus the letter and
//! name it mentions. Classification is an ordered rule list: the first rule
//! whose predicate holds decides the intent, and `Unknown` is the fallback.
//! This is keyword matching, nothing smarter.

use crate::curriculum::Letter;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Introduction,
    LearnLetter,
    NextLetter,
    Repeat,
    Help,
    RequestActivity,
    Unknown,
}

/// The classifier's verdict for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub letter: Option<Letter>,
    pub name: Option<String>,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            letter: None,
            name: None,
        }
    }
}

/// Entities pulled out of the utterance before rules are evaluated.
struct Entities {
    letter: Option<Letter>,
    name: Option<String>,
}

enum Predicate {
    /// The utterance matches a keyword pattern.
    Pattern(Regex),
    /// A name was extracted.
    NamePresent,
    /// A letter was extracted.
    LetterPresent,
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    fn holds(&self, text: &str, entities: &Entities) -> bool {
        match self {
            Predicate::Pattern(re) => re.is_match(text),
            Predicate::NamePresent => entities.name.is_some(),
            Predicate::LetterPresent => entities.letter.is_some(),
            Predicate::AnyOf(predicates) => predicates.iter().any(|p| p.holds(text, entities)),
        }
    }
}

struct Rule {
    intent: Intent,
    predicate: Predicate,
}

// Words that follow "I'm" without being a name.
const NOT_NAMES: &[&str] = &[
    "ready", "fine", "good", "done", "here", "back", "happy", "sad", "tired", "bored", "okay",
    "ok", "sorry", "not", "so", "going", "trying", "learning", "bubbly",
];

/// Ordered keyword rules for classifying a child's utterance.
pub struct IntentClassifier {
    rules: Vec<Rule>,
    letter_phrase: Regex,
    stated_name: Regex,
    self_introduction: Regex,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern(re: &str) -> Predicate {
    // Patterns are literals in this file; a typo is a programming error caught by tests.
    Predicate::Pattern(Regex::new(re).unwrap_or_else(|e| panic!("invalid intent pattern {re}: {e}")))
}

impl IntentClassifier {
    pub fn new() -> Self {
        let rules = vec![
            Rule {
                intent: Intent::Introduction,
                predicate: Predicate::NamePresent,
            },
            Rule {
                intent: Intent::NextLetter,
                predicate: pattern(r"(?i)\b(next|another letter|move on|more letters?)\b"),
            },
            Rule {
                intent: Intent::Repeat,
                predicate: pattern(r"(?i)\b(again|repeat|one more time|once more)\b"),
            },
            Rule {
                intent: Intent::RequestActivity,
                predicate: pattern(r"(?i)\b(game|games|play|activity|fun)\b"),
            },
            Rule {
                intent: Intent::LearnLetter,
                predicate: Predicate::AnyOf(vec![
                    pattern(r"(?i)\b(teach|learn|show me|what is|what's|letter)\b"),
                    Predicate::LetterPresent,
                ]),
            },
            Rule {
                intent: Intent::Help,
                predicate: pattern(r"(?i)\b(help|how do|what do|don't know|dont know|confused)\b"),
            },
            Rule {
                intent: Intent::Introduction,
                predicate: pattern(r"(?i)^\W*(hello|hi|hey|hiya|good (morning|afternoon|evening))\b"),
            },
        ];

        Self {
            rules,
            letter_phrase: Regex::new(r#"(?i)\bletter\s+['"]?([a-z])\b"#)
                .unwrap_or_else(|e| panic!("invalid letter pattern: {e}")),
            stated_name: Regex::new(r"(?i)\b(?:my name is|call me)\s+([\p{L}][\p{L}'-]*)")
                .unwrap_or_else(|e| panic!("invalid name pattern: {e}")),
            self_introduction: Regex::new(r"\b(?:[Ii]'m|[Ii]’m|[Ii] am)\s+(\p{Lu}[\p{L}'-]+)")
                .unwrap_or_else(|e| panic!("invalid name pattern: {e}")),
        }
    }

    /// Classifies an utterance. Never fails: anything unmatched is `Unknown`
    /// with no entities.
    pub fn classify(&self, utterance: &str) -> Classification {
        let text = utterance.trim();
        if text.is_empty() {
            return Classification::unknown();
        }

        let entities = Entities {
            letter: self.extract_letter(text),
            name: self.extract_name(text),
        };

        self.rules
            .iter()
            .find(|rule| rule.predicate.holds(text, &entities))
            .map(|rule| Classification {
                intent: rule.intent,
                letter: entities.letter,
                name: entities.name.clone(),
            })
            .unwrap_or_else(Classification::unknown)
    }

    /// Finds the letter an utterance refers to: a "letter X" phrase first, then
    /// the first standalone single-letter token.
    ///
    /// In longer utterances lowercase "a"/"i" and the pronoun "I" are words,
    /// not letters, and are skipped.
    pub fn extract_letter(&self, text: &str) -> Option<Letter> {
        if let Some(caps) = self.letter_phrase.captures(text) {
            return caps.get(1).and_then(|m| Letter::parse(m.as_str()));
        }

        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();
        let sole = tokens.len() == 1;

        tokens.iter().find_map(|token| {
            let letter = Letter::parse(token)?;
            let is_word = matches!(*token, "a" | "i" | "I");
            (sole || !is_word).then_some(letter)
        })
    }

    /// Finds a stated name: the word after "my name is"/"call me", or a
    /// capitalized word after "I'm"/"I am".
    pub fn extract_name(&self, text: &str) -> Option<String> {
        let candidate = self
            .stated_name
            .captures(text)
            .or_else(|| self.self_introduction.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim_matches(|c: char| c == '\'' || c == '-'))?;

        if candidate.chars().count() < 2 || NOT_NAMES.contains(&candidate.to_lowercase().as_str()) {
            return None;
        }
        Some(capitalize(candidate))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: char) -> Letter {
        Letter::new(c).unwrap()
    }

    fn classify(text: &str) -> Classification {
        IntentClassifier::new().classify(text)
    }

    #[test]
    fn test_introduction_with_name() {
        let result = classify("My name is Mia");
        assert_eq!(result.intent, Intent::Introduction);
        assert_eq!(result.name.as_deref(), Some("Mia"));
    }

    #[test]
    fn test_name_is_capitalized() {
        let result = classify("call me SAM!");
        assert_eq!(result.name.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_im_requires_capitalized_name() {
        assert_eq!(classify("I'm Leo").name.as_deref(), Some("Leo"));
        assert_eq!(classify("I'm ready").name, None);
        assert_eq!(classify("I am Happy").name, None);
    }

    #[test]
    fn test_greeting_is_introduction() {
        assert_eq!(classify("Hello").intent, Intent::Introduction);
        assert_eq!(classify("hi Bubbly!").intent, Intent::Introduction);
        assert_eq!(classify("this is fine").intent, Intent::Unknown);
    }

    #[test]
    fn test_learn_letter_variants() {
        let result = classify("Teach me B");
        assert_eq!(result.intent, Intent::LearnLetter);
        assert_eq!(result.letter, Some(letter('B')));

        let result = classify("teach me the letter c");
        assert_eq!(result.intent, Intent::LearnLetter);
        assert_eq!(result.letter, Some(letter('C')));

        let result = classify("B");
        assert_eq!(result.intent, Intent::LearnLetter);
        assert_eq!(result.letter, Some(letter('B')));
    }

    #[test]
    fn test_pronoun_and_article_are_not_letters() {
        let classifier = IntentClassifier::new();
        assert_eq!(classifier.extract_letter("I want a cookie"), None);
        assert_eq!(classifier.extract_letter("I like A"), Some(letter('A')));
        assert_eq!(classifier.extract_letter("a"), Some(letter('A')));
    }

    #[test]
    fn test_next_letter() {
        let result = classify("next letter");
        assert_eq!(result.intent, Intent::NextLetter);
        assert_eq!(result.letter, None);
    }

    #[test]
    fn test_repeat_help_activity() {
        assert_eq!(classify("say that again").intent, Intent::Repeat);
        assert_eq!(classify("can you help me").intent, Intent::Help);
        assert_eq!(classify("let's play a game").intent, Intent::RequestActivity);
    }

    #[test]
    fn test_name_outranks_letter() {
        let result = classify("My name is Mia and I like the letter M");
        assert_eq!(result.intent, Intent::Introduction);
        assert_eq!(result.letter, Some(letter('M')));
    }

    #[test]
    fn test_unknown_has_no_entities() {
        assert_eq!(classify("bananas are yellow"), Classification::unknown());
        assert_eq!(classify("   "), Classification::unknown());
    }
}
