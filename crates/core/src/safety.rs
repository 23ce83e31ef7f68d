//! Safety Filter
//!
//! A best-effort keyword screen applied to what the child says and to any
//! reply a language model proposes. It matches a fixed blocklist
//! case-insensitively and gives no guarantee that unsafe text is caught.
//! Anything it flags is answered with a fixed redirect instead.

use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;

/// The reply used whenever the filter flags an utterance.
pub const REDIRECT_REPLY: &str = "Let's get back to learning letters!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    PersonalInfoRequest,
    Profanity,
    OffTopic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "category", rename_all = "snake_case")]
pub enum SafetyVerdict {
    Safe,
    Unsafe(SafetyCategory),
}

impl SafetyVerdict {
    pub fn is_safe(self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }

    pub fn category(self) -> Option<SafetyCategory> {
        match self {
            SafetyVerdict::Safe => None,
            SafetyVerdict::Unsafe(category) => Some(category),
        }
    }
}

const PERSONAL_INFO_TERMS: &[&str] = &[
    "address",
    "phone number",
    "phone",
    "email",
    "e-mail",
    "password",
    "credit card",
    "social security",
    "school name",
    "what school",
    "parent name",
    "parents' names",
    "mom's name",
    "dad's name",
    "where do you live",
    "where you live",
    "personal information",
];

const PROFANITY_TERMS: &[&str] = &[
    "damn", "hell", "crap", "shit", "fuck", "bitch", "bastard", "ass", "stupid", "idiot",
    "shut up",
];

const OFF_TOPIC_TERMS: &[&str] = &[
    "kill", "gun", "guns", "knife", "blood", "weapon", "weapons", "fight", "die", "dead",
];

/// Keyword blocklist screen plus PII redaction patterns.
pub struct SafetyFilter {
    rules: Vec<(SafetyCategory, Regex)>,
    phone: Regex,
    email: Regex,
    street_address: Regex,
}

impl Default for SafetyFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn word_list(terms: &[&str]) -> Regex {
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let re = format!(r"(?i)\b(?:{alternation})\b");
    // Built from the constant lists above; cannot fail once tests pass.
    Regex::new(&re).unwrap_or_else(|e| panic!("invalid blocklist pattern: {e}"))
}

fn compiled(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid redaction pattern {re}: {e}"))
}

impl SafetyFilter {
    pub fn new() -> Self {
        Self {
            rules: vec![
                (SafetyCategory::PersonalInfoRequest, word_list(PERSONAL_INFO_TERMS)),
                (SafetyCategory::Profanity, word_list(PROFANITY_TERMS)),
                (SafetyCategory::OffTopic, word_list(OFF_TOPIC_TERMS)),
            ],
            phone: compiled(r"\b(?:\+?\d{1,2}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b"),
            email: compiled(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b"),
            street_address: compiled(
                r"(?i)\b\d{1,5}\s+(?:[a-z]+\s+){1,3}(?:street|st|avenue|ave|road|rd|lane|ln|drive|dr|court|ct|boulevard|blvd|way)\b\.?",
            ),
        }
    }

    /// Checks text against the blocklist. The first matching category wins.
    pub fn check(&self, text: &str) -> SafetyVerdict {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(category, _)| SafetyVerdict::Unsafe(*category))
            .unwrap_or(SafetyVerdict::Safe)
    }

    /// Replaces phone numbers, e-mail addresses and street addresses with
    /// placeholders.
    pub fn redact_pii<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut redacted = Cow::Borrowed(text);
        for (re, placeholder) in [
            (&self.email, "[EMAIL]"),
            (&self.phone, "[PHONE]"),
            (&self.street_address, "[ADDRESS]"),
        ] {
            if re.is_match(&redacted) {
                redacted = Cow::Owned(re.replace_all(&redacted, placeholder).into_owned());
            }
        }
        redacted
    }
}
