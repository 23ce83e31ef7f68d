//! Dialogue Orchestrator
//!
//! Runs one conversational turn through a fixed sequence of stages:
//! classify the utterance, gate it through the safety filter, update the
//! session, then build the reply. Optional collaborators (speech, vision, a
//! language model) are consulted along the way; when any of them is missing,
//! disabled, slow or failing, the turn falls back to rule-based templates.
//! A turn never fails.

use crate::activities::{Activity, ActivityResult};
use crate::config::TutorConfig;
use crate::curriculum::{Curriculum, Letter, LetterEntry};
use crate::intent::{Classification, Intent, IntentClassifier};
use crate::llm_client::{DEFAULT_SYSTEM_PROMPT, rephrase_messages, render_persona};
use crate::modalities::{Collaborators, Detection, Transcript, attempt};
use crate::progress::{BadgeKind, ProgressEvent};
use crate::safety::{REDIRECT_REPLY, SafetyCategory, SafetyFilter, SafetyVerdict};
use crate::session::SessionState;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, trace, warn};

/// Where a session is within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    AwaitInput,
    Classify,
    SafetyCheck,
    UpdateState,
    BuildReply,
    Done,
}

/// One input from the child.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    /// Typed or pre-transcribed text, with an optional pronunciation confidence in `[0, 1]`.
    Text {
        utterance: String,
        confidence: Option<f32>,
    },
    /// Recorded speech for the speech-to-text collaborator.
    Audio(Vec<u8>),
    /// A picture for the vision collaborator.
    Image(Vec<u8>),
}

impl TurnInput {
    pub fn text(utterance: impl Into<String>) -> Self {
        TurnInput::Text {
            utterance: utterance.into(),
            confidence: None,
        }
    }

    pub fn spoken(utterance: impl Into<String>, confidence: f32) -> Self {
        TurnInput::Text {
            utterance: utterance.into(),
            confidence: Some(confidence),
        }
    }
}

/// Everything a turn produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub intent: Intent,
    pub current_letter: Letter,
    pub events: Vec<ProgressEvent>,
    /// Set when the safety filter replaced the turn with a redirect.
    pub flagged: Option<SafetyCategory>,
    /// What the speech or vision collaborator made of a non-text input.
    pub recognized: Option<String>,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputSource {
    Typed,
    Heard,
    Seen,
}

struct Observation {
    utterance: String,
    confidence: Option<f32>,
    source: InputSource,
}

enum Attempt {
    Star { advanced_to: Option<Letter> },
    Missed,
    Confused { heard: Letter },
}

/// What the turn decided to say, before it is rendered to text.
enum Plan {
    Redirect,
    ActivityGraded { result: ActivityResult, letter: Letter },
    Sighting { label: String, matched: bool },
    Introduction { stated_name: Option<String>, suggestion: Letter },
    Lesson { letter: Letter, attempt: Option<Attempt> },
    NextLetter(Letter),
    Repeat(Option<String>),
    Help { suggestion: Letter },
    Activity(String),
    Unknown,
}

impl Plan {
    /// Redirects, exact repeats and activity instructions are never reworded.
    fn allows_rephrase(&self) -> bool {
        !matches!(self, Plan::Redirect | Plan::Repeat(_) | Plan::Activity(_))
    }
}

const PRAISE: [&str; 4] = ["Excellent!", "Wonderful!", "Fantastic!", "Amazing!"];

/// Drives turns for any number of sessions. Holds only read-only data, so one
/// orchestrator can be shared across sessions.
pub struct DialogueOrchestrator {
    curriculum: Arc<Curriculum>,
    classifier: IntentClassifier,
    safety: SafetyFilter,
    config: TutorConfig,
    collaborators: Collaborators,
    persona: String,
}

impl DialogueOrchestrator {
    pub fn new(curriculum: Arc<Curriculum>, config: TutorConfig) -> Self {
        Self {
            curriculum,
            classifier: IntentClassifier::new(),
            safety: SafetyFilter::new(),
            config,
            collaborators: Collaborators::none(),
            persona: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Replaces the language-model persona template.
    pub fn with_persona(mut self, template: impl Into<String>) -> Self {
        self.persona = template.into();
        self
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn new_session(&self) -> SessionState {
        SessionState::new(&self.config)
    }

    /// Processes one turn, mutating `state` in place.
    pub async fn handle_turn(&self, state: &mut SessionState, input: TurnInput) -> TurnOutcome {
        let span = info_span!("turn", n = state.total_interactions() + 1);
        self.run_turn(state, input).instrument(span).await
    }

    async fn run_turn(&self, state: &mut SessionState, input: TurnInput) -> TurnOutcome {
        enter(state, TurnStage::AwaitInput);
        let observation = self.observe(state, input).await;
        let recognized = (observation.source != InputSource::Typed)
            .then(|| observation.utterance.clone());

        enter(state, TurnStage::Classify);
        debug!(utterance = %observation.utterance, confidence = ?observation.confidence, "Received utterance");
        let classification = self.classifier.classify(&observation.utterance);
        info!(
            intent = ?classification.intent,
            letter = ?classification.letter,
            "Utterance classified"
        );

        enter(state, TurnStage::SafetyCheck);
        let verdict = self.safety.check(&observation.utterance);

        let mut events = Vec::new();
        let plan = match verdict {
            SafetyVerdict::Unsafe(category) => {
                warn!(?category, "Utterance flagged, redirecting");
                Plan::Redirect
            }
            SafetyVerdict::Safe => {
                enter(state, TurnStage::UpdateState);
                self.update_state(state, &observation, &classification, &mut events)
            }
        };

        enter(state, TurnStage::BuildReply);
        let stored_utterance = self.safety.redact_pii(&observation.utterance).into_owned();
        let template = self.render(&plan, state, &events);
        let reply = if plan.allows_rephrase() {
            self.rephrase(state, &stored_utterance, template).await
        } else {
            template
        };
        let audio = self.speak(state, &reply).await;

        state.record_turn(stored_utterance, reply.clone(), classification.intent);
        enter(state, TurnStage::Done);

        let outcome = TurnOutcome {
            reply,
            intent: classification.intent,
            current_letter: state.current_letter(),
            events,
            flagged: verdict.category(),
            recognized,
            audio,
        };
        enter(state, TurnStage::AwaitInput);
        outcome
    }

    /// Turns raw input into text, consulting speech or vision when enabled.
    async fn observe(&self, state: &SessionState, input: TurnInput) -> Observation {
        let settings = state.settings();
        match input {
            TurnInput::Text {
                utterance,
                confidence,
            } => Observation {
                utterance,
                confidence: confidence.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 1.0)),
                source: InputSource::Typed,
            },
            TurnInput::Audio(bytes) => {
                let transcript = match &self.collaborators.speech_to_text {
                    Some(stt) if settings.asr_enabled => {
                        attempt("speech_to_text", self.config.model_timeout, stt.transcribe(&bytes))
                            .await
                            .unwrap_or_else(Transcript::empty)
                    }
                    _ => {
                        debug!("Speech recognition unavailable, ignoring audio");
                        Transcript::empty()
                    }
                };
                let heard = transcript.text.trim().to_string();
                Observation {
                    confidence: (!heard.is_empty()).then_some(transcript.confidence.clamp(0.0, 1.0)),
                    utterance: heard,
                    source: InputSource::Heard,
                }
            }
            TurnInput::Image(bytes) => {
                let detection = match &self.collaborators.vision {
                    Some(vision) if settings.vision_enabled => {
                        attempt("vision", self.config.model_timeout, vision.detect(&bytes))
                            .await
                            .unwrap_or_else(Detection::none)
                    }
                    _ => {
                        debug!("Vision unavailable, ignoring image");
                        Detection::none()
                    }
                };
                let label = detection.label.trim().to_string();
                // A detected letter counts as the child showing it.
                let confidence = Letter::parse(&label).map(|_| detection.confidence.clamp(0.0, 1.0));
                Observation {
                    utterance: label,
                    confidence,
                    source: InputSource::Seen,
                }
            }
        }
    }

    fn update_state(
        &self,
        state: &mut SessionState,
        observation: &Observation,
        classification: &Classification,
        events: &mut Vec<ProgressEvent>,
    ) -> Plan {
        if let Some(name) = &classification.name {
            info!("Child introduced themselves");
            state.set_child_name(name.clone());
        }

        if let Some(activity) = state.activity.as_ref().filter(|a| a.accepts(&observation.utterance)) {
            let result = activity.check_answer(&observation.utterance, &mut rand::rng());
            let letter = activity.letter;
            debug!(kind = ?activity.kind, correct = result.correct, "Activity answer graded");
            if result.correct {
                state.activity = None;
            }
            return Plan::ActivityGraded { result, letter };
        }

        if observation.source == InputSource::Seen
            && !observation.utterance.is_empty()
            && observation.confidence.is_none()
        {
            let current = state.current_letter().as_char();
            let matched = observation
                .utterance
                .chars()
                .next()
                .is_some_and(|c| c.to_ascii_uppercase() == current);
            return Plan::Sighting {
                label: observation.utterance.clone(),
                matched,
            };
        }

        match classification.intent {
            Intent::Introduction => Plan::Introduction {
                stated_name: classification.name.clone(),
                suggestion: state.suggest_next_letter(),
            },
            Intent::LearnLetter => {
                self.lesson(state, classification.letter, observation.confidence, events)
            }
            Intent::NextLetter => {
                state.activity = None;
                Plan::NextLetter(state.advance_letter())
            }
            Intent::Repeat => Plan::Repeat(state.recent_turns().last().map(|t| t.assistant.clone())),
            Intent::Help => Plan::Help {
                suggestion: state.suggest_next_letter(),
            },
            Intent::RequestActivity => {
                let entry = self.curriculum.entry(state.current_letter());
                let activity = Activity::random_for(entry, &self.curriculum, &mut rand::rng());
                info!(kind = ?activity.kind, letter = %activity.letter, "Activity started");
                let instruction = activity.instruction.clone();
                state.activity = Some(activity);
                Plan::Activity(instruction)
            }
            Intent::Unknown => Plan::Unknown,
        }
    }

    /// Moves to the requested letter and grades a pronunciation attempt when
    /// both a spoken letter and a confidence are present.
    fn lesson(
        &self,
        state: &mut SessionState,
        spoken: Option<Letter>,
        confidence: Option<f32>,
        events: &mut Vec<ProgressEvent>,
    ) -> Plan {
        let current = state.current_letter();

        let (heard, confidence) = match (spoken, confidence) {
            (Some(heard), Some(confidence)) => (heard, confidence),
            _ => {
                let target = spoken.unwrap_or(current);
                if target != current {
                    state.activity = None;
                    state.set_current_letter(target);
                }
                return Plan::Lesson {
                    letter: target,
                    attempt: None,
                };
            }
        };

        if heard != current && self.curriculum.entry(current).is_confusable_with(heard) {
            info!(%heard, target = %current, "Confusable letter heard");
            state.progress.record_miss(current);
            self.after_attempt(state, events);
            return Plan::Lesson {
                letter: current,
                attempt: Some(Attempt::Confused { heard }),
            };
        }

        if heard != current {
            state.activity = None;
            state.set_current_letter(heard);
        }

        let attempt = match state.progress.award_star(heard, confidence) {
            Some(star) => {
                events.push(ProgressEvent::StarAwarded {
                    letter: star.letter,
                    confidence: star.confidence,
                });
                let successes = state.note_success_on_current();
                let advanced_to = (successes >= self.config.advance_after).then(|| {
                    let next = state.advance_letter();
                    info!(mastered = %heard, next = %next, "Advancing to the next letter");
                    next
                });
                Attempt::Star { advanced_to }
            }
            None => Attempt::Missed,
        };
        self.after_attempt(state, events);
        Plan::Lesson {
            letter: heard,
            attempt: Some(attempt),
        }
    }

    fn after_attempt(&self, state: &mut SessionState, events: &mut Vec<ProgressEvent>) {
        if let Some(level) = state.adjust_difficulty(&self.config) {
            info!(difficulty = ?level, "Difficulty adjusted");
        }
        for badge in state.progress.check_badges() {
            info!(badge = badge.id(), "Badge unlocked");
            events.push(ProgressEvent::BadgeUnlocked { badge });
        }
    }

    fn render(&self, plan: &Plan, state: &SessionState, events: &[ProgressEvent]) -> String {
        let current = state.current_letter();
        match plan {
            Plan::Redirect => REDIRECT_REPLY.to_string(),
            Plan::ActivityGraded { result, letter } if result.correct => {
                format!("{} That's the letter {letter}!", result.message)
            }
            Plan::ActivityGraded { result, .. } => result.message.clone(),
            Plan::Sighting {
                label,
                matched: true,
            } => format!("You found: {label}! That starts with {current}. Great finding!"),
            Plan::Sighting {
                label,
                matched: false,
            } => format!("You found: {label}! Can you find something that starts with {current}?"),
            Plan::Introduction {
                stated_name,
                suggestion,
            } => match (stated_name, state.child_name()) {
                (Some(name), _) => format!(
                    "Nice to meet you, {name}! I'm Bubbly, and I love letters! Ready for the letter {suggestion}?"
                ),
                (None, Some(name)) => {
                    format!("Hello again, {name}! Ready to learn the letter {current}?")
                }
                (None, None) => "Hello! I'm Bubbly, your alphabet friend! What's your name?".to_string(),
            },
            Plan::Lesson {
                letter,
                attempt: None,
            } => introduce(self.curriculum.entry(*letter)),
            Plan::Lesson {
                letter,
                attempt: Some(attempt),
            } => self.feedback(*letter, attempt, state, events),
            Plan::NextLetter(letter) => format!(
                "Great job! Let's move on to the letter {letter}! {}",
                describe(self.curriculum.entry(*letter))
            ),
            Plan::Repeat(previous) => previous
                .clone()
                .unwrap_or_else(|| introduce(self.curriculum.entry(current))),
            Plan::Help { suggestion } => format!(
                "I'm here to help you learn the alphabet! You can say a letter, ask me to teach you \
                 a letter, say 'next letter', or ask to play a game. How about the letter {suggestion}?"
            ),
            Plan::Activity(instruction) => instruction.clone(),
            Plan::Unknown => format!(
                "That's interesting! Let's keep learning letters. Can you say the letter {current}?"
            ),
        }
    }

    fn feedback(
        &self,
        letter: Letter,
        attempt: &Attempt,
        state: &SessionState,
        events: &[ProgressEvent],
    ) -> String {
        let entry = self.curriculum.entry(letter);
        let mut reply = match attempt {
            Attempt::Star { advanced_to } => {
                let praise = PRAISE.choose(&mut rand::rng()).copied().unwrap_or(PRAISE[0]);
                let mut text = format!(
                    "{praise} You said '{letter}' perfectly! {} starts with {letter}.",
                    entry.example_word()
                );
                if let Some(name) = state.child_name() {
                    match state.streak() {
                        s if s >= 5 => text.push_str(&format!(" Amazing work, {name}! You're a letter champion!")),
                        s if s >= 3 => text.push_str(&format!(" Great job, {name}! You're doing wonderfully!")),
                        _ => {}
                    }
                }
                if let Some(next) = advanced_to {
                    text.push_str(&format!(" You've got {letter}! Let's try the letter {next}!"));
                }
                text
            }
            Attempt::Missed => {
                let mut text = format!(
                    "Good try! Let's work on the '{letter}' sound together. {}",
                    describe(entry)
                );
                if let Some(other) = entry.confusable_letters.iter().next() {
                    text.push_str(&format!(" Remember, '{letter}' is different from '{other}'."));
                }
                text
            }
            Attempt::Confused { heard } => format!(
                "Almost! That sounded like '{heard}'. Remember, '{letter}' is different from '{heard}'. {}",
                describe(entry)
            ),
        };

        for event in events {
            if let ProgressEvent::BadgeUnlocked { badge } = event {
                reply.push_str(&badge_line(*badge));
            }
        }
        reply
    }

    async fn rephrase(&self, state: &SessionState, utterance: &str, template: String) -> String {
        let Some(model) = &self.collaborators.language_model else {
            return template;
        };
        let prompt = render_persona(
            &self.persona,
            state.settings().age_range,
            state.current_letter(),
            state.child_name(),
        );
        let messages = match rephrase_messages(state.recent_turns().iter(), utterance, &template) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Could not build rephrase request, using template.");
                return template;
            }
        };

        match attempt("language_model", self.config.model_timeout, model.generate(prompt, messages)).await {
            Some(candidate) if self.safety.check(&candidate).is_safe() => candidate,
            Some(_) => {
                warn!("Generated reply failed the safety check, using template.");
                template
            }
            None => template,
        }
    }

    async fn speak(&self, state: &SessionState, reply: &str) -> Option<Vec<u8>> {
        if !state.settings().tts_enabled {
            return None;
        }
        let tts = self.collaborators.text_to_speech.as_ref()?;
        attempt("text_to_speech", self.config.model_timeout, tts.synthesize(reply)).await
    }
}

fn enter(state: &mut SessionState, stage: TurnStage) {
    trace!(?stage, "Entering stage");
    state.stage = stage;
}

fn describe(entry: &LetterEntry) -> String {
    format!("It sounds like {}. Like in {}!", entry.phonetic, entry.example_word())
}

fn introduce(entry: &LetterEntry) -> String {
    format!("Let's learn the letter {}! {}", entry.letter, describe(entry))
}

fn badge_line(badge: BadgeKind) -> String {
    format!(" You earned the {} {} badge!", badge.icon(), badge.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::ActivityKind;
    use crate::llm_client::MockLanguageModel;
    use crate::modalities::{MockLetterVision, MockSpeechToText, MockTextToSpeech};
    use crate::session::SettingsUpdate;
    use anyhow::anyhow;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn letter(c: char) -> Letter {
        Letter::new(c).unwrap()
    }

    fn orchestrator() -> DialogueOrchestrator {
        DialogueOrchestrator::new(Arc::new(Curriculum::builtin().unwrap()), TutorConfig::default())
    }

    fn with(collaborators: Collaborators) -> DialogueOrchestrator {
        orchestrator().with_collaborators(collaborators)
    }

    #[tokio::test]
    async fn test_learn_letter_reply_uses_curriculum() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("Teach me B")).await;

        assert_eq!(outcome.intent, Intent::LearnLetter);
        assert!(outcome.reply.starts_with("Let's learn the letter B!"));
        assert!(outcome.reply.contains("Ball"));
        assert_eq!(state.current_letter(), letter('B'));
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn test_stage_returns_to_await_input() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();
        bubbly.handle_turn(&mut state, TurnInput::text("Hello")).await;
        assert_eq!(state.stage(), TurnStage::AwaitInput);
    }

    #[tokio::test]
    async fn test_confident_attempt_awards_star_and_first_star_badge() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::spoken("A", 0.9)).await;

        assert_eq!(
            outcome.events,
            vec![
                ProgressEvent::StarAwarded {
                    letter: letter('A'),
                    confidence: 0.9
                },
                ProgressEvent::BadgeUnlocked {
                    badge: BadgeKind::FirstStar
                },
            ]
        );
        assert!(outcome.reply.contains("You said 'A' perfectly!"));
        assert!(outcome.reply.contains("First Steps"));
        assert_eq!(state.streak(), 1);
    }

    #[tokio::test]
    async fn test_confusable_letter_is_corrected() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();
        bubbly.handle_turn(&mut state, TurnInput::text("Teach me B")).await;

        let outcome = bubbly.handle_turn(&mut state, TurnInput::spoken("P", 0.9)).await;

        assert!(outcome.reply.contains("'B' is different from 'P'"));
        assert!(outcome.events.is_empty());
        assert_eq!(state.current_letter(), letter('B'));
        assert_eq!(state.streak(), 0);
        assert!(state.progress().struggled().contains(&letter('B')));
    }

    #[tokio::test]
    async fn test_low_confidence_is_encouraged() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::spoken("C", 0.4)).await;

        assert!(outcome.reply.starts_with("Good try!"));
        assert!(outcome.events.is_empty());
        assert!(state.progress().struggled().contains(&letter('C')));
    }

    #[tokio::test]
    async fn test_nan_confidence_is_treated_as_unscored() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly
            .handle_turn(&mut state, TurnInput::spoken("A", f32::NAN))
            .await;

        assert!(outcome.events.is_empty());
        assert!(state.progress().stars().is_empty());
        assert_eq!(state.streak(), 0);
        assert!(outcome.reply.starts_with("Let's learn the letter A!"));
    }

    #[tokio::test]
    async fn test_advances_after_three_successes() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        for _ in 0..2 {
            bubbly.handle_turn(&mut state, TurnInput::spoken("A", 0.9)).await;
            assert_eq!(state.current_letter(), letter('A'));
        }
        let outcome = bubbly.handle_turn(&mut state, TurnInput::spoken("A", 0.9)).await;

        assert_eq!(state.current_letter(), letter('B'));
        assert_eq!(outcome.current_letter, letter('B'));
        assert!(outcome.reply.contains("Let's try the letter B!"));
    }

    #[tokio::test]
    async fn test_unsafe_input_is_redirected_without_state_change() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly
            .handle_turn(&mut state, TurnInput::spoken("what is your address B", 0.9))
            .await;

        assert_eq!(outcome.reply, REDIRECT_REPLY);
        assert_eq!(outcome.flagged, Some(SafetyCategory::PersonalInfoRequest));
        assert!(outcome.events.is_empty());
        assert_eq!(state.current_letter(), Letter::A);
        assert!(state.progress().stars().is_empty());
        assert_eq!(state.recent_turns().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_echoes_previous_reply() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();
        let first = bubbly.handle_turn(&mut state, TurnInput::text("Teach me D")).await;

        let again = bubbly.handle_turn(&mut state, TurnInput::text("say that again")).await;

        assert_eq!(again.intent, Intent::Repeat);
        assert_eq!(again.reply, first.reply);
    }

    #[tokio::test]
    async fn test_pending_activity_is_graded() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();
        bubbly.handle_turn(&mut state, TurnInput::text("Teach me B")).await;
        let entry = bubbly.curriculum().entry(letter('B'));
        state.activity = Some(Activity::build(
            ActivityKind::ChooseTheSound,
            entry,
            bubbly.curriculum(),
            &mut StdRng::seed_from_u64(3),
        ));

        let wrong = bubbly.handle_turn(&mut state, TurnInput::text("P")).await;
        assert!(wrong.reply.starts_with("Not quite!"));
        assert!(state.pending_activity().is_some());

        let right = bubbly.handle_turn(&mut state, TurnInput::text("B")).await;
        assert!(right.reply.ends_with("That's the letter B!"));
        assert!(state.pending_activity().is_none());
    }

    #[tokio::test]
    async fn test_request_activity_sets_pending_activity() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("let's play a game")).await;

        let activity = state.pending_activity().unwrap();
        assert_eq!(outcome.reply, activity.instruction);
        assert_eq!(activity.letter, Letter::A);
    }

    #[tokio::test]
    async fn test_name_is_kept_until_restated() {
        let bubbly = orchestrator();
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("my name is Mia")).await;
        assert!(outcome.reply.starts_with("Nice to meet you, Mia!"));

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("hello")).await;
        assert!(outcome.reply.starts_with("Hello again, Mia!"));
        assert_eq!(state.child_name(), Some("Mia"));
    }

    #[tokio::test]
    async fn test_language_model_rewrites_reply() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .withf(|prompt, _| prompt.contains("the letter B"))
            .times(1)
            .returning(|_, _| Ok("Yay, B is for Ball!".to_string()));
        let bubbly = with(Collaborators::none().with_language_model(Arc::new(model)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("Teach me B")).await;

        assert_eq!(outcome.reply, "Yay, B is for Ball!");
    }

    #[tokio::test]
    async fn test_unsafe_generation_falls_back_to_template() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .returning(|_, _| Ok("Tell me your phone number!".to_string()));
        let bubbly = with(Collaborators::none().with_language_model(Arc::new(model)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("Teach me B")).await;

        assert!(outcome.reply.starts_with("Let's learn the letter B!"));
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_template() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .returning(|_, _| Err(anyhow!("connection refused")));
        let bubbly = with(Collaborators::none().with_language_model(Arc::new(model)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("next letter")).await;

        assert!(outcome.reply.starts_with("Great job! Let's move on to the letter B!"));
    }

    #[tokio::test]
    async fn test_redirect_is_never_rephrased() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().never();
        let bubbly = with(Collaborators::none().with_language_model(Arc::new(model)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("you are stupid")).await;

        assert_eq!(outcome.reply, REDIRECT_REPLY);
    }

    #[tokio::test]
    async fn test_audio_is_transcribed_and_graded() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe().times(1).returning(|_| {
            Ok(Transcript {
                text: "A".to_string(),
                confidence: 0.8,
            })
        });
        let bubbly = with(Collaborators::none().with_speech_to_text(Arc::new(stt)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::Audio(vec![0; 16])).await;

        assert_eq!(outcome.recognized.as_deref(), Some("A"));
        assert_eq!(state.progress().stars().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_speech_recognition_is_skipped() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe().never();
        let bubbly = with(Collaborators::none().with_speech_to_text(Arc::new(stt)));
        let mut state = bubbly.new_session();
        state.update_settings(SettingsUpdate {
            asr_enabled: Some(false),
            ..Default::default()
        });

        let outcome = bubbly.handle_turn(&mut state, TurnInput::Audio(vec![0; 16])).await;

        assert_eq!(outcome.intent, Intent::Unknown);
        assert!(state.progress().stars().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_speech_recognition_times_out() {
        struct Sleepy;
        #[async_trait::async_trait]
        impl crate::modalities::SpeechToText for Sleepy {
            async fn transcribe(&self, _audio: &[u8]) -> anyhow::Result<Transcript> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Transcript {
                    text: "B".to_string(),
                    confidence: 1.0,
                })
            }
        }
        let bubbly = DialogueOrchestrator::new(
            Arc::new(Curriculum::builtin().unwrap()),
            TutorConfig::default().with_model_timeout(Duration::from_millis(100)),
        )
        .with_collaborators(Collaborators::none().with_speech_to_text(Arc::new(Sleepy)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::Audio(vec![1, 2, 3])).await;

        assert_eq!(outcome.recognized.as_deref(), Some(""));
        assert_eq!(outcome.intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn test_vision_letter_counts_as_attempt() {
        let mut vision = MockLetterVision::new();
        vision.expect_detect().returning(|_| {
            Ok(Detection {
                label: "A".to_string(),
                confidence: 0.92,
            })
        });
        let bubbly = with(Collaborators::none().with_vision(Arc::new(vision)));
        let mut state = bubbly.new_session();
        state.update_settings(SettingsUpdate {
            vision_enabled: Some(true),
            ..Default::default()
        });

        bubbly.handle_turn(&mut state, TurnInput::Image(vec![0; 4])).await;

        assert_eq!(state.progress().stars().len(), 1);
    }

    #[tokio::test]
    async fn test_vision_object_is_described() {
        let mut vision = MockLetterVision::new();
        vision.expect_detect().returning(|_| {
            Ok(Detection {
                label: "apple".to_string(),
                confidence: 0.8,
            })
        });
        let bubbly = with(Collaborators::none().with_vision(Arc::new(vision)));
        let mut state = bubbly.new_session();
        state.update_settings(SettingsUpdate {
            vision_enabled: Some(true),
            ..Default::default()
        });

        let outcome = bubbly.handle_turn(&mut state, TurnInput::Image(vec![0; 4])).await;

        assert_eq!(outcome.reply, "You found: apple! That starts with A. Great finding!");
        assert!(state.progress().stars().is_empty());
    }

    #[tokio::test]
    async fn test_speech_synthesis_follows_setting() {
        let mut tts = MockTextToSpeech::new();
        tts.expect_synthesize().times(1).returning(|_| Ok(vec![7, 7, 7]));
        let bubbly = with(Collaborators::none().with_text_to_speech(Arc::new(tts)));
        let mut state = bubbly.new_session();

        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("Hello")).await;
        assert_eq!(outcome.audio, Some(vec![7, 7, 7]));

        state.update_settings(SettingsUpdate {
            tts_enabled: Some(false),
            ..Default::default()
        });
        let outcome = bubbly.handle_turn(&mut state, TurnInput::text("Hello")).await;
        assert_eq!(outcome.audio, None);
    }
}
