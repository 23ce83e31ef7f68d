//! Terminal front end for Bubbly.
//!
//! Drives a single tutoring session from stdin. Append `@<confidence>` to an
//! utterance to simulate a pronunciation score, e.g. `B @0.85`.

use anyhow::{Context, Result};
use bubbly_core::{
    Curriculum, DialogueOrchestrator, TurnInput, TurnOutcome, TutorConfig,
    llm_client::OpenAICompatibleClient,
    modalities::Collaborators,
    progress::ProgressEvent,
};
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bubbly", about = "Bubbly, a friendly alphabet tutor for the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Curriculum JSON file. The built-in curriculum is used when omitted.
    #[arg(long)]
    curriculum: Option<PathBuf>,

    /// The child's name, so Bubbly can skip the introduction.
    #[arg(long)]
    name: Option<String>,

    /// OpenAI-compatible endpoint used to rephrase replies, e.g. http://localhost:11434/v1
    #[arg(long)]
    llm_base_url: Option<String>,

    #[arg(long, default_value = "llama3.2")]
    model: String,

    #[arg(long, default_value_t = 10_000)]
    model_timeout_ms: u64,
}

enum Command {
    Quit,
    Memory,
    Turn(TurnInput),
    Empty,
}

fn parse_line(line: &str) -> Command {
    let line = line.trim();
    match line {
        "" => Command::Empty,
        "/quit" | "/exit" => Command::Quit,
        "/memory" => Command::Memory,
        _ => {
            let scored = line.rsplit_once('@').and_then(|(utterance, score)| {
                let confidence = score.trim().parse::<f32>().ok()?;
                (0.0..=1.0)
                    .contains(&confidence)
                    .then(|| TurnInput::spoken(utterance.trim(), confidence))
            });
            Command::Turn(scored.unwrap_or_else(|| TurnInput::text(line)))
        }
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("Bubbly: {}", outcome.reply);
    for event in &outcome.events {
        match event {
            ProgressEvent::StarAwarded { letter, confidence } => {
                println!("  ⭐ Star earned for {} ({:.0}%)", letter, confidence * 100.0)
            }
            ProgressEvent::BadgeUnlocked { badge } => {
                println!("  {} Badge unlocked: {}", badge.icon(), badge.name())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let curriculum = match &cli.curriculum {
        Some(path) => Curriculum::load(path)
            .with_context(|| format!("Failed to load curriculum from {}", path.display()))?,
        None => Curriculum::builtin().context("Built-in curriculum is invalid")?,
    };

    let collaborators = match &cli.llm_base_url {
        Some(base_url) => {
            info!(%base_url, model = %cli.model, "Using language model for rephrasing.");
            Collaborators::none().with_language_model(Arc::new(
                OpenAICompatibleClient::for_endpoint(base_url, None, cli.model.clone()),
            ))
        }
        None => Collaborators::none(),
    };

    let orchestrator = DialogueOrchestrator::new(
        Arc::new(curriculum),
        TutorConfig::default().with_model_timeout(Duration::from_millis(cli.model_timeout_ms)),
    )
    .with_collaborators(collaborators);

    let mut session = orchestrator.new_session();
    match cli.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            session.set_child_name(name);
            println!(
                "Bubbly: Hello, {}! I'm Bubbly, your alphabet friend! Let's start with the letter {}!",
                name,
                session.current_letter()
            );
        }
        None => println!("Bubbly: Hello! I'm Bubbly, your alphabet friend! What's your name?"),
    }
    println!("(Type /memory to see what Bubbly remembers, /quit to leave.)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Command::Quit => break,
            Command::Empty => continue,
            Command::Memory => println!("{}", session.memory_report()),
            Command::Turn(input) => {
                let outcome = orchestrator.handle_turn(&mut session, input).await;
                print_outcome(&outcome);
            }
        }
    }

    let summary = session.progress().summary();
    println!(
        "Bye! You earned {} star(s). {}",
        summary.stars_earned, summary.message
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_confidence_suffix() {
        match parse_line("B @0.85") {
            Command::Turn(TurnInput::Text {
                utterance,
                confidence,
            }) => {
                assert_eq!(utterance, "B");
                assert_eq!(confidence, Some(0.85));
            }
            _ => panic!("expected a spoken turn"),
        }
    }

    #[test]
    fn test_parse_plain_text_and_commands() {
        assert!(matches!(parse_line("  "), Command::Empty));
        assert!(matches!(parse_line("/quit"), Command::Quit));
        assert!(matches!(parse_line("/memory"), Command::Memory));
        match parse_line("my email is kid@example.com") {
            Command::Turn(TurnInput::Text { confidence, .. }) => assert_eq!(confidence, None),
            _ => panic!("expected a text turn"),
        }
    }
}
