use crate::curriculum::Letter;
use crate::session::{AgeRange, Turn};
use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;

/// The persona prompt shipped with the crate.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.md");

/// A free-form text generator used to rephrase the tutor's replies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Makes a single, non-streaming completion call and returns the text.
    async fn generate(
        &self,
        system_prompt: String,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String>;
}

/// An implementation of `LanguageModel` for any OpenAI-compatible API,
/// including Ollama's `/v1` endpoint.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    /// Builds a client for `base_url`. Local servers such as Ollama need no key.
    pub fn for_endpoint(base_url: &str, api_key: Option<&str>, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key.unwrap_or("ollama"));
        Self::new(config, model)
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatibleClient {
    async fn generate(
        &self,
        system_prompt: String,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String> {
        let mut all_messages: Vec<ChatCompletionRequestMessage> =
            vec![system_message(system_prompt)?];
        all_messages.extend(messages);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(all_messages)
            .max_completion_tokens(150u32)
            .temperature(0.7)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("LLM response had no text content."))
    }
}

fn system_message(content: String) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(content)
        .build()?
        .into())
}

/// Fills the persona template for one session.
///
/// Recognised placeholders: `{age_range}`, `{current_letter}` and `{child_name}`.
pub fn render_persona(template: &str, age_range: AgeRange, letter: Letter, child_name: Option<&str>) -> String {
    template
        .replace("{age_range}", age_range.label())
        .replace("{current_letter}", &letter.to_string())
        .replace("{child_name}", child_name.unwrap_or("a new friend"))
}

/// Builds the chat history for a rephrase request: the recent exchanges,
/// then the child's utterance together with the planned reply.
pub fn rephrase_messages<'a>(
    recent: impl Iterator<Item = &'a Turn>,
    utterance: &str,
    planned_reply: &str,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::new();
    for turn in recent {
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(turn.user.clone())
                .build()?
                .into(),
        );
        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.assistant.clone())
                .build()?
                .into(),
        );
    }
    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(format!(
                "The child said: \"{utterance}\"\nPlanned reply: \"{planned_reply}\""
            ))
            .build()?
            .into(),
    );
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use chrono::Utc;

    #[test]
    fn test_render_persona_fills_placeholders() {
        let prompt = render_persona(
            DEFAULT_SYSTEM_PROMPT,
            AgeRange::Older,
            Letter::new('B').unwrap(),
            Some("Mia"),
        );
        assert!(prompt.contains("aged 6-8"));
        assert!(prompt.contains("the letter B to Mia"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_render_persona_without_name() {
        let prompt = render_persona("Hi {child_name}", AgeRange::Younger, Letter::A, None);
        assert_eq!(prompt, "Hi a new friend");
    }

    #[test]
    fn test_rephrase_messages_alternate_roles() {
        let turns = vec![Turn {
            user: "Hello".to_string(),
            assistant: "Hi there!".to_string(),
            intent: Intent::Introduction,
            at: Utc::now(),
        }];
        let messages = rephrase_messages(turns.iter(), "B", "Great job!").unwrap();

        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::User(_)));
    }
}
