use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which language model, if any, rephrases Bubbly's replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    None,
    Ollama,
    OpenAI,
}

impl Provider {
    fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::None => None,
            Provider::Ollama => Some("http://localhost:11434/v1"),
            Provider::OpenAI => Some("https://api.openai.com/v1"),
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::None => "",
            Provider::Ollama => "llama3.2",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub curriculum_path: Option<PathBuf>,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub chat_model: String,
    pub model_timeout: Duration,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let curriculum_path = std::env::var("CURRICULUM_PATH").ok().map(PathBuf::from);

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "none".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "none" | "" => Provider::None,
            "ollama" => Provider::Ollama,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of none, ollama, openai", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        if provider == Provider::OpenAI && openai_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
            ));
        }

        let llm_base_url = std::env::var("LLM_BASE_URL")
            .ok()
            .or_else(|| provider.default_base_url().map(str::to_string));

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());

        let timeout_str = std::env::var("MODEL_TIMEOUT_MS").unwrap_or_else(|_| "10000".to_string());
        let model_timeout = timeout_str
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue("MODEL_TIMEOUT_MS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        Ok(Self {
            bind_address,
            curriculum_path,
            provider,
            openai_api_key,
            llm_base_url,
            chat_model,
            model_timeout,
            log_level,
            prompts_path,
        })
    }
}
