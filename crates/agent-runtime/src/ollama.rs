//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use std::future::Future;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, PromptMessage,
        PromptRole,
    },
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::{LocalModel, ModelOptions},
};

/// Ollama provider configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model used when the caller does not pick one
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("OLLAMA_HOST").unwrap_or(defaults.host),
            port: lookup("OLLAMA_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            model: lookup("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout_secs: lookup("OLLAMA_TIMEOUT_SECS")
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Base URL of the Ollama API, e.g. `http://localhost:11434`
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration; the host must be an http(s) URL
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.host)
            .map_err(|e| AgentError::Config(format!("invalid Ollama host {:?}: {e}", config.host)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AgentError::Config(format!(
                "Ollama host must be http or https, got {:?}",
                config.host
            )));
        }

        Ok(Self {
            client: Ollama::new(&config.host, config.port),
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Generation options defaulting to the configured model
    pub fn default_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.config.model.clone(),
            ..Default::default()
        }
    }

    /// Convert prompt messages to Ollama format
    fn convert_messages(messages: &[PromptMessage]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    PromptRole::System => MessageRole::System,
                    PromptRole::User => MessageRole::User,
                    PromptRole::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    /// Convert Ollama response to a completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Build Ollama model options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));
        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }

    async fn local_models(&self) -> Result<Vec<LocalModel>> {
        self.timed(self.client.list_local_models())
            .await?
            .map_err(|e| AgentError::AdapterUnavailable(e.to_string()))
    }

    /// Bound one Ollama call by the configured timeout
    async fn timed<T>(&self, call: impl Future<Output = T>) -> Result<T> {
        let limit = Duration::from_secs(self.config.timeout_secs);
        tokio::time::timeout(limit, call).await.map_err(|_| {
            AgentError::AdapterUnavailable(format!(
                "Ollama did not answer within {}s",
                self.config.timeout_secs
            ))
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn health_check(&self) -> Result<bool> {
        match self.local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[PromptMessage],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(Self::build_options(options));

        tracing::debug!(model = %options.model, messages = messages.len(), "Sending chat request");

        let response = self
            .timed(self.client.send_chat_messages(request))
            .await?
            .map_err(|e| AgentError::AdapterUnavailable(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self
            .local_models()
            .await?
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                context_length: None, // Not exposed by Ollama API
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("OLLAMA_HOST", "http://gpu-box/"),
            ("OLLAMA_PORT", "8080"),
            ("OLLAMA_MODEL", "qwen2.5"),
            ("OLLAMA_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = OllamaConfig::from_lookup(|k| vars.get(k).map(ToString::to_string));
        assert_eq!(config.base_url(), "http://gpu-box:8080");
        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            PromptMessage::system("You are helpful."),
            PromptMessage::user("Hello"),
            PromptMessage::assistant("Hi there"),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert!(matches!(converted[0].role, MessageRole::System));
        assert!(matches!(converted[2].role, MessageRole::Assistant));
        assert_eq!(converted[1].content, "Hello");
    }

    #[test]
    fn test_options_carry_token_limit() {
        let options = GenerationOptions {
            max_tokens: 512,
            ..Default::default()
        };
        let json = serde_json::to_value(OllamaProvider::build_options(&options)).unwrap();
        assert_eq!(json["num_predict"], 512);
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        assert!(matches!(
            OllamaProvider::new("not a url", 11434),
            Err(AgentError::Config(_))
        ));
        assert!(matches!(
            OllamaProvider::new("ftp://models.local", 11434),
            Err(AgentError::Config(_))
        ));
        assert!(OllamaProvider::localhost().is_ok());
    }

    #[tokio::test]
    async fn test_silent_server_hits_configured_timeout() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let held = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let provider = OllamaProvider::from_config(OllamaConfig {
            host: "http://127.0.0.1".into(),
            port,
            timeout_secs: 1,
            ..Default::default()
        })
        .unwrap();

        let err = provider.list_models().await.unwrap_err();
        assert!(
            matches!(err, AgentError::AdapterUnavailable(ref m) if m.contains("within 1s")),
            "{err}"
        );
        held.abort();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        // Port 9 (discard) is essentially never serving HTTP locally
        let provider = OllamaProvider::new("http://127.0.0.1", 9).unwrap();
        assert!(!provider.health_check().await.unwrap());
        assert!(matches!(
            provider.list_models().await,
            Err(AgentError::AdapterUnavailable(_))
        ));
    }
}
