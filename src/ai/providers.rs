use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    #[serde(alias = "open-ai")]
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Opaque generative-AI collaborator. Handlers call it only after a
/// successful quota check; a failure here does not refund the consumed slot.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    async fn chat(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<String>;
    fn name(&self) -> &'static str;
}

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat(messages, max_tokens).await
    }

    async fn chat(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<String> {
        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: messages
                .into_iter()
                .map(|m| OpenAiMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            max_tokens,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to call OpenAI-compatible API")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("AI API error: {} - {}", status, text);
        }

        let data: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse AI response")?;

        data.choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("Empty response from AI backend"))
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}

pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "claude-3-5-haiku-20241022".to_string()),
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[async_trait]
impl AiBackend for AnthropicBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat(messages, max_tokens).await
    }

    async fn chat(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens,
            messages: messages
                .into_iter()
                .map(|m| AnthropicMessage {
                    role: if m.role == "user" { "user" } else { "assistant" }.to_string(),
                    content: m.content,
                })
                .collect(),
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to call Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error: {} - {}", status, text);
        }

        let data: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        data.content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| anyhow::anyhow!("Empty response from Anthropic"))
    }

    fn name(&self) -> &'static str {
        "Anthropic"
    }
}

pub fn create_backend(config: &AiConfig) -> Result<Box<dyn AiBackend>> {
    match config.provider {
        AiProvider::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("API key required for OpenAI-compatible backend"))?;
            Ok(Box::new(OpenAiBackend::new(
                api_key,
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        AiProvider::Anthropic => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Anthropic API key required"))?;
            Ok(Box::new(AnthropicBackend::new(
                api_key,
                config.model.clone(),
            )))
        }
    }
}
