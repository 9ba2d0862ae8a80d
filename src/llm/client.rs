//! Blocking client for OpenAI-compatible chat completion APIs

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{Prompt, TextGenerator};
use crate::config::LlmConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    /// Plain string or an array of content parts, depending on the provider
    #[serde(default)]
    pub content: Value,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: Value::String(content.into()) }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: Value::String(content.into()) }
    }

    /// Extract content as plain text, handling both string and array-of-parts formats.
    pub fn content_as_text(&self) -> Option<String> {
        match &self.content {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.concat())
                }
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Chat client bound to one endpoint and default model
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            config: config.clone(),
        })
    }

    /// Client using the key from env, keyring or fallback file
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let key = super::keyring::get_api_key(&config.api_key_env)?;
        Self::new(config, key)
    }

    fn build_messages(prompt: &Prompt) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt.user.clone()));
        messages
    }
}

/// Pull the first choice's text out of a response body.
fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse JSON response (body: {})", truncate(body, 500)))?;
    let content = response
        .choices
        .first()
        .and_then(|c| c.message.content_as_text())
        .unwrap_or_default();
    if content.trim().is_empty() {
        bail!("LLM returned an empty response");
    }
    Ok(content)
}

impl TextGenerator for ChatClient {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        let model = prompt.model.as_deref().unwrap_or(&self.config.model);
        let request = ChatRequest {
            model,
            messages: Self::build_messages(prompt),
            temperature: prompt.temperature.unwrap_or(self.config.temperature),
            max_tokens: prompt.max_tokens.unwrap_or(self.config.max_tokens),
        };
        debug!("Chat completion request: model={} temperature={}", model, request.temperature);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .context("Failed to send request to LLM provider")?;

        let status = response.status();
        let body = response.text().context("Failed to read response body")?;
        if !status.is_success() {
            bail!("LLM API error ({}): {}", status, truncate(&body, 500));
        }
        extract_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_string_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "hello");
    }

    #[test]
    fn test_extract_parts_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":[
            {"type":"text","text":"Hello "},{"type":"image_url","image_url":{}},{"type":"text","text":"world"}
        ]}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_empty_is_error() {
        assert!(extract_content(r#"{"choices":[]}"#).is_err());
        assert!(extract_content(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).is_err());
        assert!(extract_content("not json").is_err());
    }

    #[test]
    fn test_build_messages() {
        let prompt = Prompt::new("question").with_system("be brief");
        let messages = ChatClient::build_messages(&prompt);
        assert_eq!(messages, vec![ChatMessage::system("be brief"), ChatMessage::user("question")]);
        assert_eq!(ChatClient::build_messages(&Prompt::new("q")).len(), 1);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
