//! Text generation boundary
//!
//! The study workflows only see [`TextGenerator`]; the HTTP client in
//! [`client`] is one implementation and tests use a mock.

pub mod client;
pub mod keyring;
pub mod prompts;

use anyhow::Result;

pub use client::ChatClient;

/// A single generation request
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    /// Model override; `None` uses the generator's default model
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self { system: None, user: user.into(), model: None, temperature: None, max_tokens: None }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Opaque synchronous text generation: prompt in, text out.
#[cfg_attr(test, mockall::automock)]
pub trait TextGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Strip one surrounding markdown code fence (```` ```json ... ``` ````), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json", "yaml") on the opening line
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
