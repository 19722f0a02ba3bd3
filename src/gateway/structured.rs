//! Typed generation on top of [`ChatGateway`].
//!
//! Models sometimes wrap JSON in prose or code fences; [`extract_json`] pulls
//! out the first balanced object before deserializing. A response that still
//! fails to parse is re-asked with the parse error attached, up to
//! `parse_attempts` times.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use super::error::ProviderError;
use super::types::{Attribution, ChatModel, ChatRequest, Message};
use super::ChatGateway;

/// Longest slice of a bad response kept in a parse error.
const RAW_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum StructuredError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{caller}: model returned an empty response")]
    Empty { caller: &'static str },

    #[error("{caller}: could not parse model output after {attempts} attempt(s): {message}; raw: {raw}")]
    Parse {
        caller: &'static str,
        attempts: u32,
        message: String,
        raw: String,
    },
}

impl StructuredError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_rate_limited())
    }
}

/// Return the first balanced `{...}` object in `raw`, ignoring braces inside
/// string literals. Falls back to the trimmed input when none is found.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find('{') else {
        return trimmed;
    };
    let remainder = &trimmed[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &remainder[..=i];
                }
            }
            _ => {}
        }
    }

    trimmed
}

fn excerpt(raw: &str) -> String {
    let mut out: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
    if raw.chars().count() > RAW_EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

/// One model, one temperature; text or typed JSON out.
#[derive(Clone)]
pub struct StructuredClient {
    gateway: Arc<dyn ChatGateway>,
    model: ChatModel,
    temperature: f32,
    max_tokens: Option<u32>,
    parse_attempts: u32,
}

impl std::fmt::Debug for StructuredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredClient")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("parse_attempts", &self.parse_attempts)
            .finish()
    }
}

impl StructuredClient {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: ChatModel) -> Self {
        Self {
            gateway,
            model,
            temperature: 0.0,
            max_tokens: None,
            parse_attempts: 2,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn parse_attempts(mut self, attempts: u32) -> Self {
        self.parse_attempts = attempts.max(1);
        self
    }

    pub fn model(&self) -> &ChatModel {
        &self.model
    }

    fn request(&self, messages: Vec<Message>, attribution: Attribution) -> ChatRequest {
        let req = ChatRequest::new(self.model.clone(), messages, attribution)
            .temperature(self.temperature);
        match self.max_tokens {
            Some(max) => req.max_tokens(max),
            None => req,
        }
    }

    /// Free-form completion, trimmed. Empty output is an error.
    pub async fn generate_text(
        &self,
        messages: Vec<Message>,
        attribution: Attribution,
    ) -> Result<String, StructuredError> {
        let caller = attribution.caller;
        let resp = self.gateway.chat(self.request(messages, attribution)).await?;
        let text = resp.content.trim();
        if text.is_empty() {
            return Err(StructuredError::Empty { caller });
        }
        Ok(text.to_string())
    }

    /// JSON-mode completion deserialized into `T`.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        mut messages: Vec<Message>,
        attribution: Attribution,
    ) -> Result<T, StructuredError> {
        let caller = attribution.caller;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let req = self.request(messages.clone(), attribution.clone()).json();
            let resp = self.gateway.chat(req).await?;
            if resp.content.trim().is_empty() {
                return Err(StructuredError::Empty { caller });
            }

            match serde_json::from_str::<T>(extract_json(&resp.content)) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.parse_attempts => {
                    tracing::warn!(caller, attempt, error = %e, "structured output did not parse; re-asking");
                    messages.push(Message::assistant(resp.content));
                    messages.push(Message::user(format!(
                        "That response could not be parsed ({e}). Reply with a single JSON object \
                         matching the requested schema and nothing else."
                    )));
                }
                Err(e) => {
                    return Err(StructuredError::Parse {
                        caller,
                        attempts: attempt,
                        message: e.to_string(),
                        raw: excerpt(&resp.content),
                    })
                }
            }
        }
    }
}
