use std::env;
use std::fmt;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::rchain::messages::{AIMessage, ChatMessage};
use crate::rchain::openai::{ChatCompletionRequest, chat_completion};
use crate::rchain::provider::{
    ChatModelError, OPENAI_API_KEY_ENV, OPENAI_BASE_URL_ENV, OPENAI_DEFAULT_BASE_URL,
    api_key_from_env, chat_completions_url,
};

/// OpenAI chat-completions client.
///
/// The handle is cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct ChatOpenAI {
    model: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl fmt::Debug for ChatOpenAI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatOpenAI")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ChatOpenAI {
    /// Creates a client from an explicit model name and API key.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ChatModelError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ChatModelError::MissingModel);
        }
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatModelError::MissingApiKey {
                key_env: OPENAI_API_KEY_ENV,
            });
        }

        Ok(Self {
            model,
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            api_key,
            base_url: OPENAI_DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Creates a client from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL` when set.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ChatModelError> {
        let api_key = api_key_from_env(OPENAI_API_KEY_ENV)?;
        let mut chat = Self::new(model, api_key)?;
        if let Ok(base_url) = env::var(OPENAI_BASE_URL_ENV) {
            let trimmed = base_url.trim();
            if !trimmed.is_empty() {
                chat.base_url = trimmed.to_string();
            }
        }
        Ok(chat)
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body that [`ChatOpenAI::invoke`] would send, plus the timeout. Never includes the key.
    pub fn request_preview(&self, messages: &[ChatMessage]) -> Value {
        preview_request(
            &self.model,
            messages,
            self.temperature,
            self.max_tokens,
            self.timeout_secs,
        )
    }

    /// Sends the messages and returns the first choice.
    pub async fn invoke(&self, messages: &[ChatMessage]) -> Result<AIMessage, ChatModelError> {
        let url = chat_completions_url(&self.base_url);
        debug!(
            model = %self.model,
            url = %url,
            messages = messages.len(),
            "sending chat completion"
        );

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let message = chat_completion(
            &self.client,
            &url,
            &self.api_key,
            &payload,
            self.timeout_secs,
        )
        .await?;

        debug!(
            chars = message.content.chars().count(),
            total_tokens = ?message.usage.and_then(|usage| usage.total_tokens),
            "chat completion received"
        );
        Ok(message)
    }

    /// Sends one user message and returns the reply text.
    pub async fn predict(&self, text: impl Into<String>) -> Result<String, ChatModelError> {
        let message = self.invoke(&[ChatMessage::user(text)]).await?;
        Ok(message.content)
    }
}

/// Builds the dry-run view of a chat request without needing a client or key.
pub fn preview_request(
    model: &str,
    messages: &[ChatMessage],
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
) -> Value {
    let mut map = Map::new();
    map.insert("model".to_string(), Value::String(model.to_string()));
    map.insert("messages".to_string(), json!(messages));
    map.insert("temperature".to_string(), json!(temperature));
    map.insert("max_tokens".to_string(), json!(max_tokens));
    map.insert("timeout_secs".to_string(), json!(timeout_secs));
    Value::Object(map)
}
