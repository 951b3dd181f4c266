use std::env;

use reqwest::StatusCode;
use thiserror::Error;

/// Environment variable holding the OpenAI key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the OpenAI base URL.
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
/// Environment variable holding the New York Times key.
pub const NYT_API_KEY_ENV: &str = "NYT_API_KEY";

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Reads a credential, treating blank values as absent.
pub fn api_key_from_env(key_env: &'static str) -> Result<String, ChatModelError> {
    env::var(key_env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ChatModelError::MissingApiKey { key_env })
}

pub fn is_api_key_present(key_env: &'static str) -> bool {
    api_key_from_env(key_env).is_ok()
}

/// Resolves the chat-completions endpoint from a base URL such as `https://api.openai.com/v1`.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[derive(Debug, Error)]
pub enum ChatModelError {
    #[error("{key_env} is not set in the environment")]
    MissingApiKey { key_env: &'static str },
    #[error("No model provided.")]
    MissingModel,
    #[error("openai request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("openai API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("openai response did not contain message content")]
    EmptyResponse,
}
