use serde::{Deserialize, Serialize};

use crate::rchain::chat_runtime::{RequestFailure, send_chat_request};
use crate::rchain::messages::{AIMessage, ChatMessage, Usage};
use crate::rchain::provider::ChatModelError;

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

pub(crate) async fn chat_completion(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &ChatCompletionRequest<'_>,
    timeout_secs: Option<u64>,
) -> Result<AIMessage, ChatModelError> {
    let response = send_chat_request(client, url, api_key, payload, timeout_secs)
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => ChatModelError::Request { source },
            RequestFailure::Api { status, body } => ChatModelError::Api { status, body },
        })?;

    let body: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|source| ChatModelError::Request { source })?;
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ChatModelError::EmptyResponse)?;
    let usage = body.usage.map(|usage| Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });

    Ok(AIMessage { content, usage })
}
