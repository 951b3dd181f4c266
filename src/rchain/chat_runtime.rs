use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;

/// Longest error body kept in an API failure, in characters.
const MAX_ERROR_BODY_CHARS: usize = 2_000;

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

/// Sends one chat-completions POST. Failures are reported once, never retried.
pub(crate) async fn send_chat_request<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &T,
    timeout_secs: Option<u64>,
) -> Result<Response, RequestFailure> {
    let request = client.post(url).bearer_auth(api_key).json(payload);
    send_request(request, timeout_secs).await
}

/// Sends a prepared request and turns non-2xx statuses into [`RequestFailure::Api`].
pub(crate) async fn send_request(
    mut request: RequestBuilder,
    timeout_secs: Option<u64>,
) -> Result<Response, RequestFailure> {
    if let Some(timeout_secs) = timeout_secs {
        request = request.timeout(Duration::from_secs(timeout_secs));
    }

    let response = request.send().await.map_err(RequestFailure::Request)?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(RequestFailure::Api {
        status,
        body: clip_body(&body),
    })
}

fn clip_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
