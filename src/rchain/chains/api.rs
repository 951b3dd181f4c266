use std::fmt;

use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::rchain::chains::ChainError;
use crate::rchain::chat_models::ChatOpenAI;
use crate::rchain::chat_runtime::{RequestFailure, send_request};
use crate::rchain::documents::truncate_chars;
use crate::rchain::messages::{ChatMessage, Usage};
use crate::rchain::prompts::PromptTemplate;

pub const DEFAULT_MAX_RESPONSE_CHARS: usize = 8_000;

const MAX_REDIRECTS: usize = 10;

const API_URL_TEMPLATE: &str = "You are given the below API Documentation:\n\
{api_docs}\n\
Using this documentation, generate the full API url to call for answering the user question.\n\
Build the url so the response is as short as possible while still containing the information needed to answer the question. Leave out any parameters that are not required.\n\
\n\
Question:{question}\n\
API url:";

const API_RESPONSE_SUFFIX: &str = " {api_url}\n\
\n\
Here is the response from the API:\n\
\n\
{api_response}\n\
\n\
Summarize this response to answer the original question.\n\
\n\
Summary:";

/// Result of one API chain run.
#[derive(Debug, Clone, Serialize)]
pub struct ApiAnswer {
    /// URL as written by the model; secret query parameters are not included.
    pub api_url: String,
    /// Response body, truncated to the chain's limit.
    pub api_response: String,
    pub answer: String,
    pub usage: Option<Usage>,
}

/// Turns a question into a call against a documented HTTP API and summarizes the response.
#[derive(Clone)]
pub struct ApiChain {
    llm: ChatOpenAI,
    api_docs: String,
    limit_to_domains: Vec<String>,
    secret_params: Vec<(String, String)>,
    headers: HeaderMap,
    max_response_chars: usize,
    timeout_secs: Option<u64>,
}

impl fmt::Debug for ApiChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret_names: Vec<&str> = self.secret_params.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("ApiChain")
            .field("llm", &self.llm)
            .field("api_docs_chars", &self.api_docs.chars().count())
            .field("limit_to_domains", &self.limit_to_domains)
            .field("secret_params", &secret_names)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("max_response_chars", &self.max_response_chars)
            .finish()
    }
}

impl ApiChain {
    /// Builds a chain; allowed domains default to the hosts on the docs' `BASE URL:` lines.
    pub fn from_llm_and_api_docs(
        llm: ChatOpenAI,
        api_docs: impl Into<String>,
    ) -> Result<Self, ChainError> {
        let api_docs = api_docs.into();
        if api_docs.trim().is_empty() {
            return Err(ChainError::EmptyApiDocs);
        }
        Ok(Self {
            llm,
            limit_to_domains: base_hosts(&api_docs),
            api_docs,
            secret_params: Vec::new(),
            headers: HeaderMap::new(),
            max_response_chars: DEFAULT_MAX_RESPONSE_CHARS,
            timeout_secs: None,
        })
    }

    /// Replaces the host allow-list. `*` allows every host.
    pub fn with_limit_to_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.limit_to_domains = domains
            .into_iter()
            .map(|domain| normalize_domain(&domain.into()))
            .filter(|domain| !domain.is_empty())
            .collect();
        self
    }

    /// Adds hosts to the allow-list.
    pub fn allow_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = normalize_domain(&domain.into());
        if !domain.is_empty() && !self.limit_to_domains.contains(&domain) {
            self.limit_to_domains.push(domain);
        }
        self
    }

    /// Query parameter appended after the model writes the URL. Never shown to the model.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secret_params.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_max_response_chars(mut self, max_response_chars: usize) -> Self {
        self.max_response_chars = max_response_chars;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn limit_to_domains(&self) -> &[String] {
        &self.limit_to_domains
    }

    pub fn llm(&self) -> &ChatOpenAI {
        &self.llm
    }

    /// Messages for the first model call, which writes the API url.
    pub fn url_messages(&self, question: &str) -> Result<Vec<ChatMessage>, ChainError> {
        let question = non_empty_question(question)?;
        let prompt = PromptTemplate::new(API_URL_TEMPLATE)?.format(&[
            ("api_docs", self.api_docs.as_str()),
            ("question", question),
        ])?;
        Ok(vec![ChatMessage::user(prompt)])
    }

    fn response_messages(
        &self,
        question: &str,
        api_url: &str,
        api_response: &str,
    ) -> Result<Vec<ChatMessage>, ChainError> {
        let template = format!("{API_URL_TEMPLATE}{API_RESPONSE_SUFFIX}");
        let prompt = PromptTemplate::new(&template)?.format(&[
            ("api_docs", self.api_docs.as_str()),
            ("question", question),
            ("api_url", api_url),
            ("api_response", api_response),
        ])?;
        Ok(vec![ChatMessage::user(prompt)])
    }

    pub async fn run(&self, question: &str) -> Result<ApiAnswer, ChainError> {
        let question = non_empty_question(question)?;
        if self.limit_to_domains.is_empty() {
            return Err(ChainError::NoAllowedDomains);
        }

        let url_reply = self.llm.invoke(&self.url_messages(question)?).await?;
        let (written, parsed) = extract_api_url(&url_reply.content)?;
        let api_url = written.to_string();
        self.check_domain(&parsed)?;
        info!(api_url = %api_url, "calling API");

        let api_response = self.call_api(&parsed).await?;

        let summary = self
            .llm
            .invoke(&self.response_messages(question, &api_url, &api_response)?)
            .await?;
        let usage = match (url_reply.usage, summary.usage) {
            (None, None) => None,
            (first, second) => Some(first.unwrap_or_default().combine(second.unwrap_or_default())),
        };

        Ok(ApiAnswer {
            api_url,
            api_response,
            answer: summary.content,
            usage,
        })
    }

    fn check_domain(&self, url: &Url) -> Result<(), ChainError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if is_allowed_host(&host, &self.limit_to_domains) {
            Ok(())
        } else {
            Err(ChainError::DisallowedDomain {
                host,
                allowed: self.limit_to_domains.clone(),
            })
        }
    }

    async fn call_api(&self, api_url: &Url) -> Result<String, ChainError> {
        let mut url = api_url.clone();
        if !self.secret_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.secret_params {
                pairs.append_pair(name, value);
            }
        }

        let client = reqwest::Client::builder()
            .redirect(self.redirect_policy())
            .build()
            .map_err(|source| ChainError::ApiRequest { source })?;
        let request = client.get(url).headers(self.headers.clone());
        let response = send_request(request, self.timeout_secs)
            .await
            .map_err(|failure| match failure {
                RequestFailure::Request(source) => self.request_error(source),
                RequestFailure::Api { status, body } => ChainError::ApiStatus { status, body },
            })?;
        let body = response
            .text()
            .await
            .map_err(|source| ChainError::ApiRequest {
                source: source.without_url(),
            })?;
        debug!(chars = body.chars().count(), "API response received");

        Ok(truncate_chars(body.trim(), self.max_response_chars))
    }
}

#[derive(Debug, Error)]
#[error("redirect to '{host}' is outside the allowed domains")]
struct BlockedRedirect {
    host: String,
}

impl ApiChain {
    /// Redirects are followed only while they stay on allowed hosts.
    fn redirect_policy(&self) -> Policy {
        let allowed = self.limit_to_domains.clone();
        Policy::custom(move |attempt| {
            let host = attempt.url().host_str().unwrap_or_default().to_ascii_lowercase();
            if !is_allowed_host(&host, &allowed) {
                attempt.error(BlockedRedirect { host })
            } else if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        })
    }

    fn request_error(&self, source: reqwest::Error) -> ChainError {
        let blocked = std::iter::successors(std::error::Error::source(&source), |inner| inner.source())
            .find_map(|inner| inner.downcast_ref::<BlockedRedirect>())
            .map(|redirect| redirect.host.clone());
        match blocked {
            Some(host) => ChainError::DisallowedDomain {
                host,
                allowed: self.limit_to_domains.clone(),
            },
            None => ChainError::ApiRequest {
                source: source.without_url(),
            },
        }
    }
}

fn non_empty_question(question: &str) -> Result<&str, ChainError> {
    let question = question.trim();
    if question.is_empty() {
        Err(ChainError::EmptyQuestion)
    } else {
        Ok(question)
    }
}

/// Finds the first http(s) URL in the model output, ignoring quotes and code fences.
///
/// Returns the URL text as written next to its parsed form.
pub fn extract_api_url(text: &str) -> Result<(&str, Url), ChainError> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>' | ',' | '.')))
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .find_map(|token| Url::parse(token).ok().map(|url| (token, url)))
        .filter(|(_, url)| url.host_str().is_some())
        .ok_or_else(|| ChainError::InvalidApiUrl(text.trim().to_string()))
}

/// Hosts named on `BASE URL:` lines (and OpenAPI-style `- url:` lines) of API docs.
pub fn base_hosts(api_docs: &str) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for line in api_docs.lines() {
        let lowered = line.trim().to_ascii_lowercase();
        if !(lowered.starts_with("base url") || lowered.starts_with("- url:")) {
            continue;
        }
        let host = line
            .split_whitespace()
            .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
            .find_map(|token| Url::parse(token.trim_matches(|c| c == '"' || c == '\'')).ok())
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));
        if let Some(host) = host {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
    }
    hosts
}

fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| trimmed.trim_end_matches('/').to_string())
        .to_ascii_lowercase()
}

/// Exact host or any subdomain of an allowed domain.
pub fn is_allowed_host(host: &str, allowed: &[String]) -> bool {
    !host.is_empty()
        && allowed.iter().any(|domain| {
            domain == "*" || host == domain || host.ends_with(&format!(".{domain}"))
        })
}
