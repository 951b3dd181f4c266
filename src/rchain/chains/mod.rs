//! Pre-built chains that combine prompts, documents and HTTP calls around a chat model.

use reqwest::StatusCode;
use thiserror::Error;

use crate::rchain::prompts::PromptError;
use crate::rchain::provider::ChatModelError;

/// Natural-language query to HTTP call to summary.
pub mod api;
/// Question answering over a document collection.
pub mod qa;

pub use api::{ApiAnswer, ApiChain};
pub use qa::{QaAnswer, StuffDocumentsChain, load_qa_chain};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Chat(#[from] ChatModelError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("Question must not be empty")]
    EmptyQuestion,
    #[error("API documentation must not be empty")]
    EmptyApiDocs,
    #[error("Model did not produce an http(s) API url: {0:?}")]
    InvalidApiUrl(String),
    #[error(
        "No allowed domains for the API chain. Add a 'BASE URL:' line to the docs or pass --allow-domain."
    )]
    NoAllowedDomains,
    #[error("Domain '{host}' is not allowed (allowed: {})", allowed.join(", "))]
    DisallowedDomain { host: String, allowed: Vec<String> },
    #[error("API request failed: {source}")]
    ApiRequest {
        #[source]
        source: reqwest::Error,
    },
    #[error("API returned {status}: {body}")]
    ApiStatus { status: StatusCode, body: String },
}
