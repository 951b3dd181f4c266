//! Lightweight LLM orchestration helpers.
//!
//! The module contains a typed OpenAI chat client, document loaders, prompt
//! templates and the chains the CLI commands are built from.

/// API descriptions for the API chain.
pub mod api_docs;
/// Question-answering and API chains.
pub mod chains;
/// Chat model client abstractions.
pub mod chat_models;
pub(crate) mod chat_runtime;
/// Loader output type.
pub mod documents;
/// PDF and Wikipedia document loaders.
pub mod loaders;
/// Role-tagged chat messages and model replies.
pub mod messages;
mod openai;
/// Prompt templates with `{variable}` placeholders.
pub mod prompts;
/// Credentials, endpoints and client errors.
pub mod provider;
