//! Document loaders: turn external sources into [`Document`]s.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::rchain::documents::Document;

/// PDF file loader.
pub mod pdf;
/// Wikipedia search loader.
pub mod wikipedia;

pub use pdf::PdfLoader;
pub use wikipedia::WikipediaLoader;

/// Anything that can produce a batch of documents.
pub trait DocumentLoader {
    fn load(&self) -> impl Future<Output = Result<Vec<Document>, LoaderError>> + Send;
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse PDF '{}': {message}", path.display())]
    Pdf { path: PathBuf, message: String },
    #[error("No extractable text found in '{}'", path.display())]
    NoText { path: PathBuf },
    #[error("Wikipedia query must not be empty")]
    EmptyQuery,
    #[error("wikipedia request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("wikipedia API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("Unexpected Wikipedia response: {0}")]
    Malformed(String),
}
